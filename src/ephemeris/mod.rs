//! # Ephemerides
//!
//! Sky positions of a target computed from its orbit by JPL Horizons, with
//! interpolation between the tabulated times.
pub mod jplhorizons;
pub mod solution;

pub use jplhorizons::JplHorizonsWebApi;
pub use solution::EphemeriticSolution;
