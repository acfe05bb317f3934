//! # OpihiExarata
//!
//! Analysis of Opihi telescope images: plate solving, photometric
//! calibration, orbit determination, ephemerides and short-term propagation
//! of a target, and MPC 80-column observation records.
//!
//! Each analysis step is a *solution* built from data and an *engine class*
//! through the dispatch of [`engine`]. [`opihi::OpihiSolution`] chains them for
//! one image and [`tasks`] runs them in the background.
//!
//! ```no_run
//! use opihiexarata::{
//!     config::ExarataConfig,
//!     engine::{OrbitEngine, VehicleArgs},
//!     orbit::OrbitalSolution,
//! };
//!
//! let config = ExarataConfig::default();
//! let args = VehicleArgs::new()
//!     .with("semimajor_axis", 2.5)
//!     .with("eccentricity", 0.1)
//!     .with("inclination", 10.0)
//!     .with("longitude_ascending_node", 50.0)
//!     .with("argument_perihelion", 30.0)
//!     .with("mean_anomaly", 15.0)
//!     .with("epoch_julian_day", 2459000.5);
//! let records: [&str; 0] = [];
//! let orbit = OrbitalSolution::new(&records, &OrbitEngine::CustomOrbit.into(), &args, &config)?;
//! assert_eq!(orbit.semimajor_axis(), 2.5);
//! # Ok::<(), opihiexarata::exarata_errors::ExarataError>(())
//! ```
pub mod astrometry;
pub mod config;
pub mod constants;
pub mod conversion;
pub mod engine;
pub mod ephemeris;
pub mod exarata_errors;
pub mod fits;
pub mod http;
pub mod image;
pub mod mpcrecord;
pub mod opihi;
pub mod orbit;
pub mod pathname;
pub mod photometry;
pub mod propagate;
pub mod table;
pub mod tasks;
pub mod temporary;
