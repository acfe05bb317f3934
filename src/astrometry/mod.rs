//! Astrometry: where on the sky an image points.
//!
//! The [`AstrometricSolution`] plate-solves a FITS image, giving the field
//! center, the stars matched by the solver and a [`wcs::TanWcs`] to move
//! between pixel and sky coordinates.
pub mod solution;
pub mod wcs;
pub mod webclient;

pub use solution::AstrometricSolution;
