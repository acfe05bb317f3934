//! Photometry: the magnitude calibration of an image.
//!
//! The [`PhotometricSolution`] matches the stars of an astrometric solution
//! against a photometric catalog, measures the sky and the star counts, and
//! derives the zero point of the image in its filter.
pub mod panstarrs;
pub mod solution;

pub use solution::PhotometricSolution;
