//! # Orbit determination
//!
//! Two orbit engines are available:
//!
//! - [`CustomOrbitEngine`] holds elements given by the user, no fit involved.
//! - [`OrbfitOrbitEngine`] runs the external OrbFit binary on an MPC record.
//!
//! Both produce classical Keplerian elements in AU and degrees, with an
//! osculating epoch as a Julian day. [`OrbitalSolution`] adds the eccentric
//! and true anomalies on top of them.
pub mod custom;
pub mod orbfit;
pub mod solution;

pub use custom::CustomOrbitEngine;
pub use orbfit::OrbfitOrbitEngine;
pub use solution::OrbitalSolution;

use crate::constants::{AstronomicalUnit, Degree};

/// Classical Keplerian elements.
///
/// Units:
/// * `semimajor_axis`: AU
/// * `eccentricity`: unitless
/// * `inclination`, `longitude_ascending_node`, `argument_perihelion`,
///   `mean_anomaly`: degrees
///
/// The same struct carries the 1-sigma errors of a set of elements; an
/// unknown error is NaN.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitalElements {
    pub semimajor_axis: AstronomicalUnit,
    pub eccentricity: f64,
    pub inclination: Degree,
    pub longitude_ascending_node: Degree,
    pub argument_perihelion: Degree,
    pub mean_anomaly: Degree,
}

impl OrbitalElements {
    /// Field names, in the order OrbFit writes them.
    pub const NAMES: [&'static str; 6] = [
        "semimajor_axis",
        "eccentricity",
        "inclination",
        "longitude_ascending_node",
        "argument_perihelion",
        "mean_anomaly",
    ];

    /// Every element unknown.
    pub fn nan() -> Self {
        Self::from_array([f64::NAN; 6])
    }

    pub fn from_array(values: [f64; 6]) -> Self {
        OrbitalElements {
            semimajor_axis: values[0],
            eccentricity: values[1],
            inclination: values[2],
            longitude_ascending_node: values[3],
            argument_perihelion: values[4],
            mean_anomaly: values[5],
        }
    }

    pub fn to_array(&self) -> [f64; 6] {
        [
            self.semimajor_axis,
            self.eccentricity,
            self.inclination,
            self.longitude_ascending_node,
            self.argument_perihelion,
            self.mean_anomaly,
        ]
    }
}

#[cfg(test)]
mod orbit_test {
    use super::*;

    #[test]
    fn test_elements_array_order() {
        let elements = OrbitalElements::from_array([2.5, 0.1, 10.0, 50.0, 30.0, 15.0]);
        assert_eq!(elements.longitude_ascending_node, 50.0);
        assert_eq!(elements.to_array()[4], 30.0);
        assert!(OrbitalElements::nan().to_array().iter().all(|v| v.is_nan()));
    }
}
