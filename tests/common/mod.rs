#![allow(dead_code)]

use approx::assert_relative_eq;
use camino::Utf8Path;
use opihiexarata::{engine::VehicleArgs, orbit::OrbitalElements};

pub const K22A01A_RECORD: &str = "tests/data/K22A01A.obs";

pub fn record_path() -> &'static Utf8Path {
    Utf8Path::new(K22A01A_RECORD)
}

/// Vehicle arguments of the orbit a=2.5, e=0.1, i=10, Ω=50, ω=30, M=15 at JD 2459000.5.
pub fn custom_orbit_args() -> VehicleArgs {
    VehicleArgs::new()
        .with("semimajor_axis", 2.5)
        .with("eccentricity", 0.1)
        .with("inclination", 10.0)
        .with("longitude_ascending_node", 50.0)
        .with("argument_perihelion", 30.0)
        .with("mean_anomaly", 15.0)
        .with("epoch_julian_day", 2459000.5)
}

pub fn assert_elements_close(actual: &OrbitalElements, expected: &OrbitalElements, epsilon: f64) {
    assert_relative_eq!(actual.semimajor_axis, expected.semimajor_axis, epsilon = epsilon);
    assert_relative_eq!(actual.eccentricity, expected.eccentricity, epsilon = epsilon);
    assert_relative_eq!(actual.inclination, expected.inclination, epsilon = epsilon);
    assert_relative_eq!(
        actual.longitude_ascending_node,
        expected.longitude_ascending_node,
        epsilon = epsilon
    );
    assert_relative_eq!(
        actual.argument_perihelion,
        expected.argument_perihelion,
        epsilon = epsilon
    );
    assert_relative_eq!(actual.mean_anomaly, expected.mean_anomaly, epsilon = epsilon);
}
