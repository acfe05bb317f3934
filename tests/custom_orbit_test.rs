mod common;

use common::{assert_elements_close, custom_orbit_args};
use opihiexarata::{
    config::ExarataConfig,
    engine::{EngineArgument, OrbitEngine},
    exarata_errors::{EngineError, ExarataError},
    orbit::{CustomOrbitEngine, OrbitalElements, OrbitalSolution},
};

#[test]
fn test_custom_orbit_keeps_elements() {
    let records: [&str; 0] = [];
    let orbit = OrbitalSolution::new(
        &records,
        &OrbitEngine::CustomOrbit.into(),
        &custom_orbit_args(),
        &ExarataConfig::default(),
    )
    .unwrap();

    assert_eq!(orbit.semimajor_axis(), 2.5);
    assert!(orbit.semimajor_axis_error().is_nan());
    assert_elements_close(
        orbit.elements(),
        &OrbitalElements::from_array([2.5, 0.1, 10.0, 50.0, 30.0, 15.0]),
        0.0,
    );
    assert!(orbit.errors().to_array().iter().all(|error| error.is_nan()));
    assert_eq!(orbit.epoch_julian_day(), 2459000.5);
}

#[test]
fn test_custom_orbit_errors_are_carried() {
    let records: [&str; 0] = [];
    let args = custom_orbit_args().with("semimajor_axis_error", 0.01);
    let orbit = OrbitalSolution::new(&records, &OrbitEngine::CustomOrbit.into(), &args, &ExarataConfig::default())
        .unwrap();
    assert_eq!(orbit.semimajor_axis_error(), 0.01);
    assert!(orbit.eccentricity_error().is_nan());
}

#[test]
fn test_custom_orbit_engine_instance_is_rejected() {
    let engine = CustomOrbitEngine::from_vehicle_args(&custom_orbit_args()).unwrap();
    let records: [&str; 0] = [];
    let result = OrbitalSolution::new(
        &records,
        &EngineArgument::instance(engine),
        &custom_orbit_args(),
        &ExarataConfig::default(),
    );
    assert!(matches!(
        result,
        Err(ExarataError::Engine(EngineError::InstanceNotClass { .. }))
    ));
}
