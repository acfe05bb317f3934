//! User provided orbital elements.
use crate::{
    constants::JulianDay,
    engine::{EngineDomain, ExarataEngine, VehicleArgs},
    exarata_errors::ExarataError,
    orbit::OrbitalElements,
};

/// An orbit whose elements are given rather than fitted.
///
/// Values are kept exactly as provided. Errors which were not provided are NaN.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CustomOrbitEngine {
    elements: OrbitalElements,
    errors: OrbitalElements,
    epoch_julian_day: JulianDay,
}

impl ExarataEngine for CustomOrbitEngine {
    fn domain(&self) -> EngineDomain {
        EngineDomain::Orbit
    }

    fn name(&self) -> String {
        "CustomOrbit".into()
    }
}

impl CustomOrbitEngine {
    pub fn builder() -> CustomOrbitEngineBuilder {
        CustomOrbitEngineBuilder::new()
    }

    /// Build from vehicle arguments keyed by element name, `{name}_error` for
    /// the errors and `epoch_julian_day` for the epoch.
    pub fn from_vehicle_args(args: &VehicleArgs) -> Result<Self, ExarataError> {
        let mut builder = CustomOrbitEngineBuilder::new();
        for (index, name) in OrbitalElements::NAMES.iter().enumerate() {
            builder.values[index] = args.get(name);
            if let Some(error) = args.get(&format!("{name}_error")) {
                builder.errors[index] = error;
            }
        }
        builder.epoch_julian_day = args.get("epoch_julian_day");
        builder.build()
    }

    pub fn elements(&self) -> &OrbitalElements {
        &self.elements
    }

    pub fn errors(&self) -> &OrbitalElements {
        &self.errors
    }

    pub fn epoch_julian_day(&self) -> JulianDay {
        self.epoch_julian_day
    }
}

/// Builder for [`CustomOrbitEngine`]. The six elements and the epoch are required.
#[derive(Debug, Clone)]
pub struct CustomOrbitEngineBuilder {
    values: [Option<f64>; 6],
    errors: [f64; 6],
    epoch_julian_day: Option<JulianDay>,
}

impl Default for CustomOrbitEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CustomOrbitEngineBuilder {
    pub fn new() -> Self {
        Self {
            values: [None; 6],
            errors: [f64::NAN; 6],
            epoch_julian_day: None,
        }
    }

    fn set(mut self, index: usize, v: f64) -> Self {
        self.values[index] = Some(v);
        self
    }

    fn set_error(mut self, index: usize, v: f64) -> Self {
        self.errors[index] = v;
        self
    }

    // --- Elements (AU, degrees) ---
    pub fn semimajor_axis(self, v: f64) -> Self {
        self.set(0, v)
    }
    pub fn eccentricity(self, v: f64) -> Self {
        self.set(1, v)
    }
    pub fn inclination(self, v: f64) -> Self {
        self.set(2, v)
    }
    pub fn longitude_ascending_node(self, v: f64) -> Self {
        self.set(3, v)
    }
    pub fn argument_perihelion(self, v: f64) -> Self {
        self.set(4, v)
    }
    pub fn mean_anomaly(self, v: f64) -> Self {
        self.set(5, v)
    }
    pub fn epoch_julian_day(mut self, v: JulianDay) -> Self {
        self.epoch_julian_day = Some(v);
        self
    }

    // --- Errors ---
    pub fn semimajor_axis_error(self, v: f64) -> Self {
        self.set_error(0, v)
    }
    pub fn eccentricity_error(self, v: f64) -> Self {
        self.set_error(1, v)
    }
    pub fn inclination_error(self, v: f64) -> Self {
        self.set_error(2, v)
    }
    pub fn longitude_ascending_node_error(self, v: f64) -> Self {
        self.set_error(3, v)
    }
    pub fn argument_perihelion_error(self, v: f64) -> Self {
        self.set_error(4, v)
    }
    pub fn mean_anomaly_error(self, v: f64) -> Self {
        self.set_error(5, v)
    }

    /// Finalize the orbit.
    ///
    /// Return
    /// ----------
    /// * The engine, or [`ExarataError::Input`] naming the first missing element.
    pub fn build(self) -> Result<CustomOrbitEngine, ExarataError> {
        let mut values = [0.0; 6];
        for (index, value) in self.values.iter().enumerate() {
            values[index] = value.ok_or_else(|| {
                ExarataError::Input(format!(
                    "The custom orbit requires the element `{}`",
                    OrbitalElements::NAMES[index]
                ))
            })?;
        }
        let epoch_julian_day = self.epoch_julian_day.ok_or_else(|| {
            ExarataError::Input("The custom orbit requires the element `epoch_julian_day`".into())
        })?;
        Ok(CustomOrbitEngine {
            elements: OrbitalElements::from_array(values),
            errors: OrbitalElements::from_array(self.errors),
            epoch_julian_day,
        })
    }
}

#[cfg(test)]
mod custom_test {
    use super::*;

    fn ceres_like() -> CustomOrbitEngineBuilder {
        CustomOrbitEngine::builder()
            .semimajor_axis(2.5)
            .eccentricity(0.1)
            .inclination(10.0)
            .longitude_ascending_node(50.0)
            .argument_perihelion(30.0)
            .mean_anomaly(15.0)
            .epoch_julian_day(2459000.5)
    }

    #[test]
    fn test_elements_kept_exactly_and_errors_nan() {
        let orbit = ceres_like().build().unwrap();
        assert_eq!(
            orbit.elements(),
            &OrbitalElements::from_array([2.5, 0.1, 10.0, 50.0, 30.0, 15.0])
        );
        assert_eq!(orbit.epoch_julian_day(), 2459000.5);
        assert!(orbit.errors().to_array().iter().all(|e| e.is_nan()));
    }

    #[test]
    fn test_partial_errors() {
        let orbit = ceres_like().inclination_error(0.25).build().unwrap();
        assert_eq!(orbit.errors().inclination, 0.25);
        assert!(orbit.errors().semimajor_axis.is_nan());
    }

    #[test]
    fn test_missing_element_is_input_error() {
        let result = CustomOrbitEngine::builder().semimajor_axis(2.5).build();
        assert_eq!(
            result,
            Err(ExarataError::Input(
                "The custom orbit requires the element `eccentricity`".into()
            ))
        );
        let no_epoch = CustomOrbitEngine::builder()
            .semimajor_axis(2.5)
            .eccentricity(0.1)
            .inclination(10.0)
            .longitude_ascending_node(50.0)
            .argument_perihelion(30.0)
            .mean_anomaly(15.0)
            .build();
        assert!(matches!(no_epoch, Err(ExarataError::Input(m)) if m.contains("epoch")));
    }

    #[test]
    fn test_from_vehicle_args() {
        let args = VehicleArgs::new()
            .with("semimajor_axis", 2.5)
            .with("eccentricity", 0.1)
            .with("inclination", 10.0)
            .with("longitude_ascending_node", 50.0)
            .with("argument_perihelion", 30.0)
            .with("mean_anomaly", 15.0)
            .with("mean_anomaly_error", 0.5)
            .with("epoch_julian_day", 2459000.5);
        let orbit = CustomOrbitEngine::from_vehicle_args(&args).unwrap();
        assert_eq!(orbit, ceres_like().mean_anomaly_error(0.5).build().unwrap());
    }
}
