//! # Orbital solution
//!
//! [`OrbitalSolution`] holds the classical elements of the target orbit,
//! either fitted by OrbFit from an MPC record or given directly as a custom
//! orbit, together with their errors.
//!
//! ## Elements
//!
//! | element | unit |
//! |---|---|
//! | semimajor axis `a` | AU |
//! | eccentricity `e` | none |
//! | inclination `i` | degrees |
//! | longitude of the ascending node `Ω` | degrees |
//! | argument of perihelion `ω` | degrees |
//! | mean anomaly `M` | degrees |
//!
//! The epoch is a Julian day.
//!
//! ## Anomalies
//!
//! The eccentric anomaly solves Kepler's equation from `M` and `e`
//! ([`calculate_eccentric_anomaly`]); the true anomaly follows from it
//! ([`calculate_true_anomaly`]). Their errors are the mean spread of each
//! anomaly when `M` moves by its own error, both ways.
//!
//! Only elliptical orbits (`0 ≤ e < 1`) are handled.
use std::f64::consts::PI;

use tracing::{debug, info};

use crate::{
    config::ExarataConfig,
    constants::{Degree, JulianDay, RADEG},
    conversion::modified_julian_day_to_julian_day,
    engine::{resolve_engine, EngineArgument, OrbitEngine, VehicleArgs, VehicleResults},
    exarata_errors::{EngineError, ExarataError},
    orbit::{CustomOrbitEngine, OrbfitOrbitEngine, OrbitalElements},
};

const NEWTON_MAX_ITERATIONS: usize = 100;
const NEWTON_TOLERANCE: f64 = 1e-12;

/// Orbit of the target with its anomalies.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitalSolution {
    elements: OrbitalElements,
    errors: OrbitalElements,
    epoch_julian_day: JulianDay,
    eccentric_anomaly: Degree,
    eccentric_anomaly_error: Degree,
    true_anomaly: Degree,
    true_anomaly_error: Degree,
}

impl OrbitalSolution {
    /// Determine the orbit of a target.
    ///
    /// Arguments
    /// -----------------
    /// * `records`: MPC 80-column observation lines of the target.
    /// * `engine`: an orbit engine class.
    /// * `vehicle_args`: the elements for [`OrbitEngine::CustomOrbit`]; OrbFit
    ///   takes none.
    /// * `config`: OrbFit install and error fractions.
    pub fn new<S: AsRef<str>>(
        records: &[S],
        engine: &EngineArgument,
        vehicle_args: &VehicleArgs,
        config: &ExarataConfig,
    ) -> Result<Self, ExarataError> {
        let engine = resolve_engine::<OrbitEngine>(engine)?;
        let results = match engine {
            OrbitEngine::Orbfit => vehicle_orbfit(records, config)?,
            OrbitEngine::CustomOrbit => vehicle_custom_orbit(vehicle_args)?,
        };
        let solution = Self::from_vehicle_results(results)?;
        info!(
            engine = ?engine,
            a = solution.elements.semimajor_axis,
            e = solution.elements.eccentricity,
            epoch = solution.epoch_julian_day,
            "orbit solved"
        );
        Ok(solution)
    }

    pub(crate) fn from_vehicle_results(mut results: VehicleResults) -> Result<Self, EngineError> {
        let mut elements = [0.0; 6];
        let mut errors = [0.0; 6];
        for (index, name) in ELEMENT_FIELDS.into_iter().enumerate() {
            elements[index] = results.take_number(name)?;
        }
        for (index, name) in ERROR_FIELDS.into_iter().enumerate() {
            errors[index] = results.take_number(name)?;
        }
        let epoch_julian_day = results.take_number("epoch_julian_day")?;

        let elements = OrbitalElements::from_array(elements);
        let errors = OrbitalElements::from_array(errors);
        let (eccentric_anomaly, eccentric_anomaly_error) = bounded_value(
            |m| calculate_eccentric_anomaly(m, elements.eccentricity),
            elements.mean_anomaly,
            errors.mean_anomaly,
        );
        let (true_anomaly, true_anomaly_error) = bounded_value(
            |ea| calculate_true_anomaly(ea, elements.eccentricity),
            eccentric_anomaly,
            eccentric_anomaly_error,
        );

        Ok(OrbitalSolution {
            elements,
            errors,
            epoch_julian_day,
            eccentric_anomaly,
            eccentric_anomaly_error,
            true_anomaly,
            true_anomaly_error,
        })
    }

    /// The six elements, see [`OrbitalElements::NAMES`].
    pub fn elements(&self) -> &OrbitalElements {
        &self.elements
    }

    /// One sigma errors of [`OrbitalSolution::elements`], in the same units.
    pub fn errors(&self) -> &OrbitalElements {
        &self.errors
    }

    /// AU.
    pub fn semimajor_axis(&self) -> f64 {
        self.elements.semimajor_axis
    }

    pub fn semimajor_axis_error(&self) -> f64 {
        self.errors.semimajor_axis
    }

    pub fn eccentricity(&self) -> f64 {
        self.elements.eccentricity
    }

    pub fn eccentricity_error(&self) -> f64 {
        self.errors.eccentricity
    }

    pub fn inclination(&self) -> Degree {
        self.elements.inclination
    }

    pub fn inclination_error(&self) -> Degree {
        self.errors.inclination
    }

    pub fn longitude_ascending_node(&self) -> Degree {
        self.elements.longitude_ascending_node
    }

    pub fn longitude_ascending_node_error(&self) -> Degree {
        self.errors.longitude_ascending_node
    }

    pub fn argument_perihelion(&self) -> Degree {
        self.elements.argument_perihelion
    }

    pub fn argument_perihelion_error(&self) -> Degree {
        self.errors.argument_perihelion
    }

    pub fn mean_anomaly(&self) -> Degree {
        self.elements.mean_anomaly
    }

    pub fn mean_anomaly_error(&self) -> Degree {
        self.errors.mean_anomaly
    }

    /// Osculating epoch of the elements.
    pub fn epoch_julian_day(&self) -> JulianDay {
        self.epoch_julian_day
    }

    /// Eccentric anomaly at the epoch.
    pub fn eccentric_anomaly(&self) -> Degree {
        self.eccentric_anomaly
    }

    pub fn eccentric_anomaly_error(&self) -> Degree {
        self.eccentric_anomaly_error
    }

    /// True anomaly at the epoch.
    pub fn true_anomaly(&self) -> Degree {
        self.true_anomaly
    }

    pub fn true_anomaly_error(&self) -> Degree {
        self.true_anomaly_error
    }
}

const ELEMENT_FIELDS: [&str; 6] = OrbitalElements::NAMES;

const ERROR_FIELDS: [&str; 6] = [
    "semimajor_axis_error",
    "eccentricity_error",
    "inclination_error",
    "longitude_ascending_node_error",
    "argument_perihelion_error",
    "mean_anomaly_error",
];

/// Value of `f` at `x` and the mean distance to its values at `x ± error`.
fn bounded_value(f: impl Fn(f64) -> f64, x: f64, error: f64) -> (f64, f64) {
    let value = f(x);
    let lower = f(x - error);
    let upper = f(x + error);
    (value, ((lower - value).abs() + (upper - value).abs()) / 2.0)
}

/// Solve Kepler's equation `E − e·sin E = M` by Newton's method.
///
/// Arguments
/// -----------------
/// * `mean_anomaly`: M in degrees.
/// * `eccentricity`: e, elliptical orbits only.
///
/// Return
/// ----------
/// * E in degrees, NaN if M is not finite.
pub fn calculate_eccentric_anomaly(mean_anomaly: Degree, eccentricity: f64) -> Degree {
    if !mean_anomaly.is_finite() || !eccentricity.is_finite() {
        return f64::NAN;
    }
    let m = mean_anomaly * RADEG;
    let mut ea = if eccentricity <= 0.7 { m } else { PI };
    for _ in 0..NEWTON_MAX_ITERATIONS {
        let step = (ea - eccentricity * ea.sin() - m) / (1.0 - eccentricity * ea.cos());
        ea -= step;
        if step.abs() < NEWTON_TOLERANCE {
            break;
        }
    }
    ea / RADEG
}

/// True anomaly from the eccentric anomaly (degrees), using the
/// `β = e / (1 + sqrt(1 − e²))` form which stays stable near e = 1.
pub fn calculate_true_anomaly(eccentric_anomaly: Degree, eccentricity: f64) -> Degree {
    let ea = eccentric_anomaly * RADEG;
    let beta = eccentricity / (1.0 + (1.0 - eccentricity.powi(2)).sqrt());
    let nu = ea + 2.0 * (beta * ea.sin()).atan2(1.0 - beta * ea.cos());
    nu / RADEG
}

fn vehicle_orbfit<S: AsRef<str>>(records: &[S], config: &ExarataConfig) -> Result<VehicleResults, ExarataError> {
    let orbfit = OrbfitOrbitEngine::new(config)?;
    let solve = orbfit.solve_orbit_via_record(records)?;
    debug!(epoch_mjd = solve.epoch_mjd, "OrbFit epoch");
    Ok(element_results(
        "Orbfit",
        &solve.elements,
        &solve.errors,
        modified_julian_day_to_julian_day(solve.epoch_mjd),
    ))
}

/// The observation record plays no part in a custom orbit.
fn vehicle_custom_orbit(vehicle_args: &VehicleArgs) -> Result<VehicleResults, EngineError> {
    let custom = CustomOrbitEngine::from_vehicle_args(vehicle_args).map_err(|err| EngineError::Failed {
        engine: "CustomOrbit".into(),
        reason: format!("the orbital elements were not passed through the vehicle arguments: {err}"),
    })?;
    Ok(element_results(
        "CustomOrbit",
        custom.elements(),
        custom.errors(),
        custom.epoch_julian_day(),
    ))
}

fn element_results(
    engine: &str,
    elements: &OrbitalElements,
    errors: &OrbitalElements,
    epoch_julian_day: JulianDay,
) -> VehicleResults {
    let mut results = VehicleResults::new(engine);
    for ((name, error_name), (value, error)) in ELEMENT_FIELDS
        .into_iter()
        .zip(ERROR_FIELDS)
        .zip(elements.to_array().into_iter().zip(errors.to_array()))
    {
        results.insert(name, value);
        results.insert(error_name, error);
    }
    results.insert("epoch_julian_day", epoch_julian_day);
    results
}
