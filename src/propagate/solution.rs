//! # Propagative solution
//!
//! [`PropagativeSolution`] fits the recent sky positions of a target against
//! time and extrapolates them, with no orbit involved. It suits the short
//! gaps between two images of one night.
//!
//! RA is unwrapped before the fit so a target crossing 0° keeps a smooth
//! track; predictions are wrapped back into [0, 360).
use itertools::Itertools;
use tracing::info;

use crate::{
    constants::{Degree, JulianDay},
    engine::{resolve_engine, EngineArgument, PropagationEngine, VehicleResults},
    exarata_errors::{EngineError, ExarataError},
    propagate::{polynomial::PolynomialPropagator, unwrap_ra},
};

/// Samples taken over the last three observations to difference the fit.
const DIFFERENCE_SAMPLES: usize = 5;

/// Short-term motion of a target from its recent positions.
///
/// Velocities are in degrees per day, accelerations in degrees per day².
/// The `raw_*` values come from the observations directly, the others from
/// the fitted propagation.
#[derive(Debug, Clone, PartialEq)]
pub struct PropagativeSolution {
    ra: Vec<Degree>,
    dec: Vec<Degree>,
    times: Vec<JulianDay>,
    propagator: PolynomialPropagator,
    ra_velocity: f64,
    dec_velocity: f64,
    ra_acceleration: f64,
    dec_acceleration: f64,
    raw_ra_velocity: f64,
    raw_dec_velocity: f64,
    raw_ra_acceleration: f64,
    raw_dec_acceleration: f64,
}

impl PropagativeSolution {
    /// Fit the motion of a target.
    ///
    /// Arguments
    /// -----------------
    /// * `ra`, `dec`: observed positions in degrees, oldest first.
    /// * `times`: observation times in Julian days.
    /// * `engine`: a propagation engine class.
    pub fn new(
        ra: &[Degree],
        dec: &[Degree],
        times: &[JulianDay],
        engine: &EngineArgument,
    ) -> Result<Self, ExarataError> {
        let engine = resolve_engine::<PropagationEngine>(engine)?;
        let mut results = match engine {
            PropagationEngine::LinearPropagation | PropagationEngine::QuadraticPropagation => {
                vehicle_polynomial_propagation(engine, ra, dec, times)?
            }
        };
        let propagator = results.take_propagator("propagator")?;
        let ra_velocity = results.take_number("ra_velocity")?;
        let dec_velocity = results.take_number("dec_velocity")?;
        let ra_acceleration = results.take_number("ra_acceleration")?;
        let dec_acceleration = results.take_number("dec_acceleration")?;

        let raw = raw_motion(ra, dec, times);
        info!(engine = ?engine, ra_velocity, dec_velocity, "propagation fitted");
        Ok(PropagativeSolution {
            ra: ra.to_vec(),
            dec: dec.to_vec(),
            times: times.to_vec(),
            propagator,
            ra_velocity,
            dec_velocity,
            ra_acceleration,
            dec_acceleration,
            raw_ra_velocity: raw.0,
            raw_dec_velocity: raw.1,
            raw_ra_acceleration: raw.2,
            raw_dec_acceleration: raw.3,
        })
    }

    /// Predicted positions at the given Julian days.
    ///
    /// Return
    /// ----------
    /// * RA in [0, 360) and DEC, in degrees.
    pub fn forward_propagate(&self, times: &[JulianDay]) -> (Vec<Degree>, Vec<Degree>) {
        self.propagator.forward_propagate(times)
    }

    pub fn ra(&self) -> &[Degree] {
        &self.ra
    }

    pub fn dec(&self) -> &[Degree] {
        &self.dec
    }

    pub fn times(&self) -> &[JulianDay] {
        &self.times
    }

    /// The fitted polynomials.
    pub fn propagator(&self) -> &PolynomialPropagator {
        &self.propagator
    }

    pub fn ra_velocity(&self) -> f64 {
        self.ra_velocity
    }

    pub fn dec_velocity(&self) -> f64 {
        self.dec_velocity
    }

    pub fn ra_acceleration(&self) -> f64 {
        self.ra_acceleration
    }

    pub fn dec_acceleration(&self) -> f64 {
        self.dec_acceleration
    }

    /// From the last two observations, without the fit.
    pub fn raw_ra_velocity(&self) -> f64 {
        self.raw_ra_velocity
    }

    pub fn raw_dec_velocity(&self) -> f64 {
        self.raw_dec_velocity
    }

    pub fn raw_ra_acceleration(&self) -> f64 {
        self.raw_ra_acceleration
    }

    pub fn raw_dec_acceleration(&self) -> f64 {
        self.raw_dec_acceleration
    }
}

fn linspace(start: f64, stop: f64, count: usize) -> Vec<f64> {
    let step = (stop - start) / (count - 1) as f64;
    (0..count).map(|i| start + step * i as f64).collect()
}

fn vehicle_polynomial_propagation(
    engine: PropagationEngine,
    ra: &[Degree],
    dec: &[Degree],
    times: &[JulianDay],
) -> Result<VehicleResults, ExarataError> {
    let propagator = PolynomialPropagator::new(engine, ra, dec, times)?;

    let samples = linspace(times[times.len() - 3], times[times.len() - 1], DIFFERENCE_SAMPLES);
    let step = samples[DIFFERENCE_SAMPLES - 1] - samples[DIFFERENCE_SAMPLES - 2];
    let (sample_ra, sample_dec): (Vec<f64>, Vec<f64>) = samples.iter().map(|t| propagator.evaluate(*t)).unzip();
    let velocity = |v: &[f64]| (v[4] - v[3]) / step;
    let acceleration = |v: &[f64]| (v[4] - 2.0 * v[3] + v[2]) / step.powi(2);

    Ok(VehicleResults::new(format!("{engine:?}"))
        .with("ra_velocity", velocity(&sample_ra))
        .with("dec_velocity", velocity(&sample_dec))
        .with("ra_acceleration", acceleration(&sample_ra))
        .with("dec_acceleration", acceleration(&sample_dec))
        .with("propagator", propagator))
}

/// Velocities and accelerations from the last first and second differences
/// of the observations: `(ra_v, dec_v, ra_a, dec_a)`.
///
/// Velocities sit at the midpoints of the observation intervals; the
/// acceleration differences the last two of them.
fn raw_motion(ra: &[Degree], dec: &[Degree], times: &[JulianDay]) -> (f64, f64, f64, f64) {
    let differences = |v: &[f64]| v.iter().tuple_windows().map(|(a, b)| b - a).collect::<Vec<f64>>();
    let delta_time = differences(times);
    let mid_time: Vec<f64> = times.iter().tuple_windows().map(|(a, b)| (a + b) / 2.0).collect();
    let rates = |positions: &[f64]| {
        differences(positions)
            .iter()
            .zip(&delta_time)
            .map(|(delta, dt)| delta / dt)
            .collect::<Vec<f64>>()
    };
    let ra_rates = rates(&unwrap_ra(ra));
    let dec_rates = rates(dec);
    let delta_mid_time = differences(&mid_time);

    let last = |v: &[f64]| v.last().copied().unwrap_or(f64::NAN);
    (
        last(&ra_rates),
        last(&dec_rates),
        last(&differences(&ra_rates)) / last(&delta_mid_time),
        last(&differences(&dec_rates)) / last(&delta_mid_time),
    )
}
