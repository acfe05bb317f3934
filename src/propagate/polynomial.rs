//! Polynomial fits of right ascension and declination over time.
use nalgebra::{DMatrix, DVector};

use crate::{
    constants::{Degree, JulianDay, SECONDS_PER_DAY},
    conversion::julian_day_to_unix_time,
    engine::{EngineDomain, ExarataEngine, PropagationEngine},
    exarata_errors::ExarataError,
    propagate::{unwrap_ra, wrap_dec, wrap_ra},
};

/// Fewest observations a propagation accepts.
pub const MINIMUM_OBSERVATIONS: usize = 3;

/// Least-squares polynomial coefficients `c0 + c1·x + … + cn·xⁿ`.
///
/// Return
/// ----------
/// * The `order + 1` coefficients, lowest order first, or
///   [`ExarataError::Input`] when there are too few points or the fit is degenerate.
pub fn fit_polynomial(x: &[f64], y: &[f64], order: usize) -> Result<Vec<f64>, ExarataError> {
    if x.len() != y.len() {
        return Err(ExarataError::Input(format!(
            "Cannot fit {} abscissae against {} ordinates",
            x.len(),
            y.len()
        )));
    }
    if x.len() <= order {
        return Err(ExarataError::Input(format!(
            "An order {order} polynomial needs at least {} points, {} given",
            order + 1,
            x.len()
        )));
    }
    // abscissae are scaled to [-1, 1] for conditioning
    let scale = x.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    let scale = if scale > 0.0 { scale } else { 1.0 };
    let design = DMatrix::from_fn(x.len(), order + 1, |row, power| (x[row] / scale).powi(power as i32));
    let target = DVector::from_column_slice(y);
    let coefficients = design
        .svd(true, true)
        .solve(&target, f64::EPSILON)
        .map_err(|message| ExarataError::Input(format!("The polynomial fit failed: {message}")))?;
    Ok(coefficients
        .iter()
        .enumerate()
        .map(|(power, c)| c / scale.powi(power as i32))
        .collect())
}

fn evaluate_polynomial(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// A fitted propagation, linear or quadratic.
///
/// Time is fitted as unix seconds relative to the first observation.
#[derive(Debug, Clone, PartialEq)]
pub struct PolynomialPropagator {
    engine: PropagationEngine,
    reference_unix_time: f64,
    ra_coefficients: Vec<f64>,
    dec_coefficients: Vec<f64>,
}

impl ExarataEngine for PolynomialPropagator {
    fn domain(&self) -> EngineDomain {
        EngineDomain::Propagation
    }

    fn name(&self) -> String {
        format!("{:?}", self.engine)
    }
}

impl PolynomialPropagator {
    /// Fit a propagator.
    ///
    /// Arguments
    /// -----------------
    /// * `engine`: linear or quadratic.
    /// * `ra`, `dec`: positions in degrees.
    /// * `times`: observation times, Julian days.
    ///
    /// Return
    /// ----------
    /// * The propagator, or [`ExarataError::Input`] if the arrays differ in
    ///   length or hold fewer than [`MINIMUM_OBSERVATIONS`] entries.
    pub fn new(
        engine: PropagationEngine,
        ra: &[Degree],
        dec: &[Degree],
        times: &[JulianDay],
    ) -> Result<Self, ExarataError> {
        if ra.len() != dec.len() || ra.len() != times.len() {
            return Err(ExarataError::Input(format!(
                "The RA ({}), DEC ({}) and time ({}) arrays must be parallel",
                ra.len(),
                dec.len(),
                times.len()
            )));
        }
        if times.len() < MINIMUM_OBSERVATIONS {
            return Err(ExarataError::Input(format!(
                "Propagation needs at least {MINIMUM_OBSERVATIONS} observations, {} given",
                times.len()
            )));
        }
        let order = match engine {
            PropagationEngine::LinearPropagation => 1,
            PropagationEngine::QuadraticPropagation => 2,
        };
        let reference_unix_time = julian_day_to_unix_time(times[0]);
        let seconds: Vec<f64> = times
            .iter()
            .map(|t| julian_day_to_unix_time(*t) - reference_unix_time)
            .collect();
        Ok(PolynomialPropagator {
            engine,
            reference_unix_time,
            ra_coefficients: fit_polynomial(&seconds, &unwrap_ra(ra), order)?,
            dec_coefficients: fit_polynomial(&seconds, dec, order)?,
        })
    }

    pub fn linear(ra: &[Degree], dec: &[Degree], times: &[JulianDay]) -> Result<Self, ExarataError> {
        Self::new(PropagationEngine::LinearPropagation, ra, dec, times)
    }

    pub fn quadratic(ra: &[Degree], dec: &[Degree], times: &[JulianDay]) -> Result<Self, ExarataError> {
        Self::new(PropagationEngine::QuadraticPropagation, ra, dec, times)
    }

    pub fn engine(&self) -> PropagationEngine {
        self.engine
    }

    /// Coefficients of RA(seconds) and DEC(seconds), lowest order first.
    pub fn coefficients(&self) -> (&[f64], &[f64]) {
        (&self.ra_coefficients, &self.dec_coefficients)
    }

    /// Polynomial values without wrapping, for differentiation.
    pub(crate) fn evaluate(&self, time: JulianDay) -> (Degree, Degree) {
        let seconds = julian_day_to_unix_time(time) - self.reference_unix_time;
        (
            evaluate_polynomial(&self.ra_coefficients, seconds),
            evaluate_polynomial(&self.dec_coefficients, seconds),
        )
    }

    /// Positions at the given Julian days, RA in [0, 360) and DEC in [-90, 90].
    pub fn forward_propagate(&self, times: &[JulianDay]) -> (Vec<Degree>, Vec<Degree>) {
        times
            .iter()
            .map(|t| {
                let (ra, dec) = self.evaluate(*t);
                (wrap_ra(ra), wrap_dec(dec))
            })
            .unzip()
    }

    /// Fitted rate of change at a time, degrees per day.
    pub fn velocity(&self, time: JulianDay) -> (f64, f64) {
        let seconds = julian_day_to_unix_time(time) - self.reference_unix_time;
        let derivative = |c: &[f64]| {
            c.iter()
                .enumerate()
                .skip(1)
                .map(|(power, coefficient)| power as f64 * coefficient * seconds.powi(power as i32 - 1))
                .sum::<f64>()
                * SECONDS_PER_DAY
        };
        (derivative(&self.ra_coefficients), derivative(&self.dec_coefficients))
    }
}

#[cfg(test)]
mod polynomial_test {
    use super::*;
    use approx::assert_relative_eq;

    const T0: JulianDay = 2459000.5;

    #[test]
    fn test_fit_polynomial_exact() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y: Vec<f64> = x.iter().map(|v| 1.0 - 2.0 * v + 0.5 * v * v).collect();
        let coefficients = fit_polynomial(&x, &y, 2).unwrap();
        assert_relative_eq!(coefficients[0], 1.0, epsilon = 1e-10);
        assert_relative_eq!(coefficients[1], -2.0, epsilon = 1e-10);
        assert_relative_eq!(coefficients[2], 0.5, epsilon = 1e-10);
        assert!(fit_polynomial(&[1.0, 2.0], &[1.0, 2.0], 2).is_err());
    }

    #[test]
    fn test_linear_propagation() {
        // 1 degree per day in RA, -0.5 in DEC
        let times = [T0, T0 + 0.1, T0 + 0.2, T0 + 0.3];
        let ra: Vec<f64> = times.iter().map(|t| 100.0 + (t - T0)).collect();
        let dec: Vec<f64> = times.iter().map(|t| 20.0 - 0.5 * (t - T0)).collect();
        let propagator = PolynomialPropagator::linear(&ra, &dec, &times).unwrap();
        let (future_ra, future_dec) = propagator.forward_propagate(&[T0 + 1.0]);
        assert_relative_eq!(future_ra[0], 101.0, epsilon = 1e-6);
        assert_relative_eq!(future_dec[0], 19.5, epsilon = 1e-6);
        let (ra_rate, dec_rate) = propagator.velocity(T0 + 1.0);
        assert_relative_eq!(ra_rate, 1.0, epsilon = 1e-6);
        assert_relative_eq!(dec_rate, -0.5, epsilon = 1e-6);
        assert_eq!(propagator.coefficients().0.len(), 2);
    }

    #[test]
    fn test_quadratic_propagation_across_ra_zero() {
        let times = [T0, T0 + 0.25, T0 + 0.5, T0 + 0.75];
        let ra: Vec<f64> = times
            .iter()
            .map(|t| wrap_ra(359.0 + 2.0 * (t - T0) + (t - T0).powi(2)))
            .collect();
        let dec = vec![-10.0; 4];
        let propagator = PolynomialPropagator::quadratic(&ra, &dec, &times).unwrap();
        let (future_ra, future_dec) = propagator.forward_propagate(&[T0 + 1.0]);
        // 359 + 2 + 1 wraps to 2
        assert_relative_eq!(future_ra[0], 2.0, epsilon = 1e-6);
        assert_relative_eq!(future_dec[0], -10.0, epsilon = 1e-6);
        assert_eq!(propagator.name(), "QuadraticPropagation");
    }

    #[test]
    fn test_input_validation() {
        let short = PolynomialPropagator::linear(&[1.0, 2.0], &[1.0, 2.0], &[T0, T0 + 1.0]);
        assert!(matches!(short, Err(ExarataError::Input(m)) if m.contains("at least 3")));
        let ragged = PolynomialPropagator::linear(&[1.0, 2.0, 3.0], &[1.0, 2.0], &[T0, T0 + 1.0, T0 + 2.0]);
        assert!(matches!(ragged, Err(ExarataError::Input(m)) if m.contains("parallel")));
    }
}
