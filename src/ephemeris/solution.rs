//! # Ephemeritic solution
//!
//! [`EphemeriticSolution`] tabulates the sky positions of an orbit over a
//! window centered on an observation, then reads the sky motion at the
//! center of the window off the table.
//!
//! ```text
//! OrbitalSolution ──engine──> table (JD, RA, DEC, rates)
//!                                 ├── forward_ephemeris: interpolated positions
//!                                 └── velocities / accelerations at the center
//! ```
use tracing::{debug, info};

use crate::{
    config::ExarataConfig,
    constants::{Degree, JulianDay, SECONDS_PER_DAY},
    conversion::current_utc_to_julian_day,
    engine::{resolve_engine, EngineArgument, EphemerisEngine, VehicleArgs, VehicleResults},
    ephemeris::jplhorizons::JplHorizonsWebApi,
    exarata_errors::{EngineError, ExarataError},
    http::ExarataHttp,
    orbit::OrbitalSolution,
    propagate::{polynomial::fit_polynomial, unwrap_ra, wrap_ra},
    table::ColumnTable,
};

/// Ephemeris of a target over a window of time.
///
/// Velocities are in degrees per second, accelerations in degrees per
/// second², both taken at the center of the window.
#[derive(Debug, Clone, PartialEq)]
pub struct EphemeriticSolution {
    ephemeris_table: ColumnTable,
    julian_day: Vec<JulianDay>,
    unwrapped_ra: Vec<Degree>,
    dec: Vec<Degree>,
    center_julian_day: JulianDay,
    ra_velocity: f64,
    dec_velocity: f64,
    ra_acceleration: f64,
    dec_acceleration: f64,
}

impl EphemeriticSolution {
    /// Compute the ephemeris of an orbit.
    ///
    /// Arguments
    /// -----------------
    /// * `orbitals`: the orbit of the target.
    /// * `engine`: an ephemeris engine class.
    /// * `vehicle_args`: `center_julian_day` centers the window, the current
    ///   time otherwise.
    /// * `config`: window span, step and observatory.
    pub fn new(
        orbitals: &OrbitalSolution,
        engine: &EngineArgument,
        vehicle_args: &VehicleArgs,
        config: &ExarataConfig,
        http: &ExarataHttp,
    ) -> Result<Self, ExarataError> {
        let engine = resolve_engine::<EphemerisEngine>(engine)?;
        let center_julian_day = match vehicle_args.get("center_julian_day") {
            Some(center) => center,
            None => current_utc_to_julian_day()?,
        };
        let results = match engine {
            EphemerisEngine::JplHorizonsWebApi => {
                vehicle_jpl_horizons_web_api(orbitals, center_julian_day, config, http)?
            }
        };
        let solution = Self::from_vehicle_results(center_julian_day, results)?;
        info!(
            rows = solution.ephemeris_table.len(),
            ra_velocity = solution.ra_velocity,
            dec_velocity = solution.dec_velocity,
            "ephemeris solved"
        );
        Ok(solution)
    }

    pub(crate) fn from_vehicle_results(
        center_julian_day: JulianDay,
        mut results: VehicleResults,
    ) -> Result<Self, ExarataError> {
        let ephemeris_table = results.take_table("ephemeris_table")?;
        let julian_day = ephemeris_table.require_column("julian_day")?.to_vec();
        let unwrapped_ra = unwrap_ra(ephemeris_table.require_column("ra")?);
        let dec = ephemeris_table.require_column("dec")?.to_vec();

        let seconds: Vec<f64> = julian_day
            .iter()
            .map(|jd| (jd - center_julian_day) * SECONDS_PER_DAY)
            .collect();
        let order = seconds.len().saturating_sub(1).min(2);
        let ra_fit = fit_polynomial(&seconds, &unwrapped_ra, order)?;
        let dec_fit = fit_polynomial(&seconds, &dec, order)?;
        let coefficient = |fit: &[f64], power: usize| fit.get(power).copied().unwrap_or(0.0);

        Ok(EphemeriticSolution {
            ephemeris_table,
            julian_day,
            unwrapped_ra,
            dec,
            center_julian_day,
            ra_velocity: coefficient(&ra_fit, 1),
            dec_velocity: coefficient(&dec_fit, 1),
            ra_acceleration: 2.0 * coefficient(&ra_fit, 2),
            dec_acceleration: 2.0 * coefficient(&dec_fit, 2),
        })
    }

    /// Sky positions at the given Julian days by linear interpolation of the table.
    ///
    /// Return
    /// ----------
    /// * RA in [0, 360) and DEC, or [`ExarataError::Input`] when a time lies
    ///   outside the tabulated window.
    pub fn forward_ephemeris(&self, times: &[JulianDay]) -> Result<(Vec<Degree>, Vec<Degree>), ExarataError> {
        let (Some(&first), Some(&last)) = (self.julian_day.first(), self.julian_day.last()) else {
            return Err(ExarataError::Input("The ephemeris table is empty".into()));
        };
        let mut ra = Vec::with_capacity(times.len());
        let mut dec = Vec::with_capacity(times.len());
        for &time in times {
            if !(first..=last).contains(&time) {
                return Err(ExarataError::Input(format!(
                    "The time JD{time} is outside the ephemeris window JD{first} to JD{last}"
                )));
            }
            let upper = self.julian_day.partition_point(|jd| *jd < time).max(1).min(self.julian_day.len() - 1);
            let lower = upper.saturating_sub(1);
            let span = self.julian_day[upper] - self.julian_day[lower];
            let weight = if span > 0.0 { (time - self.julian_day[lower]) / span } else { 0.0 };
            let lerp = |v: &[f64]| v[lower] + weight * (v[upper] - v[lower]);
            ra.push(wrap_ra(lerp(&self.unwrapped_ra)));
            dec.push(lerp(&self.dec));
        }
        debug!(count = times.len(), "ephemeris interpolated");
        Ok((ra, dec))
    }

    /// The table as returned by the engine, rates in arcseconds per hour.
    pub fn ephemeris_table(&self) -> &ColumnTable {
        &self.ephemeris_table
    }

    /// Center of the tabulated window.
    pub fn center_julian_day(&self) -> JulianDay {
        self.center_julian_day
    }

    /// Degrees per second at the center of the window.
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
}

fn vehicle_jpl_horizons_web_api(
    orbitals: &OrbitalSolution,
    center_julian_day: JulianDay,
    config: &ExarataConfig,
    http: &ExarataHttp,
) -> Result<VehicleResults, ExarataError> {
    let horizons = JplHorizonsWebApi::new(
        http,
        *orbitals.elements(),
        orbitals.epoch_julian_day(),
        &config.mpc_observatory_code,
    );
    let half_span = config.jpl_horizons_query_span_days / 2.0;
    let table = horizons.query_ephemeris(
        center_julian_day - half_span,
        center_julian_day + half_span,
        config.jpl_horizons_query_timestep_seconds,
    )?;
    if table.len() < 2 {
        return Err(EngineError::Failed {
            engine: "JplHorizonsWebApi".into(),
            reason: format!("{} ephemeris row(s) cannot be interpolated", table.len()),
        }
        .into());
    }
    Ok(VehicleResults::new("JplHorizonsWebApi").with("ephemeris_table", table))
}

#[cfg(test)]
mod ephemeris_solution_test {
    use super::*;
    use crate::{
        engine::{OrbitEngine, PropagationEngine},
        ephemeris::jplhorizons::{jplhorizons_test::HORIZONS_RESPONSE, parse_horizons_ephemeris},
        http::CancellationFlag,
    };
    use approx::assert_relative_eq;

    fn solution() -> EphemeriticSolution {
        let table = parse_horizons_ephemeris(HORIZONS_RESPONSE).unwrap();
        let results = VehicleResults::new("JplHorizonsWebApi").with("ephemeris_table", table);
        EphemeriticSolution::from_vehicle_results(2459000.541666667, results).unwrap()
    }

    #[test]
    fn test_velocities_from_table() {
        let solution = solution();
        // 0.01 degree per hour in RA
        assert_relative_eq!(solution.ra_velocity(), 0.01 / 3600.0, epsilon = 1e-9);
        assert_relative_eq!(solution.dec_velocity(), -0.005 / 3600.0, epsilon = 1e-9);
        assert_relative_eq!(solution.ra_acceleration(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_forward_ephemeris_interpolates() {
        let solution = solution();
        let (ra, dec) = solution.forward_ephemeris(&[2459000.5, 2459000.5625]).unwrap();
        assert_relative_eq!(ra[0], 150.0, epsilon = 1e-9);
        assert_relative_eq!(ra[1], 150.015, epsilon = 1e-6);
        assert_relative_eq!(dec[1], 19.9925, epsilon = 1e-6);
        assert!(matches!(
            solution.forward_ephemeris(&[2459001.0]),
            Err(ExarataError::Input(_))
        ));
    }

    #[test]
    fn test_engine_checks_before_any_request() {
        let config = ExarataConfig::default();
        let flag = CancellationFlag::new();
        flag.cancel();
        let http = ExarataHttp::new(&config, flag);
        let records: [&str; 0] = [];
        let args = VehicleArgs::new()
            .with("semimajor_axis", 2.5)
            .with("eccentricity", 0.1)
            .with("inclination", 10.0)
            .with("longitude_ascending_node", 50.0)
            .with("argument_perihelion", 30.0)
            .with("mean_anomaly", 15.0)
            .with("epoch_julian_day", 2459000.5);
        let orbit = OrbitalSolution::new(&records, &OrbitEngine::CustomOrbit.into(), &args, &config).unwrap();

        let wrong = EphemeriticSolution::new(
            &orbit,
            &PropagationEngine::LinearPropagation.into(),
            &VehicleArgs::new(),
            &config,
            &http,
        );
        assert!(matches!(wrong, Err(ExarataError::Engine(EngineError::WrongDomain { .. }))));

        let cancelled = EphemeriticSolution::new(
            &orbit,
            &EphemerisEngine::JplHorizonsWebApi.into(),
            &VehicleArgs::new().with("center_julian_day", 2459000.5),
            &config,
            &http,
        );
        assert_eq!(cancelled, Err(ExarataError::Cancelled));
    }
}
