//! # Opihi image solutions
//!
//! [`OpihiSolution`] gathers everything known about one Opihi image: the
//! header values, the target asteroid and the five domain solutions computed
//! from them.
//!
//! Solutions depend on each other:
//!
//! ```text
//! astrometry ──► photometry
//!     ├────────► orbit ──► ephemeris
//!     └────────► propagation
//! ```
//!
//! Calling a solve before its prerequisite is an
//! [`ExarataError::SequentialOrder`]; nothing is solved implicitly.
use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info, warn};

use crate::{
    astrometry::AstrometricSolution,
    config::ExarataConfig,
    constants::{JulianDay, Pixel, SECONDS_PER_DAY},
    conversion::{
        degrees_per_second_to_arcsec_per_second, degrees_to_sexagesimal_ra_dec, filter_header_string_to_filter_name,
        modified_julian_day_to_julian_day,
    },
    engine::{AnyEngine, EngineArgument, EngineDomain, OrbitEngine, VehicleArgs},
    ephemeris::EphemeriticSolution,
    exarata_errors::{ExarataError, TerminalError},
    fits::{self, FitsHeader, HeaderValue},
    http::ExarataHttp,
    mpcrecord::{self, MpcObservation, MpcRecord, MPC_RECORD_LENGTH},
    orbit::OrbitalSolution,
    pathname,
    photometry::PhotometricSolution,
    propagate::PropagativeSolution,
};

/// Sexagesimal precision of the coordinates written to FITS headers.
const HEADER_SEXAGESIMAL_PRECISION: usize = 2;

/// Values taken from the caller instead of the image header, and the target.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpihiOverrides {
    /// One letter filter name, instead of `FWHL`.
    pub filter_name: Option<String>,
    /// Seconds, instead of `ITIME`.
    pub exposure_time: Option<f64>,
    /// Julian day, instead of `MJD_OBS`.
    pub observing_time: Option<JulianDay>,
    pub asteroid_name: Option<String>,
    pub asteroid_location: Option<(Pixel, Pixel)>,
    pub asteroid_radius: Option<Pixel>,
    /// Earlier MPC 80-column records of the asteroid.
    pub asteroid_history: Option<Vec<String>>,
}

/// Whether the last solve of a domain produced a solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// The solution is stored and can be read back.
    Solved,
    /// The engine failed; the domain holds no solution.
    Failed,
}

/// Outcome of the last solve of a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolveRecord {
    pub status: SolveStatus,
    /// The engine class used, `None` when an instance was handed instead.
    pub engine: Option<AnyEngine>,
}

/// One Opihi image and the solutions computed from it.
///
/// See also
/// ------------
/// * [`crate::tasks::SolveTaskRunner`] to solve in the background.
/// * [`OpihiSolution::save_to_fits_file`] to keep the results with the image.
#[derive(Debug, Clone, PartialEq)]
pub struct OpihiSolution {
    fits_path: Utf8PathBuf,
    config: ExarataConfig,

    filter_name: Option<String>,
    exposure_time: Option<f64>,
    observing_time: JulianDay,

    asteroid_name: Option<String>,
    asteroid_location: Option<(Pixel, Pixel)>,
    asteroid_radius: Option<Pixel>,
    asteroid_history: Option<Vec<String>>,
    asteroid_magnitude: Option<f64>,
    asteroid_magnitude_error: Option<f64>,

    astrometrics: Option<AstrometricSolution>,
    photometrics: Option<PhotometricSolution>,
    orbitals: Option<OrbitalSolution>,
    ephemeritics: Option<EphemeriticSolution>,
    propagatives: Option<PropagativeSolution>,
    records: BTreeMap<EngineDomain, SolveRecord>,
}

fn store<'a, S>(
    slot: &'a mut Option<S>,
    records: &mut BTreeMap<EngineDomain, SolveRecord>,
    domain: EngineDomain,
    engine: &EngineArgument,
    result: Result<S, ExarataError>,
) -> Result<&'a S, ExarataError> {
    let engine = match engine {
        EngineArgument::Class(class) => Some(*class),
        EngineArgument::Instance(_) => None,
    };
    match result {
        Ok(solution) => {
            records.insert(domain, SolveRecord { status: SolveStatus::Solved, engine });
            info!(%domain, "solve succeeded");
            Ok(slot.insert(solution))
        }
        Err(err) => {
            *slot = None;
            records.insert(domain, SolveRecord { status: SolveStatus::Failed, engine });
            warn!(%domain, error = %err, "solve failed");
            Err(err)
        }
    }
}

impl OpihiSolution {
    /// Read the header of an Opihi image and set up its solutions.
    ///
    /// Arguments
    /// -----------------
    /// * `fits_path`: the image.
    /// * `config`: copied into the solution.
    /// * `overrides`: header replacements and the target asteroid.
    ///
    /// Return
    /// ----------
    /// * The solution with nothing solved yet, or an [`ExarataError::Input`]
    ///   when the observing time is unknown, the filter unreadable or the
    ///   history not made of MPC records.
    pub fn new(
        fits_path: &Utf8Path,
        config: &ExarataConfig,
        overrides: OpihiOverrides,
    ) -> Result<Self, ExarataError> {
        let header = fits::read_fits_header(fits_path)?;

        let filter_name = match overrides.filter_name {
            Some(name) => Some(name),
            None => header
                .get_string("FWHL")
                .map(|fwhl| filter_header_string_to_filter_name(&fwhl))
                .transpose()?,
        };
        let exposure_time = overrides.exposure_time.or_else(|| header.get_f64("ITIME"));
        let observing_time = match overrides.observing_time {
            Some(time) => time,
            None => modified_julian_day_to_julian_day(header.require_f64("MJD_OBS")?),
        };
        if filter_name.is_none() || exposure_time.is_none() {
            warn!(%fits_path, ?filter_name, ?exposure_time, "image without filter or exposure, no zero point");
        }

        let asteroid_history = overrides
            .asteroid_history
            .map(|history| mpcrecord::clean_minor_planet_record(&history));
        if let Some(history) = &asteroid_history {
            mpcrecord::minor_planet_record_to_table(history)?;
        }
        debug!(%fits_path, ?filter_name, ?exposure_time, observing_time, "opihi image loaded");

        Ok(OpihiSolution {
            fits_path: fits_path.to_path_buf(),
            config: config.clone(),
            filter_name,
            exposure_time,
            observing_time,
            asteroid_name: overrides.asteroid_name,
            asteroid_location: overrides.asteroid_location,
            asteroid_radius: overrides.asteroid_radius,
            asteroid_history,
            asteroid_magnitude: None,
            asteroid_magnitude_error: None,
            astrometrics: None,
            photometrics: None,
            orbitals: None,
            ephemeritics: None,
            propagatives: None,
            records: BTreeMap::new(),
        })
    }

    /// Run the solve of the engine's domain, at the stored asteroid location.
    pub fn solve(
        &mut self,
        engine: &EngineArgument,
        vehicle_args: &VehicleArgs,
        http: &ExarataHttp,
    ) -> Result<(), ExarataError> {
        let domain = match engine {
            EngineArgument::Class(class) => class.domain(),
            EngineArgument::Instance(instance) => instance.domain(),
        };
        match domain {
            EngineDomain::Astrometry => self.solve_astrometry(engine, vehicle_args, http).map(|_| ()),
            EngineDomain::Photometry => self.solve_photometry(engine, vehicle_args, http).map(|_| ()),
            EngineDomain::Orbit => self.solve_orbit(engine, vehicle_args, None).map(|_| ()),
            EngineDomain::Ephemeris => self.solve_ephemeris(engine, vehicle_args, http).map(|_| ()),
            EngineDomain::Propagation => self.solve_propagate(engine, None).map(|_| ()),
        }
    }

    pub fn solve_astrometry(
        &mut self,
        engine: &EngineArgument,
        vehicle_args: &VehicleArgs,
        http: &ExarataHttp,
    ) -> Result<&AstrometricSolution, ExarataError> {
        let result = AstrometricSolution::new(&self.fits_path, engine, vehicle_args, &self.config, http);
        store(&mut self.astrometrics, &mut self.records, EngineDomain::Astrometry, engine, result)
    }

    pub fn solve_photometry(
        &mut self,
        engine: &EngineArgument,
        vehicle_args: &VehicleArgs,
        http: &ExarataHttp,
    ) -> Result<&PhotometricSolution, ExarataError> {
        let astrometrics = self.require_astrometrics("photometric")?;
        let result = PhotometricSolution::new(
            &self.fits_path,
            astrometrics,
            engine,
            vehicle_args,
            self.exposure_time,
            self.filter_name.as_deref(),
            &self.config,
            http,
        );
        store(&mut self.photometrics, &mut self.records, EngineDomain::Photometry, engine, result)
    }

    /// Solve the orbit from the history and the current observation.
    ///
    /// A custom orbit needs neither name nor history; other engines need both.
    ///
    /// Arguments
    /// -----------------
    /// * `engine`: an orbit engine class.
    /// * `vehicle_args`: extra engine inputs, the elements of a custom orbit.
    /// * `asteroid_location`: pixel of the asteroid, the stored one if `None`.
    pub fn solve_orbit(
        &mut self,
        engine: &EngineArgument,
        vehicle_args: &VehicleArgs,
        asteroid_location: Option<(Pixel, Pixel)>,
    ) -> Result<&OrbitalSolution, ExarataError> {
        self.require_astrometrics("orbital")?;
        let is_custom = matches!(engine, EngineArgument::Class(AnyEngine::Orbit(OrbitEngine::CustomOrbit)));
        let (name, history) = if is_custom {
            ("custom".to_string(), Vec::new())
        } else {
            let name = self.asteroid_name.clone().ok_or_else(|| {
                ExarataError::Input("The orbit cannot be solved, no asteroid name was provided".into())
            })?;
            let history = self.asteroid_history.clone().ok_or_else(|| {
                ExarataError::Input("The orbit cannot be solved, no asteroid history was provided".into())
            })?;
            (name, history)
        };

        let mut current = self.mpc_table_row_at(asteroid_location)?;
        current.provisional_number = name;
        let mut records = history;
        records.push(MpcRecord::from_observation(&current).to_80col());
        let records = mpcrecord::clean_minor_planet_record(&records);
        debug!(records = records.len(), "orbit observation records");

        let result = OrbitalSolution::new(&records, engine, vehicle_args, &self.config);
        store(&mut self.orbitals, &mut self.records, EngineDomain::Orbit, engine, result)
    }

    pub fn solve_ephemeris(
        &mut self,
        engine: &EngineArgument,
        vehicle_args: &VehicleArgs,
        http: &ExarataHttp,
    ) -> Result<&EphemeriticSolution, ExarataError> {
        let Some(orbitals) = &self.orbitals else {
            return Err(ExarataError::SequentialOrder(
                "The ephemeris solution requires an orbital solution, solve the orbit first".into(),
            ));
        };
        let result = EphemeriticSolution::new(orbitals, engine, vehicle_args, &self.config, http);
        store(&mut self.ephemeritics, &mut self.records, EngineDomain::Ephemeris, engine, result)
    }

    /// Propagate from the recent history and the current observation.
    ///
    /// History older than `OPIHISOLUTION_PROPAGATION_OBSERVATION_EXPIRATION_HOURS`
    /// before the observing time is left out. The current observation is at
    /// `asteroid_location`, the stored location if `None`.
    pub fn solve_propagate(
        &mut self,
        engine: &EngineArgument,
        asteroid_location: Option<(Pixel, Pixel)>,
    ) -> Result<&PropagativeSolution, ExarataError> {
        let astrometrics = self.require_astrometrics("propagation")?;
        let (x, y) = asteroid_location.or(self.asteroid_location).ok_or_else(|| {
            ExarataError::Input("The propagation cannot be solved, no asteroid location was provided".into())
        })?;
        let (current_ra, current_dec) = astrometrics.pixel_to_sky_coordinates(x, y);

        let expire_days = self.config.opihisolution_propagation_observation_expiration_hours / 24.0;
        let recent: Vec<MpcObservation> = self
            .asteroid_observations()?
            .into_iter()
            .filter(|observation| self.observing_time - observation.julian_day <= expire_days)
            .collect();
        let mut ra: Vec<f64> = recent.iter().map(|o| o.ra).collect();
        let mut dec: Vec<f64> = recent.iter().map(|o| o.dec).collect();
        let mut times: Vec<f64> = recent.iter().map(|o| o.julian_day).collect();
        ra.push(current_ra);
        dec.push(current_dec);
        times.push(self.observing_time);
        debug!(observations = times.len(), expire_days, "propagation observations");

        let result = PropagativeSolution::new(&ra, &dec, &times, engine);
        store(&mut self.propagatives, &mut self.records, EngineDomain::Propagation, engine, result)
    }

    fn require_astrometrics(&self, dependent: &str) -> Result<&AstrometricSolution, ExarataError> {
        self.astrometrics.as_ref().ok_or_else(|| {
            ExarataError::SequentialOrder(format!(
                "The {dependent} solution requires an astrometric solution, solve the astrometry first"
            ))
        })
    }

    /// Magnitude of the asteroid from the photometric zero point.
    ///
    /// The aperture is the asteroid radius, or the configured star radius.
    /// The error is the zero point error.
    pub fn compute_asteroid_magnitude(
        &mut self,
        location: Option<(Pixel, Pixel)>,
    ) -> Result<(f64, f64), ExarataError> {
        let (x, y) = location.or(self.asteroid_location).ok_or_else(|| {
            ExarataError::Input("No asteroid location was provided, no magnitude can be computed".into())
        })?;
        let Some(photometrics) = &self.photometrics else {
            return Err(ExarataError::SequentialOrder(
                "The asteroid magnitude requires a photometric solution, solve the photometry first".into(),
            ));
        };
        let (Some(zero_point), Some(zero_point_error), Some(exposure_time)) = (
            photometrics.zero_point(),
            photometrics.zero_point_error(),
            photometrics.exposure_time(),
        ) else {
            return Err(ExarataError::Practicality(
                "The photometric solution has no zero point, no magnitude can be computed".into(),
            ));
        };

        let radius = self
            .asteroid_radius
            .unwrap_or(self.config.photometry_star_radius_arcsecond / photometrics.pixel_scale());
        let counts = photometrics.calculate_star_counts(x, y, radius);
        if counts <= 0.0 {
            return Err(ExarataError::Practicality(format!(
                "The aperture at ({x}, {y}) holds {counts} counts above the sky, no magnitude can be computed"
            )));
        }
        let magnitude = zero_point - 2.5 * (counts / exposure_time).log10();
        self.asteroid_magnitude = Some(magnitude);
        self.asteroid_magnitude_error = Some(zero_point_error);
        info!(magnitude, error = zero_point_error, "asteroid magnitude");
        Ok((magnitude, zero_point_error))
    }

    /// The current observation of the asteroid, from the solved solutions.
    ///
    /// Return
    /// ----------
    /// * [`ExarataError::Practicality`] without an astrometric solution,
    ///   [`ExarataError::Input`] without an asteroid location.
    pub fn mpc_table_row(&self) -> Result<MpcObservation, ExarataError> {
        self.mpc_table_row_at(None)
    }

    /// [`OpihiSolution::mpc_table_row`] for the asteroid at another pixel,
    /// the stored location if `None`.
    pub fn mpc_table_row_at(&self, asteroid_location: Option<(Pixel, Pixel)>) -> Result<MpcObservation, ExarataError> {
        let Some(astrometrics) = &self.astrometrics else {
            return Err(ExarataError::Practicality(
                "An observation cannot be recorded without an astrometric solution".into(),
            ));
        };
        let (x, y) = asteroid_location.or(self.asteroid_location).ok_or_else(|| {
            ExarataError::Input("An observation cannot be recorded without the asteroid location".into())
        })?;
        let (ra, dec) = astrometrics.pixel_to_sky_coordinates(x, y);

        let mut observation = MpcObservation::at(self.observing_time, ra, dec, &self.config.mpc_observatory_code);
        observation.provisional_number = self.asteroid_name.clone().unwrap_or_default();
        if let Some(photometrics) = &self.photometrics {
            observation.magnitude = self.asteroid_magnitude;
            observation.bandpass = photometrics.filter_name().unwrap_or_default().to_string();
        }
        Ok(observation)
    }

    /// The current observation as an 80-column record.
    pub fn mpc_record_row(&self) -> Result<String, ExarataError> {
        let row = MpcRecord::from_observation(&self.mpc_table_row()?).to_80col();
        if row.chars().count() != MPC_RECORD_LENGTH {
            TerminalError::Development(format!("The MPC record row is not 80 characters: `{row}`")).halt();
        }
        Ok(row)
    }

    /// History followed by the current observation, which is left out when
    /// it cannot be recorded yet.
    pub fn mpc_record_full(&self) -> Result<Vec<String>, ExarataError> {
        let mut record = self.asteroid_history.clone().unwrap_or_default();
        match self.mpc_record_row() {
            Ok(row) => record.push(row),
            Err(ExarataError::Practicality(reason)) => debug!(reason, "current observation left out"),
            Err(err) => return Err(err),
        }
        Ok(record)
    }

    /// Save the image with the results of every solution in its header.
    ///
    /// The image and its original cards are kept. The results are appended
    /// between `OX_BEGIN` and `OX___END`, with the WCS cards grouped between
    /// `OXWBEGIN` and `OXW__END`.
    ///
    /// Return
    /// ----------
    /// * [`ExarataError::File`] if `path` exists and `overwrite` is false.
    ///
    /// See also
    /// ------------
    /// * [`OpihiSolution::opihiexarata_header_cards`] for the cards written.
    pub fn save_to_fits_file(&self, path: &Utf8Path, overwrite: bool) -> Result<(), ExarataError> {
        let cards = self.opihiexarata_header_cards();
        fits::update_fits_header_file(&self.fits_path, path, &cards, overwrite)?;
        info!(%path, cards = cards.len(), "solved image saved");
        Ok(())
    }

    /// Header cards describing the solutions, in writing order.
    ///
    /// A domain always gets its `OX?_SLVD` flag; its results and engine only
    /// when it is solved. Non-finite values are left out.
    ///
    /// | prefix | content |
    /// |---|---|
    /// | `OXT` | target name, pixel, RA/DEC, magnitude |
    /// | `OXM` | original file name |
    /// | `OXA` | astrometry: center, orientation, radius, pixel scale |
    /// | `OXP` | photometry: sky counts, aperture, zero point, filter |
    /// | `OXO` | orbit: elements and errors, anomalies, epoch |
    /// | `OXE` / `OXR` | ephemeris / propagation rates, arcsec/s and arcsec/s² |
    /// | `OXW` | markers around the WCS cards |
    pub fn opihiexarata_header_cards(&self) -> FitsHeader {
        let mut cards = FitsHeader::new();
        let number = |cards: &mut FitsHeader, key: &str, value: f64| {
            if value.is_finite() {
                cards.insert(key, HeaderValue::Number(value));
            }
        };
        let engine_name = |domain: EngineDomain| {
            self.solve_record(domain).and_then(|record| record.engine).map(|engine| engine.name())
        };
        let solved = |cards: &mut FitsHeader, prefix: &str, domain: EngineDomain, is_solved: bool| {
            cards.insert(&format!("{prefix}_SLVD"), HeaderValue::Flag(is_solved));
            if let Some(name) = engine_name(domain).filter(|_| is_solved) {
                cards.insert(&format!("{prefix}__ENG"), HeaderValue::Text(name));
            }
        };

        cards.insert("OX_BEGIN", HeaderValue::Flag(true));

        if let Some(name) = &self.asteroid_name {
            cards.insert("OXT_NAME", HeaderValue::Text(name.clone()));
        }
        if let Some((x, y)) = self.asteroid_location {
            number(&mut cards, "OXT_PX_X", x);
            number(&mut cards, "OXT_PX_Y", y);
            if let Some(astrometrics) = &self.astrometrics {
                let (ra, dec) = astrometrics.pixel_to_sky_coordinates(x, y);
                let (ra, dec) = degrees_to_sexagesimal_ra_dec(ra, dec, HEADER_SEXAGESIMAL_PRECISION);
                cards.insert("OXT___RA", HeaderValue::Text(ra));
                cards.insert("OXT__DEC", HeaderValue::Text(dec));
            }
            if let (Some(magnitude), Some(error)) = (self.asteroid_magnitude, self.asteroid_magnitude_error) {
                if magnitude.is_finite() && error.is_finite() {
                    cards.insert("OXT__MAG", HeaderValue::Number(magnitude));
                    cards.insert("OXT_MAGE", HeaderValue::Number(error));
                }
            }
        }

        cards.insert(
            "OXM_ORFN",
            HeaderValue::Text(pathname::get_filename_with_extension(self.fits_path.as_str())),
        );

        solved(&mut cards, "OXA", EngineDomain::Astrometry, self.astrometrics.is_some());
        if let Some(astrometrics) = &self.astrometrics {
            let (ra, dec) =
                degrees_to_sexagesimal_ra_dec(astrometrics.ra(), astrometrics.dec(), HEADER_SEXAGESIMAL_PRECISION);
            cards.insert("OXA___RA", HeaderValue::Text(ra));
            cards.insert("OXA__DEC", HeaderValue::Text(dec));
            number(&mut cards, "OXA_ANGL", astrometrics.orientation());
            number(&mut cards, "OXA_RADI", astrometrics.radius());
            number(&mut cards, "OXA_PXSC", astrometrics.pixel_scale());
        }

        solved(&mut cards, "OXP", EngineDomain::Photometry, self.photometrics.is_some());
        if let Some(photometrics) = &self.photometrics {
            number(&mut cards, "OXPSKYCT", photometrics.sky_counts());
            number(
                &mut cards,
                "OXP_APTR",
                self.config.photometry_star_radius_arcsecond / photometrics.pixel_scale(),
            );
            if let (Some(zero_point), Some(error)) = (photometrics.zero_point(), photometrics.zero_point_error()) {
                number(&mut cards, "OXP_ZP_M", zero_point);
                number(&mut cards, "OXP_ZP_E", error);
            }
        }
        if let Some(filter_name) = &self.filter_name {
            cards.insert("OXP_FILT", HeaderValue::Text(filter_name.clone()));
        }

        solved(&mut cards, "OXO", EngineDomain::Orbit, self.orbitals.is_some());
        if let Some(orbit) = &self.orbitals {
            for (key, value) in [
                ("OXO_SM_S", orbit.semimajor_axis()),
                ("OXO_EC_S", orbit.eccentricity()),
                ("OXO_IN_S", orbit.inclination()),
                ("OXO_AN_S", orbit.longitude_ascending_node()),
                ("OXO_PH_S", orbit.argument_perihelion()),
                ("OXO_MA_S", orbit.mean_anomaly()),
                ("OXO_EA_D", orbit.eccentric_anomaly()),
                ("OXO_TA_D", orbit.true_anomaly()),
                ("OXO_SM_E", orbit.semimajor_axis_error()),
                ("OXO_EC_E", orbit.eccentricity_error()),
                ("OXO_IN_E", orbit.inclination_error()),
                ("OXO_AN_E", orbit.longitude_ascending_node_error()),
                ("OXO_PH_E", orbit.argument_perihelion_error()),
                ("OXO_MA_E", orbit.mean_anomaly_error()),
                ("OXO_EA_E", orbit.eccentric_anomaly_error()),
                ("OXO_TA_E", orbit.true_anomaly_error()),
                ("OXO_EPCH", orbit.epoch_julian_day()),
            ] {
                number(&mut cards, key, value);
            }
        }

        solved(&mut cards, "OXE", EngineDomain::Ephemeris, self.ephemeritics.is_some());
        if let Some(ephemeris) = &self.ephemeritics {
            number(&mut cards, "OXE_RA_V", degrees_per_second_to_arcsec_per_second(ephemeris.ra_velocity()));
            number(&mut cards, "OXE_DECV", degrees_per_second_to_arcsec_per_second(ephemeris.dec_velocity()));
            number(&mut cards, "OXE_RA_A", degrees_per_second_to_arcsec_per_second(ephemeris.ra_acceleration()));
            number(&mut cards, "OXE_DECA", degrees_per_second_to_arcsec_per_second(ephemeris.dec_acceleration()));
        }

        solved(&mut cards, "OXR", EngineDomain::Propagation, self.propagatives.is_some());
        if let Some(propagation) = &self.propagatives {
            // propagation rates are per day
            let per_second = |rate: f64| degrees_per_second_to_arcsec_per_second(rate / SECONDS_PER_DAY);
            let per_second_squared =
                |rate: f64| degrees_per_second_to_arcsec_per_second(rate / SECONDS_PER_DAY.powi(2));
            number(&mut cards, "OXR_RA_V", per_second(propagation.ra_velocity()));
            number(&mut cards, "OXR_DECV", per_second(propagation.dec_velocity()));
            number(&mut cards, "OXR_RA_A", per_second_squared(propagation.ra_acceleration()));
            number(&mut cards, "OXR_DECA", per_second_squared(propagation.dec_acceleration()));
        }

        cards.insert("OXWBEGIN", HeaderValue::Text(String::new()));
        if let Some(astrometrics) = &self.astrometrics {
            cards.extend(&astrometrics.wcs().to_header());
        }
        cards.insert("OXW__END", HeaderValue::Text(String::new()));
        cards.insert("OX___END", HeaderValue::Flag(true));
        cards
    }

    /// The history records, interpreted.
    pub fn asteroid_observations(&self) -> Result<Vec<MpcObservation>, ExarataError> {
        let history = self.asteroid_history.as_deref().unwrap_or_default();
        mpcrecord::minor_planet_record_to_table(history)?
            .iter()
            .map(MpcRecord::observation)
            .collect()
    }

    pub fn fits_path(&self) -> &Utf8Path {
        &self.fits_path
    }

    pub fn filter_name(&self) -> Option<&str> {
        self.filter_name.as_deref()
    }

    pub fn exposure_time(&self) -> Option<f64> {
        self.exposure_time
    }

    pub fn observing_time(&self) -> JulianDay {
        self.observing_time
    }

    pub fn asteroid_name(&self) -> Option<&str> {
        self.asteroid_name.as_deref()
    }

    pub fn asteroid_location(&self) -> Option<(Pixel, Pixel)> {
        self.asteroid_location
    }

    pub fn asteroid_magnitude(&self) -> Option<f64> {
        self.asteroid_magnitude
    }

    pub fn asteroid_magnitude_error(&self) -> Option<f64> {
        self.asteroid_magnitude_error
    }

    pub fn astrometrics(&self) -> Option<&AstrometricSolution> {
        self.astrometrics.as_ref()
    }

    pub fn photometrics(&self) -> Option<&PhotometricSolution> {
        self.photometrics.as_ref()
    }

    pub fn orbitals(&self) -> Option<&OrbitalSolution> {
        self.orbitals.as_ref()
    }

    pub fn ephemeritics(&self) -> Option<&EphemeriticSolution> {
        self.ephemeritics.as_ref()
    }

    pub fn propagatives(&self) -> Option<&PropagativeSolution> {
        self.propagatives.as_ref()
    }

    /// Status and engine of the last solve of a domain, `None` if never tried.
    pub fn solve_record(&self, domain: EngineDomain) -> Option<SolveRecord> {
        self.records.get(&domain).copied()
    }
}
