//! # Astrometric solution
//!
//! [`AstrometricSolution`] holds the plate solution of one image: the sky
//! position of its center, its orientation and scale, the stars the solver
//! matched, and a [`TanWcs`] to convert between pixels and sky coordinates.
//!
//! ## Flow of the web engine
//!
//! ```text
//! login (retried) → upload → wait for job → download wcs + corr files
//!                                              → TanWcs + star table
//! ```
//!
//! Pixel positions are 0-based everywhere in this crate; the 1-based FITS
//! convention of the solver files is converted on reading.
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{info, warn};

use crate::{
    astrometry::{
        wcs::TanWcs,
        webclient::{AstrometryNetWebApi, JobStatus, ResultFileKind},
    },
    config::ExarataConfig,
    constants::{Degree, Pixel},
    engine::{resolve_engine, AstrometryEngine, EngineArgument, VehicleArgs, VehicleResults},
    exarata_errors::{EngineError, ExarataError},
    fits,
    http::{api_request_sleep, ExarataHttp},
    pathname,
    table::ColumnTable,
    temporary,
};

/// Columns of the astrometric star table.
pub const STAR_TABLE_COLUMNS: [&str; 4] = ["pixel_x", "pixel_y", "ra_astro", "dec_astro"];

const CORR_COLUMNS: [&str; 4] = ["field_x", "field_y", "field_ra", "field_dec"];

/// Plate solution of one image.
#[derive(Debug, Clone, PartialEq)]
pub struct AstrometricSolution {
    fits_path: Utf8PathBuf,
    ra: Degree,
    dec: Degree,
    orientation: Degree,
    radius: Degree,
    pixel_scale: f64,
    star_table: ColumnTable,
    wcs: TanWcs,
}

impl AstrometricSolution {
    /// Solve the astrometry of a FITS image.
    ///
    /// Arguments
    /// -----------------
    /// * `fits_path`: the image to solve.
    /// * `engine`: an astrometry engine class.
    /// * `vehicle_args`: extra arguments for the vehicle, none are read today.
    /// * `config`, `http`: the shared configuration and web state.
    pub fn new(
        fits_path: &Utf8Path,
        engine: &EngineArgument,
        vehicle_args: &VehicleArgs,
        config: &ExarataConfig,
        http: &ExarataHttp,
    ) -> Result<Self, ExarataError> {
        let engine = resolve_engine::<AstrometryEngine>(engine)?;
        if !vehicle_args.is_empty() {
            warn!(?vehicle_args, "astrometry vehicles take no extra arguments, ignored");
        }
        let results = match engine {
            AstrometryEngine::AstrometryNetWebApi => vehicle_astrometry_net_web_api(fits_path, config, http)?,
        };
        Ok(Self::from_vehicle_results(fits_path, results)?)
    }

    pub(crate) fn from_vehicle_results(
        fits_path: &Utf8Path,
        mut results: VehicleResults,
    ) -> Result<Self, EngineError> {
        Ok(AstrometricSolution {
            fits_path: fits_path.to_path_buf(),
            ra: results.take_number("ra")?,
            dec: results.take_number("dec")?,
            orientation: results.take_number("orientation")?,
            radius: results.take_number("radius")?,
            pixel_scale: results.take_number("pixel_scale")?,
            star_table: results.take_table("star_table")?,
            wcs: results.take_wcs("wcs")?,
        })
    }

    /// The image this solution belongs to.
    pub fn fits_path(&self) -> &Utf8Path {
        &self.fits_path
    }

    /// Right ascension of the image center, degrees.
    pub fn ra(&self) -> Degree {
        self.ra
    }

    /// Declination of the image center, degrees.
    pub fn dec(&self) -> Degree {
        self.dec
    }

    /// Position angle of the image, degrees east of north.
    pub fn orientation(&self) -> Degree {
        self.orientation
    }

    /// Radius of the field, degrees.
    pub fn radius(&self) -> Degree {
        self.radius
    }

    /// Arcseconds per pixel.
    pub fn pixel_scale(&self) -> f64 {
        self.pixel_scale
    }

    /// Stars matched by the solver, columns [`STAR_TABLE_COLUMNS`].
    pub fn star_table(&self) -> &ColumnTable {
        &self.star_table
    }

    /// The gnomonic world coordinate system of the image.
    ///
    /// See also
    /// ------------
    /// * [`TanWcs::to_header`] to write it back into a FITS header.
    pub fn wcs(&self) -> &TanWcs {
        &self.wcs
    }

    /// Sky coordinates of a 0-based pixel position.
    pub fn pixel_to_sky_coordinates(&self, x: Pixel, y: Pixel) -> (Degree, Degree) {
        self.wcs.pixel_to_sky(x, y)
    }

    /// 0-based pixel position of sky coordinates.
    pub fn sky_to_pixel_coordinates(&self, ra: Degree, dec: Degree) -> (Pixel, Pixel) {
        self.wcs.sky_to_pixel(ra, dec)
    }
}

fn login_with_retry(config: &ExarataConfig, http: &ExarataHttp) -> Result<AstrometryNetWebApi, ExarataError> {
    let max_attempts = config.api_connection_maximum_attempts.max(1);
    let mut attempt = 1;
    loop {
        match AstrometryNetWebApi::login(http, &config.secret_astrometrynet_web_api_key) {
            Ok(client) => return Ok(client),
            Err(
                err @ (ExarataError::WebRequest(_) | ExarataError::UreqHttpError(_) | ExarataError::ReqwestError(_)),
            ) => {
                if attempt >= max_attempts {
                    return Err(ExarataError::WebRequest(format!(
                        "Cannot connect to the astrometry.net web API service after {max_attempts} attempts: {err}"
                    )));
                }
                warn!(attempt, max_attempts, error = %err, "astrometry.net login failed, retrying");
                api_request_sleep(config);
                attempt += 1;
            }
            Err(other) => return Err(other),
        }
    }
}

fn wait_for_job(
    client: &mut AstrometryNetWebApi,
    config: &ExarataConfig,
) -> Result<(), ExarataError> {
    let start = Instant::now();
    loop {
        let status = match client.job_id()? {
            Some(_) => client.job_status()?,
            None => JobStatus::Other("queued".into()),
        };
        match status {
            JobStatus::Success => return Ok(()),
            JobStatus::Failure => {
                return Err(EngineError::Failed {
                    engine: "AstrometryNetWebApi".into(),
                    reason: "the astrometry.net solver failed to solve this field".into(),
                }
                .into())
            }
            JobStatus::Solving | JobStatus::Other(_) => {
                if start.elapsed().as_secs_f64() >= config.astrometry_webapi_job_queue_timeout {
                    return Err(ExarataError::WebRequest(
                        "The job request did not return any results. The job queue time likely \
                         exceeds the timeout time provided in the configuration."
                            .into(),
                    ));
                }
                api_request_sleep(config);
            }
        }
    }
}

/// Star table from the astrometry.net `corr` file, positions made 0-based.
fn read_star_table(corr_path: &Utf8Path) -> Result<ColumnTable, ExarataError> {
    let mut columns = fits::read_fits_table_file(corr_path, &CORR_COLUMNS)?.into_iter();
    let (Some(field_x), Some(field_y), Some(field_ra), Some(field_dec)) =
        (columns.next(), columns.next(), columns.next(), columns.next())
    else {
        return Err(ExarataError::File(format!(
            "The correspondence file `{corr_path}` lacks star columns"
        )));
    };
    ColumnTable::from_columns(vec![
        (STAR_TABLE_COLUMNS[0].into(), field_x.iter().map(|x| x - 1.0).collect()),
        (STAR_TABLE_COLUMNS[1].into(), field_y.iter().map(|y| y - 1.0).collect()),
        (STAR_TABLE_COLUMNS[2].into(), field_ra),
        (STAR_TABLE_COLUMNS[3].into(), field_dec),
    ])
}

fn vehicle_astrometry_net_web_api(
    fits_path: &Utf8Path,
    config: &ExarataConfig,
    http: &ExarataHttp,
) -> Result<VehicleResults, ExarataError> {
    if !fits_path.is_file() {
        return Err(ExarataError::File(format!("The FITS file `{fits_path}` does not exist")));
    }
    let mut client = login_with_retry(config, http)?;
    client.upload_file(fits_path)?;
    wait_for_job(&mut client, config)?;

    let calibration = client.job_results()?;
    info!(ra = calibration.ra, dec = calibration.dec, "astrometry.net solved the field");

    let stem = pathname::get_filename_without_extension(fits_path.as_str());
    let corr_path = temporary::make_temporary_directory_path(config, &format!("{stem}_corr.fits"))?;
    let wcs_path = temporary::make_temporary_directory_path(config, &format!("{stem}_wcs.fits"))?;
    client.download_result_file(ResultFileKind::Corr, &corr_path, true)?;
    client.download_result_file(ResultFileKind::Wcs, &wcs_path, true)?;

    let star_table = read_star_table(&corr_path)?;
    let wcs = TanWcs::from_header(&fits::read_fits_header(&wcs_path)?)?;

    Ok(VehicleResults::new("AstrometryNetWebApi")
        .with("ra", calibration.ra)
        .with("dec", calibration.dec)
        .with("orientation", calibration.orientation)
        .with("radius", calibration.radius)
        .with("pixel_scale", calibration.pixscale)
        .with("star_table", star_table)
        .with("wcs", wcs))
}
