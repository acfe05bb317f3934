//! # Photometric solution
//!
//! [`PhotometricSolution`] calibrates the counts of an image against a star
//! catalog, using the stars of an [`AstrometricSolution`] to find which
//! catalog stars are in the field.
//!
//! ## Steps
//!
//! 1. Query the catalog over the field of the astrometric solution.
//! 2. Keep the catalog stars within `PHOTOMETRY_MAXIMUM_INTERSECTION_SEPARATION`
//!    arcseconds of an astrometric star (the intersection table).
//! 3. Estimate the sky as the median of the pixels left by
//!    [`PhotometricSolution::sky_counts_mask`].
//! 4. Per intersection star, `zp = m + 2.5 log10(counts / exposure)`; the zero
//!    point is their mean, its error their standard deviation.
//!
//! ## Units
//!
//! - Apertures: pixels for [`PhotometricSolution::calculate_star_counts`],
//!   arcseconds for the coordinate variant.
//! - Magnitudes: AB, in the filter of the image.
use camino::{Utf8Path, Utf8PathBuf};
use nalgebra::DMatrix;
use tracing::{debug, warn};

use crate::{
    astrometry::{wcs::TanWcs, AstrometricSolution},
    config::ExarataConfig,
    constants::{ArcSec, Degree, Pixel, ARCSEC_PER_DEGREE},
    engine::{resolve_engine, EngineArgument, PhotometryEngine, VehicleArgs, VehicleResults},
    exarata_errors::{EngineError, ExarataError, InsufficiencyCause},
    fits, image,
    photometry::panstarrs::{ConeSearch, PanstarrsMastWebApi},
    http::ExarataHttp,
    table::ColumnTable,
};

/// Columns every photometric catalog table must carry.
pub const PHOTOMETRIC_COLUMNS: [&str; 10] = [
    "ra_photo", "dec_photo", "g_mag", "g_err", "r_mag", "r_err", "i_mag", "i_err", "z_mag", "z_err",
];

/// Columns of the intersection of the astrometric and photometric stars.
pub const INTERSECTION_COLUMNS: [&str; 16] = [
    "ra_astro", "dec_astro", "ra_photo", "dec_photo", "pixel_x", "pixel_y", "separation", "g_mag",
    "g_err", "r_mag", "r_err", "i_mag", "i_err", "z_mag", "z_err", "counts",
];

/// Filters a zero point can be computed in.
pub const ZERO_POINT_FILTERS: [&str; 4] = ["g", "r", "i", "z"];

/// PanSTARRS columns feeding [`PHOTOMETRIC_COLUMNS`], same order.
const PANSTARRS_SOURCE_COLUMNS: [&str; 10] = [
    "raMean", "decMean", "gMeanPSFMag", "gMeanPSFMagErr", "rMeanPSFMag", "rMeanPSFMagErr",
    "iMeanPSFMag", "iMeanPSFMagErr", "zMeanPSFMag", "zMeanPSFMagErr",
];

/// Photometric calibration of one image.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotometricSolution {
    fits_path: Utf8PathBuf,
    data: DMatrix<f64>,
    wcs: TanWcs,
    pixel_scale: f64,
    star_table: ColumnTable,
    intersection_star_table: ColumnTable,
    sky_counts_mask: DMatrix<bool>,
    sky_counts: f64,
    exposure_time: Option<f64>,
    filter_name: Option<String>,
    zero_point: Option<f64>,
    zero_point_error: Option<f64>,
}

impl PhotometricSolution {
    /// Calibrate the photometry of an image already solved for astrometry.
    ///
    /// Without an exposure time or a filter name, the zero point is skipped
    /// and left as `None`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        fits_path: &Utf8Path,
        astrometrics: &AstrometricSolution,
        engine: &EngineArgument,
        vehicle_args: &VehicleArgs,
        exposure_time: Option<f64>,
        filter_name: Option<&str>,
        config: &ExarataConfig,
        http: &ExarataHttp,
    ) -> Result<Self, ExarataError> {
        let engine = resolve_engine::<PhotometryEngine>(engine)?;
        if fits_path != astrometrics.fits_path() {
            return Err(ExarataError::Input(format!(
                "The astrometric solution solved `{}`, not the image `{fits_path}` of this photometric solution",
                astrometrics.fits_path()
            )));
        }
        if !vehicle_args.is_empty() {
            warn!(?vehicle_args, "photometry vehicles take no extra arguments, ignored");
        }
        let (_, data) = fits::read_fits_image_file(fits_path)?;

        let results = match engine {
            PhotometryEngine::PanstarrsMastWebApi => {
                vehicle_panstarrs_mast_web_api(astrometrics, config, http)?
            }
        };
        Self::from_vehicle_results(data, astrometrics, results, exposure_time, filter_name, config)
    }

    pub(crate) fn from_vehicle_results(
        data: DMatrix<f64>,
        astrometrics: &AstrometricSolution,
        mut results: VehicleResults,
        exposure_time: Option<f64>,
        filter_name: Option<&str>,
        config: &ExarataConfig,
    ) -> Result<Self, ExarataError> {
        let engine = results.engine().to_string();
        let star_table = results.take_table("star_table")?;
        for column in PHOTOMETRIC_COLUMNS {
            if star_table.column(column).is_none() {
                return Err(EngineError::Insufficient {
                    engine,
                    field: column,
                    cause: InsufficiencyCause::EngineCannotProvide,
                }
                .into());
            }
        }

        let star_radius_pixel = config.photometry_star_radius_arcsecond / astrometrics.pixel_scale();
        let star_pixels = star_pixel_positions(astrometrics, &star_table);
        let sky_counts_mask = calculate_sky_counts_mask(&data, &star_pixels, star_radius_pixel, config);
        let sky_counts = image::masked_median(&data, &sky_counts_mask).ok_or_else(|| {
            ExarataError::Practicality("Every pixel of the image is masked, there is no sky left".into())
        })?;
        debug!(sky_counts, "sky counts per pixel");

        let mut solution = PhotometricSolution {
            fits_path: astrometrics.fits_path().to_path_buf(),
            data,
            wcs: astrometrics.wcs().clone(),
            pixel_scale: astrometrics.pixel_scale(),
            star_table,
            intersection_star_table: ColumnTable::new(&INTERSECTION_COLUMNS),
            sky_counts_mask,
            sky_counts,
            exposure_time: None,
            filter_name: None,
            zero_point: None,
            zero_point_error: None,
        };
        solution.intersection_star_table = solution.calculate_intersection_star_table(astrometrics, config)?;

        if let (Some(exposure_time), Some(filter_name)) = (exposure_time, filter_name) {
            let zero_point = solution.calculate_zero_point(exposure_time, filter_name)?;
            solution.exposure_time = Some(exposure_time);
            solution.filter_name = Some(filter_name.to_string());
            if let Some((zero_point, zero_point_error)) = zero_point {
                solution.zero_point = Some(zero_point);
                solution.zero_point_error = Some(zero_point_error);
            } else {
                warn!(filter_name, "no usable star to compute a zero point");
            }
        }
        Ok(solution)
    }

    fn calculate_intersection_star_table(
        &self,
        astrometrics: &AstrometricSolution,
        config: &ExarataConfig,
    ) -> Result<ColumnTable, ExarataError> {
        let astro = astrometrics.star_table();
        let ra_photo = self.star_table.require_column("ra_photo")?;
        let dec_photo = self.star_table.require_column("dec_photo")?;
        let max_separation = config.photometry_maximum_intersection_separation / ARCSEC_PER_DEGREE;
        let star_radius_pixel = config.photometry_star_radius_arcsecond / self.pixel_scale;

        let mut intersection = ColumnTable::new(&INTERSECTION_COLUMNS);
        for row in 0..astro.len() {
            let (Some(ra_astro), Some(dec_astro), Some(pixel_x), Some(pixel_y)) = (
                astro.value("ra_astro", row),
                astro.value("dec_astro", row),
                astro.value("pixel_x", row),
                astro.value("pixel_y", row),
            ) else {
                continue;
            };
            let nearest = ra_photo
                .iter()
                .zip(dec_photo)
                .enumerate()
                .map(|(index, (ra, dec))| {
                    let ra_diff = signed_angle_difference(ra_astro, *ra);
                    let dec_diff = signed_angle_difference(dec_astro, *dec);
                    (index, ra_diff.hypot(dec_diff))
                })
                .filter(|(_, separation)| separation.is_finite())
                .min_by(|a, b| a.1.total_cmp(&b.1));
            let Some((index, separation)) = nearest else {
                continue;
            };
            if separation > max_separation {
                continue;
            }
            let (x, y) = self.wcs.sky_to_pixel(ra_astro, dec_astro);
            let counts = self.calculate_star_counts(x, y, star_radius_pixel);
            let photo = |name: &str| self.star_table.value(name, index).unwrap_or(f64::NAN);
            intersection.push_row(&[
                ra_astro,
                dec_astro,
                photo("ra_photo"),
                photo("dec_photo"),
                pixel_x,
                pixel_y,
                separation,
                photo("g_mag"),
                photo("g_err"),
                photo("r_mag"),
                photo("r_err"),
                photo("i_mag"),
                photo("i_err"),
                photo("z_mag"),
                photo("z_err"),
                counts,
            ])?;
        }
        debug!(stars = intersection.len(), "intersection star table");
        Ok(intersection)
    }

    /// Sky subtracted counts in a circular aperture around a pixel position.
    ///
    /// Does not check that a star is actually there.
    pub fn calculate_star_counts(&self, x: Pixel, y: Pixel, radius: Pixel) -> f64 {
        let mask = image::create_circular_mask(self.data.nrows(), self.data.ncols(), x, y, radius);
        self.data
            .iter()
            .zip(mask.iter())
            .filter(|(value, inside)| **inside && value.is_finite())
            .map(|(value, _)| value - self.sky_counts)
            .sum()
    }

    /// Sky subtracted counts around a sky position, aperture radius in arcseconds.
    pub fn calculate_star_counts_coordinate(&self, ra: Degree, dec: Degree, radius: ArcSec) -> f64 {
        let (x, y) = self.wcs.sky_to_pixel(ra, dec);
        self.calculate_star_counts(x, y, radius / self.pixel_scale)
    }

    /// Mean and standard deviation of the per star zero points, `None` if no
    /// star has both a magnitude and positive counts.
    fn calculate_zero_point(
        &self,
        exposure_time: f64,
        filter_name: &str,
    ) -> Result<Option<(f64, f64)>, ExarataError> {
        if !ZERO_POINT_FILTERS.contains(&filter_name) {
            return Err(ExarataError::Input(format!(
                "The filter `{filter_name}` is not supported for photometric calibration, \
                 accepted filters: {ZERO_POINT_FILTERS:?}"
            )));
        }
        let magnitudes = self.intersection_star_table.require_column(&format!("{filter_name}_mag"))?;
        let counts = self.intersection_star_table.require_column("counts")?;
        let zero_points: Vec<f64> = magnitudes
            .iter()
            .zip(counts)
            .filter(|(magnitude, counts)| magnitude.is_finite() && **counts > 0.0)
            .map(|(magnitude, counts)| magnitude - (-2.5 * (counts / exposure_time).log10()))
            .collect();
        if zero_points.is_empty() {
            return Ok(None);
        }
        let n = zero_points.len() as f64;
        let mean = zero_points.iter().sum::<f64>() / n;
        let variance = zero_points.iter().map(|z| (z - mean).powi(2)).sum::<f64>() / n;
        Ok(Some((mean, variance.sqrt())))
    }

    /// Arcseconds per pixel, from the astrometric solution.
    pub fn pixel_scale(&self) -> f64 {
        self.pixel_scale
    }

    pub fn fits_path(&self) -> &Utf8Path {
        &self.fits_path
    }

    /// The catalog stars, columns [`PHOTOMETRIC_COLUMNS`].
    pub fn star_table(&self) -> &ColumnTable {
        &self.star_table
    }

    /// Catalog stars matched to the astrometric stars, columns [`INTERSECTION_COLUMNS`].
    pub fn intersection_star_table(&self) -> &ColumnTable {
        &self.intersection_star_table
    }

    /// `true` where a pixel is excluded from the sky estimate.
    pub fn sky_counts_mask(&self) -> &DMatrix<bool> {
        &self.sky_counts_mask
    }

    /// Median sky counts per pixel.
    pub fn sky_counts(&self) -> f64 {
        self.sky_counts
    }

    /// Exposure time in seconds.
    pub fn exposure_time(&self) -> Option<f64> {
        self.exposure_time
    }

    pub fn filter_name(&self) -> Option<&str> {
        self.filter_name.as_deref()
    }

    /// Magnitude zero point, `None` without exposure time, filter or usable stars.
    ///
    /// See also
    /// ------------
    /// * [`crate::opihi::OpihiSolution::compute_asteroid_magnitude`]
    pub fn zero_point(&self) -> Option<f64> {
        self.zero_point
    }

    pub fn zero_point_error(&self) -> Option<f64> {
        self.zero_point_error
    }
}

/// Signed difference of two angles, wrapped into (-180, 180].
fn signed_angle_difference(a: Degree, b: Degree) -> Degree {
    180.0 - (180.0 - a + b).rem_euclid(360.0)
}

/// Pixel positions of every catalog star and every astrometric star.
fn star_pixel_positions(astrometrics: &AstrometricSolution, catalog: &ColumnTable) -> Vec<(Pixel, Pixel)> {
    let mut positions = Vec::new();
    if let (Some(ra), Some(dec)) = (catalog.column("ra_photo"), catalog.column("dec_photo")) {
        positions.extend(ra.iter().zip(dec).map(|(ra, dec)| astrometrics.sky_to_pixel_coordinates(*ra, *dec)));
    }
    let astro = astrometrics.star_table();
    if let (Some(x), Some(y)) = (astro.column("pixel_x"), astro.column("pixel_y")) {
        positions.extend(x.iter().copied().zip(y.iter().copied()));
    }
    positions.retain(|(x, y)| x.is_finite() && y.is_finite());
    positions
}

/// Pixels excluded from the sky estimate: boxes around stars, the central
/// science box, the image edges and every non-finite pixel are `true`.
fn calculate_sky_counts_mask(
    data: &DMatrix<f64>,
    star_pixels: &[(Pixel, Pixel)],
    star_radius_pixel: Pixel,
    config: &ExarataConfig,
) -> DMatrix<bool> {
    let (n_rows, n_cols) = data.shape();
    let mut mask = data.map(|value| !value.is_finite());

    let mut mask_box = |row_center: i64, col_center: i64, half: i64| {
        let row_range = clamp_range(row_center - half, row_center + half, n_rows);
        let col_range = clamp_range(col_center - half, col_center + half, n_cols);
        for row in row_range {
            for col in col_range.clone() {
                mask[(row, col)] = true;
            }
        }
    };

    let half_box = (2.0 * star_radius_pixel) as i64 + 2;
    for (x, y) in star_pixels {
        mask_box(*y as i64, *x as i64, half_box);
    }
    let science_half = (2.0 * config.photometry_science_radius_mask_pixels + 1.0) as i64;
    mask_box((n_rows / 2) as i64, (n_cols / 2) as i64, science_half);

    let edge = config.photometry_edge_width_mask_pixels;
    for row in 0..n_rows {
        for col in 0..n_cols {
            let on_edge = row < edge || col < edge || row + edge >= n_rows || col + edge >= n_cols;
            if on_edge {
                mask[(row, col)] = true;
            }
        }
    }
    mask
}

fn clamp_range(start: i64, end: i64, length: usize) -> std::ops::Range<usize> {
    let start = start.clamp(0, length as i64) as usize;
    let end = end.clamp(0, length as i64) as usize;
    start..end.max(start)
}

fn vehicle_panstarrs_mast_web_api(
    astrometrics: &AstrometricSolution,
    config: &ExarataConfig,
    http: &ExarataHttp,
) -> Result<VehicleResults, ExarataError> {
    let client = PanstarrsMastWebApi::new(http);
    let mut table = client.cone_search(&ConeSearch {
        ra: astrometrics.ra(),
        dec: astrometrics.dec(),
        radius: astrometrics.radius(),
        detections: config.photometry_minimum_filter_observations,
        color_detections: config.photometry_minimum_filter_observations,
        columns: &PANSTARRS_SOURCE_COLUMNS,
        max_rows: config.panstarrs_mast_api_maximum_data_rows,
        data_release: config.panstarrs_mast_api_data_release_version,
    })?;
    let mut results = VehicleResults::new("PanstarrsMastWebApi");
    for (source, target) in PANSTARRS_SOURCE_COLUMNS.iter().zip(PHOTOMETRIC_COLUMNS) {
        if !table.rename_column(&source.to_lowercase(), target) {
            results.mark_unavailable(target);
        }
    }
    results.insert("star_table", table);
    Ok(results)
}

#[cfg(test)]
pub(crate) mod photometry_solution_test {
    use super::*;
    use crate::astrometry::solution::astrometry_solution_test::test_solution;
    use approx::assert_relative_eq;

    const SKY: f64 = 100.0;

    fn test_config() -> ExarataConfig {
        ExarataConfig {
            photometry_science_radius_mask_pixels: 10.0,
            ..ExarataConfig::default()
        }
    }

    /// Flat sky with a five pixel cross of 3000 counts on each astrometric star.
    fn test_image(astrometrics: &AstrometricSolution) -> DMatrix<f64> {
        let mut data = DMatrix::from_element(200, 200, SKY);
        let table = astrometrics.star_table();
        for row in 0..table.len() {
            let x = table.value("pixel_x", row).unwrap() as usize;
            let y = table.value("pixel_y", row).unwrap() as usize;
            data[(y, x)] += 1000.0;
            for (dy, dx) in [(0, 1), (2, 1), (1, 0), (1, 2)] {
                data[(y + dy - 1, x + dx - 1)] += 500.0;
            }
        }
        data[(0, 0)] = f64::NAN;
        data
    }

    fn test_catalog(astrometrics: &AstrometricSolution, r_mags: &[f64]) -> ColumnTable {
        let mut catalog = ColumnTable::new(&PHOTOMETRIC_COLUMNS);
        let astro = astrometrics.star_table();
        for (row, r_mag) in r_mags.iter().enumerate() {
            let ra = astro.value("ra_astro", row).unwrap() + 0.1 / ARCSEC_PER_DEGREE;
            let dec = astro.value("dec_astro", row).unwrap();
            let nan = f64::NAN;
            catalog
                .push_row(&[ra, dec, nan, nan, *r_mag, 0.01, nan, nan, nan, nan])
                .unwrap();
        }
        catalog
    }

    /// A calibrated r band solution with a 10 s exposure and stars of magnitude 15 and 16.
    pub(crate) fn test_photometric_solution(astrometrics: &AstrometricSolution) -> PhotometricSolution {
        let results = VehicleResults::new("test").with("star_table", test_catalog(astrometrics, &[15.0, 16.0]));
        PhotometricSolution::from_vehicle_results(
            test_image(astrometrics),
            astrometrics,
            results,
            Some(10.0),
            Some("r"),
            &test_config(),
        )
        .unwrap()
    }

    #[test]
    fn test_zero_point_from_two_stars() {
        let astrometrics = test_solution("image.fits");
        let results = VehicleResults::new("test").with("star_table", test_catalog(&astrometrics, &[15.0, 16.0]));
        let solution = PhotometricSolution::from_vehicle_results(
            test_image(&astrometrics),
            &astrometrics,
            results,
            Some(10.0),
            Some("r"),
            &test_config(),
        )
        .unwrap();

        assert_relative_eq!(solution.sky_counts(), SKY);
        assert_eq!(solution.intersection_star_table().len(), 2);
        let counts = solution.intersection_star_table().column("counts").unwrap();
        assert_relative_eq!(counts[0], 3000.0, epsilon = 1e-9);

        let instrumental = -2.5 * (3000.0_f64 / 10.0).log10();
        assert_relative_eq!(solution.zero_point().unwrap(), 15.5 - instrumental, epsilon = 1e-9);
        assert_relative_eq!(solution.zero_point_error().unwrap(), 0.5, epsilon = 1e-9);
        assert_eq!(solution.filter_name(), Some("r"));
    }

    #[test]
    fn test_sky_mask_regions() {
        let astrometrics = test_solution("image.fits");
        let results = VehicleResults::new("test").with("star_table", test_catalog(&astrometrics, &[15.0]));
        let solution = PhotometricSolution::from_vehicle_results(
            test_image(&astrometrics),
            &astrometrics,
            results,
            None,
            None,
            &test_config(),
        )
        .unwrap();
        let mask = solution.sky_counts_mask();
        // edge, central science box, star box, plain sky
        assert!(mask[(3, 100)]);
        assert!(mask[(100, 100)]);
        assert!(mask[(50, 40)]);
        assert!(!mask[(60, 150)]);
        assert!(mask[(0, 0)]);
        assert_eq!(solution.zero_point(), None);
        assert_eq!(solution.exposure_time(), None);
    }

    #[test]
    fn test_unsupported_filter_and_missing_columns() {
        let astrometrics = test_solution("image.fits");
        let results = VehicleResults::new("test").with("star_table", test_catalog(&astrometrics, &[15.0]));
        let result = PhotometricSolution::from_vehicle_results(
            test_image(&astrometrics),
            &astrometrics,
            results,
            Some(10.0),
            Some("y"),
            &test_config(),
        );
        assert!(matches!(result, Err(ExarataError::Input(_))));

        let mut incomplete = test_catalog(&astrometrics, &[15.0]);
        incomplete.rename_column("z_err", "zerr");
        let results = VehicleResults::new("test").with("star_table", incomplete);
        let result = PhotometricSolution::from_vehicle_results(
            test_image(&astrometrics),
            &astrometrics,
            results,
            None,
            None,
            &test_config(),
        );
        assert_eq!(
            result,
            Err(ExarataError::Engine(EngineError::Insufficient {
                engine: "test".into(),
                field: "z_err",
                cause: InsufficiencyCause::EngineCannotProvide,
            }))
        );
    }

    #[test]
    fn test_signed_angle_difference_wraps() {
        assert_relative_eq!(signed_angle_difference(359.9, 0.1), -0.2, epsilon = 1e-9);
        assert_relative_eq!(signed_angle_difference(0.1, 359.9), 0.2, epsilon = 1e-9);
        assert_relative_eq!(signed_angle_difference(10.0, 5.0), 5.0, epsilon = 1e-9);
    }
}
