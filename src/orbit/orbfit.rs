//! # OrbFit orbit determination
//!
//! Drives an installed OrbFit binary. The install must provide template
//! files under `ORBFIT_DIRECTORY/exarata/`:
//!
//! ```text
//! exarata.inp   target name
//! exarata.oop   run options
//! exarata.obs   observation file, rewritten before each run
//! ```
//!
//! plus the `orbfit.x` executable, both in `ORBFIT_DIRECTORY/bin` and in
//! `ORBFIT_BINARY_EXECUTABLE_DIRECTORY`. The templates are copied into the
//! operating directory `TEMPORARY_DIRECTORY/orbfit`, the binary is run there
//! with `exarata` on stdin, and the `exarata.oel` output is parsed.
//!
//! OrbFit often fails on long arcs. When the full record does not solve, the
//! record is split by observation year and the per-year orbits are combined.
use std::{
    fs,
    io::Write,
    process::{Command, Stdio},
};

use camino::{Utf8Path, Utf8PathBuf};
use itertools::Itertools;
use tracing::{debug, info, warn};

use crate::{
    config::ExarataConfig,
    constants::{ModifiedJulianDay, RADEG},
    engine::{EngineDomain, ExarataEngine},
    exarata_errors::{EngineError, ExarataError},
    image::percentile,
    mpcrecord::{minor_planet_record_to_table, minor_planet_table_to_record, MpcRecord},
    orbit::OrbitalElements,
    pathname::merge_pathname,
};

/// Output extensions removed before every run.
const ORBFIT_OUTPUT_EXTENSIONS: [&str; 8] = ["pro", "clo", "odc", "oel", "olg", "oep", "rwo", "err"];

const TEMPLATE_EXTENSIONS: [&str; 3] = ["inp", "obs", "oop"];

/// Elements fitted by OrbFit, at an epoch in MJD.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbfitSolve {
    pub elements: OrbitalElements,
    pub errors: OrbitalElements,
    pub epoch_mjd: ModifiedJulianDay,
}

#[derive(Debug, Clone)]
pub struct OrbfitOrbitEngine {
    template_directory: Utf8PathBuf,
    executable: Utf8PathBuf,
    operating_directory: Utf8PathBuf,
    linear_error_fraction: f64,
    angular_error_fraction: f64,
}

impl ExarataEngine for OrbfitOrbitEngine {
    fn domain(&self) -> EngineDomain {
        EngineDomain::Orbit
    }

    fn name(&self) -> String {
        "Orbfit".into()
    }
}

impl OrbfitOrbitEngine {
    /// Check the install and set up a clean operating directory.
    pub fn new(config: &ExarataConfig) -> Result<Self, ExarataError> {
        let executable = Self::check_installation(config)?;
        let engine = OrbfitOrbitEngine {
            template_directory: Utf8Path::new(&config.orbfit_directory).join("exarata"),
            executable,
            operating_directory: config.temporary_directory().join("orbfit"),
            linear_error_fraction: config.orbfit_maximum_linear_error,
            angular_error_fraction: config.orbfit_maximum_angular_error,
        };
        engine.prepare_files()?;
        engine.clean_files()?;
        Ok(engine)
    }

    /// Verify the templates and the executable exist.
    ///
    /// Return
    /// ----------
    /// * The executable to run, or [`ExarataError::Install`] describing the
    ///   first missing piece.
    pub fn check_installation(config: &ExarataConfig) -> Result<Utf8PathBuf, ExarataError> {
        let template_directory = [config.orbfit_directory.as_str(), "exarata"];
        for extension in TEMPLATE_EXTENSIONS {
            let template = merge_pathname(&template_directory, "exarata", extension);
            if !Utf8Path::new(&template).is_file() {
                return Err(ExarataError::Install(format!(
                    "The OrbFit template file `{template}` does not exist, set up the \
                     OpihiExarata template files in the OrbFit directory"
                )));
            }
        }

        let bundled = merge_pathname(&[config.orbfit_directory.as_str(), "bin"], "orbfit", "x");
        if !Utf8Path::new(&bundled).is_file() {
            return Err(ExarataError::Install(format!(
                "The compiled OrbFit executable `{bundled}` does not exist, reinstall OrbFit"
            )));
        }
        let executable = merge_pathname(&[config.orbfit_binary_executable_directory.as_str()], "orbfit", "x");
        if !Utf8Path::new(&executable).is_file() {
            return Err(ExarataError::Install(format!(
                "The OrbFit executable `{executable}` does not exist; check \
                 ORBFIT_BINARY_EXECUTABLE_DIRECTORY in the configuration"
            )));
        }
        Ok(Utf8PathBuf::from(executable))
    }

    pub fn is_installed(config: &ExarataConfig) -> bool {
        Self::check_installation(config).is_ok()
    }

    pub fn operating_directory(&self) -> &Utf8Path {
        &self.operating_directory
    }

    fn operating_file(&self, extension: &str) -> Utf8PathBuf {
        self.operating_directory.join(format!("exarata.{extension}"))
    }

    fn prepare_files(&self) -> Result<(), ExarataError> {
        fs::create_dir_all(&self.operating_directory)?;
        for entry in self.template_directory.read_dir_utf8()? {
            let entry = entry?;
            if entry.path().is_file() && entry.path().extension().is_some() {
                fs::copy(entry.path(), self.operating_directory.join(entry.file_name()))?;
            }
        }
        Ok(())
    }

    /// Remove previous outputs and empty the observation file.
    fn clean_files(&self) -> Result<(), ExarataError> {
        for entry in self.operating_directory.read_dir_utf8()? {
            let entry = entry?;
            let stale = entry
                .path()
                .extension()
                .is_some_and(|ext| ORBFIT_OUTPUT_EXTENSIONS.contains(&ext));
            if stale {
                fs::remove_file(entry.path())?;
            }
        }
        fs::write(self.operating_file("obs"), "")?;
        Ok(())
    }

    fn run_orbfit(&self) -> Result<(), ExarataError> {
        debug!(executable = %self.executable, directory = %self.operating_directory, "running OrbFit");
        let mut child = Command::new(&self.executable)
            .current_dir(&self.operating_directory)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(b"exarata\n")?;
        }
        let status = child.wait()?;
        debug!(%status, "OrbFit finished");
        Ok(())
    }

    /// One OrbFit run on a set of records.
    fn solve_single_orbit(&self, records: &[MpcRecord]) -> Result<OrbfitSolve, ExarataError> {
        let lines = minor_planet_table_to_record(records);
        fs::write(self.operating_file("obs"), lines.iter().map(|l| format!("{l}\n")).join(""))?;
        self.run_orbfit()?;

        let error_file = self.operating_file("err");
        let orbit_file = self.operating_file("oel");
        let outcome = if error_file.is_file() {
            Err(orbfit_failure("OrbFit could not determine a fitting orbit solution"))
        } else if orbit_file.is_file() {
            let content = fs::read_to_string(&orbit_file)?;
            parse_orbital_element_file(&content, self.linear_error_fraction, self.angular_error_fraction)
        } else {
            Err(orbfit_failure("OrbFit wrote neither an orbital element file nor an error file"))
        };
        self.clean_files()?;
        outcome
    }

    /// Fit an orbit to the records, falling back to per-year subsets.
    pub fn solve_orbit(&self, records: &[MpcRecord]) -> Result<OrbfitSolve, ExarataError> {
        if records.is_empty() {
            return Err(ExarataError::Input("An orbit cannot be fitted without observations".into()));
        }
        match self.solve_single_orbit(records) {
            Ok(solve) => return Ok(solve),
            Err(ExarataError::Engine(err)) => {
                warn!(error = %err, "OrbFit failed on the full record, solving per year");
            }
            Err(other) => return Err(other),
        }

        let by_year = records
            .iter()
            .map(|record| Ok((record.observation()?.year, record.clone())))
            .collect::<Result<Vec<_>, ExarataError>>()?
            .into_iter()
            .into_group_map();

        let mut subset_solves = Vec::new();
        for (year, subset) in by_year.into_iter().sorted_by_key(|(year, _)| *year) {
            match self.solve_single_orbit(&subset) {
                Ok(solve) => subset_solves.push(solve),
                Err(ExarataError::Engine(err)) => {
                    debug!(year, error = %err, "no orbit for this year");
                }
                Err(other) => return Err(other),
            }
        }
        info!(subsets = subset_solves.len(), "combining per-year OrbFit orbits");
        combine_subset_solves(&subset_solves)
    }

    /// [`solve_orbit`](Self::solve_orbit) from 80-column lines.
    pub fn solve_orbit_via_record<S: AsRef<str>>(&self, lines: &[S]) -> Result<OrbfitSolve, ExarataError> {
        self.solve_orbit(&minor_planet_record_to_table(lines)?)
    }
}

fn orbfit_failure(reason: &str) -> ExarataError {
    EngineError::Failed {
        engine: "Orbfit".into(),
        reason: reason.into(),
    }
    .into()
}

fn parse_numbers(tokens: &[&str], line: &str) -> Result<Vec<f64>, ExarataError> {
    tokens
        .iter()
        .map(|token| {
            token
                .replace(['D', 'd'], "E")
                .parse::<f64>()
                .map_err(|_| ExarataError::File(format!("Unreadable number `{token}` in the OrbFit line `{line}`")))
        })
        .collect()
}

fn six_values(values: &[f64], line: &str) -> Result<[f64; 6], ExarataError> {
    values
        .get(..6)
        .and_then(|v| <[f64; 6]>::try_from(v).ok())
        .ok_or_else(|| ExarataError::File(format!("The OrbFit line `{line}` lacks the six elements")))
}

/// Parse an OrbFit `.oel` orbital element file.
///
/// Arguments
/// -----------------
/// * `content`: the file content.
/// * `linear_fraction`, `angular_fraction`: used when the file has no `RMS`
///   line, the errors are then `a·linear`, `e·linear` and `360·angular`
///   for each angle.
pub fn parse_orbital_element_file(
    content: &str,
    linear_fraction: f64,
    angular_fraction: f64,
) -> Result<OrbfitSolve, ExarataError> {
    let find_line = |tag: &str| content.lines().map(str::trim).find(|line| line.contains(tag));

    let kep_line = find_line("KEP")
        .ok_or_else(|| ExarataError::File("The OrbFit output has no KEP element line".into()))?;
    let kep_tokens: Vec<&str> = kep_line.split_whitespace().collect();
    let elements = six_values(&parse_numbers(&kep_tokens[1..], kep_line)?, kep_line)?;

    let errors = match find_line("RMS") {
        Some(rms_line) => {
            let tokens: Vec<&str> = rms_line.split_whitespace().collect();
            six_values(&parse_numbers(tokens.get(2..).unwrap_or_default(), rms_line)?, rms_line)?
        }
        None => {
            let angular = 360.0 * angular_fraction;
            [
                elements[0] * linear_fraction,
                elements[1] * linear_fraction,
                angular,
                angular,
                angular,
                angular,
            ]
        }
    };

    let mjd_line = find_line("MJD")
        .ok_or_else(|| ExarataError::File("The OrbFit output has no MJD epoch line".into()))?;
    let epoch_mjd = mjd_line
        .split_whitespace()
        .nth(1)
        .map(|token| parse_numbers(&[token], mjd_line))
        .transpose()?
        .and_then(|values| values.first().copied())
        .ok_or_else(|| ExarataError::File(format!("The OrbFit line `{mjd_line}` has no epoch")))?;

    Ok(OrbfitSolve {
        elements: OrbitalElements::from_array(elements),
        errors: OrbitalElements::from_array(errors),
        epoch_mjd,
    })
}

/// Circular mean of angles in degrees, in [0, 360).
fn circular_mean(angles: &[f64]) -> f64 {
    let (sin, cos) = angles
        .iter()
        .fold((0.0, 0.0), |(s, c), angle| (s + (angle * RADEG).sin(), c + (angle * RADEG).cos()));
    (sin.atan2(cos) / RADEG + 360.0).rem_euclid(360.0)
}

fn combined_error(errors: &[f64]) -> f64 {
    errors.iter().map(|e| e * e).sum::<f64>().sqrt() / errors.len() as f64
}

/// Merge per-subset orbits.
///
/// Semi-major axis and eccentricity take the median, angles the circular
/// mean, and every error is `sqrt(Σσ²)/n`. All epochs must agree.
pub fn combine_subset_solves(solves: &[OrbfitSolve]) -> Result<OrbfitSolve, ExarataError> {
    if solves.is_empty() {
        return Err(orbfit_failure("no orbit could be found from the subsets of the observations"));
    }
    let epochs: Vec<f64> = solves.iter().map(|s| s.epoch_mjd).collect();
    let agree = epochs
        .iter()
        .tuple_windows()
        .all(|(a, b)| (a - b).abs() <= 1e-8 + 1e-5 * b.abs());
    if !agree {
        return Err(ExarataError::Input(
            "The modified Julian dates of the subset orbits differ; the OrbFit options file \
             should fix a single epoch"
                .into(),
        ));
    }

    let mut elements = [0.0; 6];
    let mut errors = [0.0; 6];
    for index in 0..6 {
        let values: Vec<f64> = solves.iter().map(|s| s.elements.to_array()[index]).collect();
        let sigmas: Vec<f64> = solves.iter().map(|s| s.errors.to_array()[index]).collect();
        elements[index] = if index < 2 {
            percentile(&values, 50.0).unwrap_or(f64::NAN)
        } else {
            circular_mean(&values)
        };
        errors[index] = combined_error(&sigmas);
    }

    Ok(OrbfitSolve {
        elements: OrbitalElements::from_array(elements),
        errors: OrbitalElements::from_array(errors),
        epoch_mjd: epochs.iter().sum::<f64>() / epochs.len() as f64,
    })
}

#[cfg(test)]
mod orbfit_test {
    use super::*;
    use approx::assert_relative_eq;

    const OEL_WITH_RMS: &str = "\
format  = 'OEF2.0'       ! file format
rectype = 'ML'           ! record type (1L/ML)
refsys  = ECLM J2000     ! default reference system
END_OF_HEADER
exarata
! Keplerian elements: a, e, i, long. node, arg. peric., mean anomaly
 KEP   2.767046248500000E+00  0.07553  10.59406  80.30553  73.59769  352.23053
 MJD     59600.000000000 TDT
 MAG  3.530  0.120
! RMS    1.03E-07   2.17E-08   1.25E-05   2.50E-05   4.0E-05   3.1E-05
";

    #[test]
    fn test_parse_oel_with_rms() {
        let solve = parse_orbital_element_file(OEL_WITH_RMS, 0.1, 0.1).unwrap();
        assert_relative_eq!(solve.elements.semimajor_axis, 2.7670462485);
        assert_eq!(solve.elements.mean_anomaly, 352.23053);
        assert_eq!(solve.errors.eccentricity, 2.17e-8);
        assert_eq!(solve.errors.mean_anomaly, 3.1e-5);
        assert_eq!(solve.epoch_mjd, 59600.0);
    }

    #[test]
    fn test_parse_oel_error_fallback() {
        let without_rms: String = OEL_WITH_RMS.lines().filter(|l| !l.contains("RMS")).join("\n");
        let solve = parse_orbital_element_file(&without_rms, 0.1, 0.05).unwrap();
        assert_relative_eq!(solve.errors.semimajor_axis, 0.27670462485, epsilon = 1e-12);
        assert_relative_eq!(solve.errors.eccentricity, 0.007553, epsilon = 1e-12);
        assert_relative_eq!(solve.errors.inclination, 18.0);
        assert_relative_eq!(solve.errors.argument_perihelion, 18.0);
    }

    #[test]
    fn test_parse_oel_missing_lines() {
        assert!(matches!(
            parse_orbital_element_file("END_OF_HEADER\n", 0.1, 0.1),
            Err(ExarataError::File(_))
        ));
    }

    fn solve(a: f64, angle: f64, sigma: f64, epoch_mjd: f64) -> OrbfitSolve {
        OrbfitSolve {
            elements: OrbitalElements::from_array([a, 0.1, angle, angle, angle, angle]),
            errors: OrbitalElements::from_array([sigma; 6]),
            epoch_mjd,
        }
    }

    #[test]
    fn test_combine_subsets() {
        let combined = combine_subset_solves(&[
            solve(2.0, 350.0, 3.0, 59600.0),
            solve(3.0, 10.0, 4.0, 59600.0),
            solve(10.0, 0.0, 0.0, 59600.0),
        ])
        .unwrap();
        // median, not mean
        assert_eq!(combined.elements.semimajor_axis, 3.0);
        let inclination = combined.elements.inclination;
        assert!(inclination < 1e-9 || (360.0 - inclination) < 1e-9);
        assert_relative_eq!(combined.errors.mean_anomaly, 5.0 / 3.0);
        assert_eq!(combined.epoch_mjd, 59600.0);
    }

    #[test]
    fn test_combine_rejects_differing_epochs_and_empty() {
        let result = combine_subset_solves(&[solve(2.0, 5.0, 1.0, 59600.0), solve(2.0, 5.0, 1.0, 59700.0)]);
        assert!(matches!(result, Err(ExarataError::Input(_))));
        assert!(matches!(
            combine_subset_solves(&[]),
            Err(ExarataError::Engine(EngineError::Failed { .. }))
        ));
    }

    fn template_install(root: &Utf8Path) -> ExarataConfig {
        let orbfit_directory = root.join("orbfit");
        fs::create_dir_all(orbfit_directory.join("exarata")).unwrap();
        fs::create_dir_all(orbfit_directory.join("bin")).unwrap();
        for extension in TEMPLATE_EXTENSIONS {
            fs::write(orbfit_directory.join("exarata").join(format!("exarata.{extension}")), "").unwrap();
        }
        ExarataConfig {
            orbfit_directory: orbfit_directory.to_string(),
            orbfit_binary_executable_directory: orbfit_directory.join("bin").to_string(),
            temporary_directory: root.join("tmp").to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_installation_check() {
        let root = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(root.path()).unwrap();
        let config = template_install(root);
        assert!(matches!(
            OrbfitOrbitEngine::check_installation(&config),
            Err(ExarataError::Install(message)) if message.contains("reinstall")
        ));
        fs::write(root.join("orbfit/bin/orbfit.x"), "").unwrap();
        assert!(OrbfitOrbitEngine::is_installed(&config));

        fs::remove_file(root.join("orbfit/exarata/exarata.oop")).unwrap();
        assert!(matches!(
            OrbfitOrbitEngine::check_installation(&config),
            Err(ExarataError::Install(message)) if message.contains("exarata.oop")
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_solve_with_stand_in_binary() {
        use std::os::unix::fs::PermissionsExt;

        let root = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(root.path()).unwrap();
        let config = template_install(root);
        let script = format!(
            "#!/bin/sh\nread name\ncat > \"$name.oel\" <<'EOF'\n{OEL_WITH_RMS}EOF\ntouch stale.rwo\n"
        );
        let executable = root.join("orbfit/bin/orbfit.x");
        fs::write(&executable, script).unwrap();
        fs::set_permissions(&executable, fs::Permissions::from_mode(0o755)).unwrap();

        let engine = OrbfitOrbitEngine::new(&config).unwrap();
        assert!(engine.operating_directory().join("exarata.inp").is_file());

        let record = ["     K07Q04R  C2007 08 17.35528 21 18 20.88 -14 57 59.8          19.3 R      568"];
        let solve = engine.solve_orbit_via_record(&record).unwrap();
        assert_eq!(solve.epoch_mjd, 59600.0);
        assert_eq!(solve.elements.eccentricity, 0.07553);
        // outputs are cleaned after the run
        assert!(!engine.operating_directory().join("exarata.oel").exists());
        assert!(!engine.operating_directory().join("stale.rwo").exists());
        assert_eq!(fs::read_to_string(engine.operating_directory().join("exarata.obs")).unwrap(), "");
    }
}
