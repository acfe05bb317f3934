//! `opihiexarata`: command line front end of the Opihi analysis toolkit.
use std::process::ExitCode;

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand};
use opihiexarata::{
    config::{generate_configuration_file_copy, generate_secrets_file_copy, ExarataConfig},
    engine::{AnyEngine, EngineArgument, EngineDomain, EngineRegistry, OrbitEngine, VehicleArgs},
    exarata_errors::ExarataError,
    mpcrecord::{self, MpcRecord},
    opihi::{OpihiOverrides, OpihiSolution},
    orbit::OrbitalSolution,
    propagate::PropagativeSolution,
    tasks::{SolveStep, SolveTaskRunner},
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Analysis of Opihi telescope images: astrometry, photometry, orbits")]
struct Cli {
    /// Configuration file, applied over the defaults
    #[arg(long, global = true)]
    config: Option<Utf8PathBuf>,

    /// Secrets file, applied last
    #[arg(long, global = true)]
    secrets: Option<Utf8PathBuf>,

    /// More log output, repeat for more
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a copy of the default configuration file
    GenerateConfig {
        path: Utf8PathBuf,
        #[arg(long)]
        overwrite: bool,
    },
    /// Write a copy of the default secrets file
    GenerateSecrets {
        path: Utf8PathBuf,
        #[arg(long)]
        overwrite: bool,
    },
    /// List the engine names of every domain
    Engines,
    /// Print the orbital solution of given elements
    CustomOrbit(CustomOrbitArgs),
    /// Propagate the motion of an MPC record
    Propagate {
        /// MPC 80-column record file
        #[arg(long)]
        record: Utf8PathBuf,
        /// Propagation engine name
        #[arg(long, default_value = "linear")]
        engine: String,
        /// Julian days to predict
        #[arg(long = "time", required = true, num_args = 1..)]
        times: Vec<f64>,
    },
    /// Solve an Opihi image and print its MPC record row
    Solve(SolveArgs),
}

#[derive(Args, Debug)]
struct CustomOrbitArgs {
    /// Semimajor axis, AU
    #[arg(long = "a")]
    semimajor_axis: f64,
    /// Eccentricity
    #[arg(long = "e")]
    eccentricity: f64,
    /// Inclination, degrees
    #[arg(long = "i")]
    inclination: f64,
    /// Longitude of the ascending node, degrees
    #[arg(long = "node")]
    longitude_ascending_node: f64,
    /// Argument of perihelion, degrees
    #[arg(long = "perihelion")]
    argument_perihelion: f64,
    /// Mean anomaly, degrees
    #[arg(long)]
    mean_anomaly: f64,
    /// Osculating epoch, Julian day
    #[arg(long)]
    epoch: f64,
}

#[derive(Args, Debug)]
struct SolveArgs {
    fits: Utf8PathBuf,
    #[arg(long)]
    astrometry: Option<String>,
    #[arg(long)]
    photometry: Option<String>,
    #[arg(long)]
    orbit: Option<String>,
    #[arg(long)]
    ephemeris: Option<String>,
    #[arg(long)]
    propagate: Option<String>,
    #[arg(long)]
    asteroid_name: Option<String>,
    /// Asteroid pixel column
    #[arg(long, requires = "asteroid_y")]
    asteroid_x: Option<f64>,
    /// Asteroid pixel row
    #[arg(long, requires = "asteroid_x")]
    asteroid_y: Option<f64>,
    /// MPC record file of earlier observations
    #[arg(long)]
    history: Option<Utf8PathBuf>,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn print_engines(registry: &EngineRegistry) {
    for domain in EngineDomain::ALL {
        println!("{domain}:");
        for name in registry.names(domain) {
            println!("    {name}");
        }
    }
}

fn custom_orbit(args: &CustomOrbitArgs, config: &ExarataConfig) -> Result<(), ExarataError> {
    let vehicle_args = VehicleArgs::new()
        .with("semimajor_axis", args.semimajor_axis)
        .with("eccentricity", args.eccentricity)
        .with("inclination", args.inclination)
        .with("longitude_ascending_node", args.longitude_ascending_node)
        .with("argument_perihelion", args.argument_perihelion)
        .with("mean_anomaly", args.mean_anomaly)
        .with("epoch_julian_day", args.epoch);
    let records: [&str; 0] = [];
    let orbit = OrbitalSolution::new(&records, &OrbitEngine::CustomOrbit.into(), &vehicle_args, config)?;
    println!("semimajor_axis           {} ± {}", orbit.semimajor_axis(), orbit.semimajor_axis_error());
    println!("eccentricity             {} ± {}", orbit.eccentricity(), orbit.eccentricity_error());
    println!("inclination              {} ± {}", orbit.inclination(), orbit.inclination_error());
    println!(
        "longitude_ascending_node {} ± {}",
        orbit.longitude_ascending_node(),
        orbit.longitude_ascending_node_error()
    );
    println!(
        "argument_perihelion      {} ± {}",
        orbit.argument_perihelion(),
        orbit.argument_perihelion_error()
    );
    println!("mean_anomaly             {} ± {}", orbit.mean_anomaly(), orbit.mean_anomaly_error());
    println!("eccentric_anomaly        {} ± {}", orbit.eccentric_anomaly(), orbit.eccentric_anomaly_error());
    println!("true_anomaly             {} ± {}", orbit.true_anomaly(), orbit.true_anomaly_error());
    println!("epoch_julian_day         {}", orbit.epoch_julian_day());
    Ok(())
}

fn propagate(
    registry: &EngineRegistry,
    record: &Utf8Path,
    engine: &str,
    times: &[f64],
) -> Result<(), ExarataError> {
    let engine = registry.lookup(engine, Some(EngineDomain::Propagation))?;
    let lines = mpcrecord::read_minor_planet_record_file(record)?;
    let observations = mpcrecord::minor_planet_record_to_table(&lines)?
        .iter()
        .map(MpcRecord::observation)
        .collect::<Result<Vec<_>, _>>()?;
    let ra: Vec<f64> = observations.iter().map(|o| o.ra).collect();
    let dec: Vec<f64> = observations.iter().map(|o| o.dec).collect();
    let observed: Vec<f64> = observations.iter().map(|o| o.julian_day).collect();

    let solution = PropagativeSolution::new(&ra, &dec, &observed, &EngineArgument::Class(engine))?;
    println!(
        "velocity      ra {} dec {} deg/day",
        solution.ra_velocity(),
        solution.dec_velocity()
    );
    println!(
        "acceleration  ra {} dec {} deg/day²",
        solution.ra_acceleration(),
        solution.dec_acceleration()
    );
    let (future_ra, future_dec) = solution.forward_propagate(times);
    for ((time, ra), dec) in times.iter().zip(future_ra).zip(future_dec) {
        println!("{time:.6} {ra:.6} {dec:.6}");
    }
    Ok(())
}

/// One step per engine named on the command line, in solving order.
fn solve_steps(args: &SolveArgs, registry: &EngineRegistry) -> Result<Vec<SolveStep>, ExarataError> {
    let mut steps = Vec::new();
    for (domain, name) in [
        (EngineDomain::Astrometry, &args.astrometry),
        (EngineDomain::Photometry, &args.photometry),
        (EngineDomain::Orbit, &args.orbit),
        (EngineDomain::Ephemeris, &args.ephemeris),
        (EngineDomain::Propagation, &args.propagate),
    ] {
        let Some(name) = name else { continue };
        let engine = registry.lookup(name, Some(domain))?;
        if engine == AnyEngine::Orbit(OrbitEngine::CustomOrbit) {
            return Err(ExarataError::Input(format!(
                "`{name}` needs orbital elements, use the `custom-orbit` command instead of `--orbit`"
            )));
        }
        steps.push(SolveStep::new(engine));
    }
    if steps.is_empty() {
        return Err(ExarataError::Input("No engine was given, there is nothing to solve".into()));
    }
    Ok(steps)
}

async fn solve(args: SolveArgs, registry: &EngineRegistry, config: &ExarataConfig) -> Result<(), ExarataError> {
    let asteroid_history = args
        .history
        .as_deref()
        .map(mpcrecord::read_minor_planet_record_file)
        .transpose()?;
    let overrides = OpihiOverrides {
        asteroid_name: args.asteroid_name.clone(),
        asteroid_location: args.asteroid_x.zip(args.asteroid_y),
        asteroid_history,
        ..OpihiOverrides::default()
    };
    let solution = OpihiSolution::new(&args.fits, config, overrides)?;

    let steps = solve_steps(&args, registry)?;
    let mut runner = SolveTaskRunner::new(config);
    let cancellation = runner.cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling at the next web request");
            cancellation.cancel();
        }
    });
    runner.spawn_pipeline(solution, steps);
    let Some(outcome) = runner.next_outcome().await else {
        return Err(ExarataError::Cancelled);
    };
    outcome.result?;

    let mut solution = outcome.solution;
    if solution.photometrics().is_some() && solution.asteroid_location().is_some() {
        match solution.compute_asteroid_magnitude(None) {
            Ok((magnitude, error)) => info!(magnitude, error, "asteroid magnitude"),
            Err(err) => warn!(error = %err, "no asteroid magnitude"),
        }
    }
    if let Some(propagation) = solution.propagatives() {
        println!(
            "propagation   ra {} dec {} deg/day",
            propagation.ra_velocity(),
            propagation.dec_velocity()
        );
    }
    if let Some(ephemeris) = solution.ephemeritics() {
        println!(
            "ephemeris     ra {} dec {} deg/s",
            ephemeris.ra_velocity(),
            ephemeris.dec_velocity()
        );
    }
    for row in solution.mpc_record_full()? {
        println!("{row}");
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<(), ExarataError> {
    let registry = EngineRegistry::default();
    let load_config = || ExarataConfig::from_files(cli.config.as_deref(), cli.secrets.as_deref());
    match cli.command {
        Command::GenerateConfig { path, overwrite } => {
            println!("{}", generate_configuration_file_copy(&path, overwrite)?);
            Ok(())
        }
        Command::GenerateSecrets { path, overwrite } => {
            println!("{}", generate_secrets_file_copy(&path, overwrite)?);
            Ok(())
        }
        Command::Engines => {
            print_engines(&registry);
            Ok(())
        }
        Command::CustomOrbit(args) => custom_orbit(&args, &load_config()?),
        Command::Propagate { record, engine, times } => propagate(&registry, &record, &engine, &times),
        Command::Solve(args) => solve(args, &registry, &load_config()?).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod main_test {
    use super::*;

    fn solve_args(extra: &[&str]) -> SolveArgs {
        let cli = Cli::parse_from(["opihiexarata", "solve", "image.fits"].iter().chain(extra));
        match cli.command {
            Command::Solve(args) => args,
            other => panic!("not a solve command: {other:?}"),
        }
    }

    #[test]
    fn test_solve_steps_in_domain_order() {
        let registry = EngineRegistry::default();
        let args = solve_args(&["--propagate", "linear", "--astrometry", "astrometry.net nova"]);
        let steps = solve_steps(&args, &registry).unwrap();
        let domains: Vec<EngineDomain> = steps.iter().map(|step| step.engine.domain()).collect();
        assert_eq!(domains, vec![EngineDomain::Astrometry, EngineDomain::Propagation]);
    }

    #[test]
    fn test_custom_orbit_rejected_from_solve() {
        let registry = EngineRegistry::default();
        let args = solve_args(&["--astrometry", "astrometry.net nova", "--orbit", "custom orbit"]);
        match solve_steps(&args, &registry) {
            Err(ExarataError::Input(message)) => assert!(message.contains("custom-orbit")),
            other => panic!("unexpected steps: {other:?}"),
        }
        assert!(matches!(
            solve_steps(&solve_args(&[]), &registry),
            Err(ExarataError::Input(_))
        ));
        assert!(matches!(
            solve_steps(&solve_args(&["--orbit", "not an engine"]), &registry),
            Err(ExarataError::NoSuchEngine(_))
        ));
    }
}
