//! MCL: Monte Carlo localization of a vehicle against a 2D landmark map.
//!
//! The binary drives the particle filter over a synthetic scenario: a ground-truth trajectory is generated
//! from constant velocity and yaw rate commands, noisy controls and landmark observations are derived from
//! it, and the filter's estimate is compared to the truth at every step.
//!
//! - `simulate`: run a scenario and write the per-step errors to CSV
//! - `create-config`: write a template simulation configuration (TOML/JSON/YAML)
use clap::{Args, Parser, Subcommand};
use log::{error, info};
use std::error::Error;
use std::path::PathBuf;

use mcl::map::Map;
use mcl::particle::ParticleAveragingStrategy;
use mcl::sampling::RandSampler;
use mcl::sim::{LocalizationResult, SimulationConfig, SimulationSummary, random_map, simulate};

/// Command line arguments
#[derive(Parser)]
#[command(author, version, about = "Particle filter localization against a 2D landmark map.")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Log file path (if not specified, logs to stderr)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand, Clone)]
enum Command {
    #[command(
        name = "simulate",
        about = "Run the filter over a synthetic scenario",
        long_about = "Generate a ground-truth trajectory with noisy controls and landmark observations, run the particle filter over it, and write the per-step localization errors to a CSV file."
    )]
    Simulate(SimulateArgs),
    #[command(name = "create-config", about = "Generate a template configuration file")]
    CreateConfig(CreateConfigArgs),
}

#[derive(Args, Clone, Debug)]
struct SimulateArgs {
    /// Simulation configuration file (TOML/JSON/YAML); defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Landmark map CSV with columns id,x,y; a random map is generated when omitted
    #[arg(short, long)]
    map: Option<PathBuf>,

    /// Output CSV file path
    #[arg(short, long)]
    output: PathBuf,

    /// Override the number of time steps
    #[arg(long)]
    steps: Option<usize>,

    /// Override the number of particles
    #[arg(long)]
    particles: Option<usize>,

    /// Override the random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Override the point estimate strategy
    #[arg(long, value_enum)]
    estimate: Option<ParticleAveragingStrategy>,

    /// Number of landmarks in a generated map
    #[arg(long, default_value_t = 50)]
    num_landmarks: usize,

    /// Half-width of the square a generated map covers
    #[arg(long, default_value_t = 100.0)]
    extent: f64,
}

#[derive(Args, Clone, Debug)]
struct CreateConfigArgs {
    /// Where to write the template; the extension selects the format
    #[arg(short, long, default_value = "mcl.toml")]
    output: PathBuf,
}

/// Initialize the logger with the specified configuration.
///
/// # Arguments
/// * `log_level` - Log level string (off, error, warn, info, debug, trace)
/// * `log_file` - Optional path to log file (logs to stderr if None)
fn init_logger(log_level: &str, log_file: Option<&PathBuf>) -> Result<(), Box<dyn Error>> {
    use std::io::Write;

    let level = log_level.parse::<log::LevelFilter>().unwrap_or_else(|_| {
        eprintln!("Invalid log level '{}', defaulting to 'info'", log_level);
        log::LevelFilter::Info
    });

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} [{}] - {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.args()
        )
    });

    if let Some(log_path) = log_file {
        if let Some(parent) = log_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let target = Box::new(
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_path)?,
        );
        builder.target(env_logger::Target::Pipe(target));
    }

    builder.try_init()?;
    Ok(())
}

fn run_simulate(args: &SimulateArgs) -> Result<(), Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            SimulationConfig::from_file(path)?
        }
        None => SimulationConfig::default(),
    };
    if let Some(steps) = args.steps {
        config.num_steps = steps;
    }
    if let Some(particles) = args.particles {
        config.filter.num_particles = particles;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(strategy) = args.estimate {
        config.filter.averaging_strategy = strategy;
    }

    let map = match &args.map {
        Some(path) => Map::from_csv(path)?,
        None => {
            let mut sampler = RandSampler::from_seed(config.seed.wrapping_sub(1));
            random_map(args.num_landmarks, args.extent, &mut sampler)?
        }
    };
    info!(
        "Running {} steps with {} particles against {} landmarks",
        config.num_steps,
        config.filter.num_particles,
        map.len()
    );

    let results = simulate(&config, &map)?;
    LocalizationResult::to_csv(&results, &args.output)?;
    info!("Results written to {}", args.output.display());

    if let Some(summary) = SimulationSummary::from_results(&results) {
        println!(
            "steps: {}\nmean position error: {:.4}\nmax position error: {:.4}\nfinal position error: {:.4}\nmean heading error: {:.5}",
            summary.steps,
            summary.mean_position_error,
            summary.max_position_error,
            summary.final_position_error,
            summary.mean_heading_error
        );
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logger(&cli.log_level, cli.log_file.as_ref())?;

    match &cli.command {
        Command::Simulate(args) => {
            if let Err(e) = run_simulate(args) {
                error!("Simulation failed: {}", e);
                return Err(e);
            }
        }
        Command::CreateConfig(args) => {
            SimulationConfig::default().to_file(&args.output)?;
            info!("Template configuration written to {}", args.output.display());
        }
    }
    Ok(())
}
