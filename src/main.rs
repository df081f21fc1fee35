use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::rc::Rc;

use autoracer::{write_csv, ConfigError, RaceConfig, Simulation, TrackError, VehicleReport};
use clap::Parser;
use thiserror::Error;

/// Runs autonomous races on a track image without a display.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    /// The track image; gray, blue and white pixels are road.
    #[arg(long)]
    track: PathBuf,

    /// A TOML file overriding the default race parameters.
    #[arg(long)]
    config: Option<PathBuf>,

    /// The number of races to run.
    #[arg(long, default_value_t = 1)]
    races: usize,

    /// Abandons a race after this much simulated time.
    #[arg(long, default_value_t = 600.0)]
    max_seconds: f64,

    /// Writes every vehicle's report to this CSV file.
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Prints the reports as JSON instead of a table.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Track(#[from] TrackError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to write results: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode results: {0}")]
    Json(#[from] serde_json::Error),
}

fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "autoracer=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => RaceConfig::load(path)?,
        None => RaceConfig::default(),
    };
    let track = Rc::new(autoracer::TrackSurface::open(&cli.track, &config.track)?);
    let dt = config.dt();
    let max_ticks = (cli.max_seconds * config.tick_rate).ceil() as usize;
    let mut sim = Simulation::new(track, config)?;

    let mut reports: Vec<VehicleReport> = vec![];
    for race in 0..cli.races {
        if race > 0 {
            sim.restart();
        }
        sim.run(dt, max_ticks, |_| false);
        if !sim.is_finished() {
            log::warn!("Race {} abandoned after {:.2}s", race + 1, sim.elapsed());
        }
        reports.extend(sim.reports());
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        print!("{}", sim.close());
    }
    if let Some(path) = &cli.csv {
        let mut out = BufWriter::new(File::create(path)?);
        write_csv(&mut out, &reports)?;
        out.flush()?;
    }
    Ok(())
}
