//! RoadEye CLI - nearby road hazards from the command line.
//!
//! Thin front end over `roadeye-core`: builds the store, API client and
//! sync controller from the user's config, then runs one command.

mod commands;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use roadeye_core::{
    ApiClient, Config, Coordinate, FileStorage, FixedLocation, HazardType, ProximityCacheStore,
    Severity, SyncController,
};

// ============================================================================
// Constants
// ============================================================================

const MIN_RADIUS_KM: f64 = 0.1;
const MAX_RADIUS_KM: f64 = 50.0;

#[derive(Parser)]
#[command(name = "roadeye")]
#[command(version, about = "Nearby road hazards, cached for offline use", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Observer latitude in degrees
    #[arg(long, global = true, env = "ROADEYE_LAT", allow_hyphen_values = true)]
    lat: Option<f64>,

    /// Observer longitude in degrees
    #[arg(long, global = true, env = "ROADEYE_LON", allow_hyphen_values = true)]
    lon: Option<f64>,

    /// Search radius in km, overriding both configured radii
    #[arg(long, global = true, value_parser = parse_radius)]
    radius: Option<f64>,

    /// Also write logs to a daily-rolling file in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Print hazards as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the hazard map set, from cache while it is fresh
    Nearby {
        /// Fetch even if the cache is still fresh
        #[arg(long)]
        refresh: bool,
    },

    /// Show hazards sorted by distance
    Alerts,

    /// Refresh periodically until interrupted
    Watch,

    /// Report a hazard at the current position
    Report {
        /// pothole, debris, accident, construction or other
        #[arg(long = "type")]
        hazard_type: HazardType,

        /// low, medium or high
        #[arg(long, default_value = "medium")]
        severity: Severity,

        #[arg(long)]
        description: Option<String>,

        /// Photo to attach
        #[arg(long)]
        image: Option<PathBuf>,
    },

    /// Run detection on a photo and report what it finds
    Detect {
        image: PathBuf,

        /// Only show the detection result
        #[arg(long)]
        dry_run: bool,
    },

    /// Confirm a hazard is still there
    Verify { id: String },

    /// Delete a hazard you reported
    Delete { id: String },

    /// Show one hazard from the service
    Show { id: String },

    /// Show the persisted cache state
    CacheInfo,

    /// Clear the hazard cache, including the persisted snapshot
    Clear,
}

fn parse_radius(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("invalid radius '{}': expected a number", s))?;
    if !value.is_finite() || !(MIN_RADIUS_KM..=MAX_RADIUS_KM).contains(&value) {
        return Err(format!(
            "radius must be between {} and {}",
            MIN_RADIUS_KM, MAX_RADIUS_KM
        ));
    }
    Ok(value)
}

/// The observer position from `--lat`/`--lon`, if both were given.
fn observer_position(lat: Option<f64>, lon: Option<f64>) -> Result<Option<Coordinate>> {
    match (lat, lon) {
        (Some(lat), Some(lon)) => {
            let position = Coordinate::new(lat, lon);
            if !position.is_valid() {
                anyhow::bail!(
                    "position {} is out of range (latitude -90..90, longitude -180..180)",
                    position
                );
            }
            Ok(Some(position))
        }
        (None, None) => Ok(None),
        _ => anyhow::bail!("--lat and --lon must be given together"),
    }
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "roadeye.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

fn build_controller(
    cli: &Cli,
    config: &Config,
    position: Option<Coordinate>,
) -> Result<SyncController> {
    let storage = Arc::new(FileStorage::new(config.cache_dir()?)?);
    let store = Arc::new(ProximityCacheStore::new(storage, config.store_options()));

    let mut client = ApiClient::with_timeout(&config.api_base_url, config.request_timeout())?;
    if let Some(ref token) = config.api_token {
        client.set_token(Arc::new(token.clone()));
    }

    let location = match position {
        Some(position) => FixedLocation::new(position),
        None => FixedLocation::unknown(),
    };

    let mut options = config.sync_options();
    if let Some(radius) = cli.radius {
        options.map_radius_km = radius;
        options.alerts_radius_km = radius;
    }

    Ok(SyncController::new(
        Arc::new(client),
        store,
        Arc::new(location),
        options,
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.log_dir.as_deref());
    info!("RoadEye starting");

    let position = observer_position(cli.lat, cli.lon)?;
    let config = Config::load()?;
    let controller = build_controller(&cli, &config, position)?;

    match cli.command {
        Commands::Nearby { refresh } => commands::nearby(&controller, refresh, cli.json).await,
        Commands::Alerts => commands::alerts(&controller, cli.json).await,
        Commands::Watch => commands::watch(Arc::new(controller)).await,
        Commands::Report {
            hazard_type,
            severity,
            description,
            image,
        } => {
            let hazard = commands::ReportArgs {
                hazard_type,
                severity,
                description,
                image,
            };
            commands::report(&controller, position, hazard).await
        }
        Commands::Detect { image, dry_run } => commands::detect(&controller, &image, dry_run).await,
        Commands::Verify { id } => commands::verify(&controller, &id).await,
        Commands::Delete { id } => commands::delete(&controller, &id).await,
        Commands::Show { id } => commands::show(&controller, &id, cli.json).await,
        Commands::CacheInfo => commands::cache_info(&controller).await,
        Commands::Clear => commands::clear(&controller).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_observer_position() {
        assert_eq!(
            observer_position(Some(37.77), Some(-122.4)).unwrap(),
            Some(Coordinate::new(37.77, -122.4))
        );
        assert_eq!(observer_position(None, None).unwrap(), None);
        assert!(observer_position(Some(90.5), Some(0.0)).is_err());
        assert!(observer_position(Some(0.0), Some(-181.0)).is_err());
        assert!(observer_position(Some(f64::NAN), Some(0.0)).is_err());
        assert!(observer_position(Some(10.0), None).is_err());
    }

    #[test]
    fn test_non_numeric_latitude_rejected() {
        assert!(Cli::try_parse_from(["roadeye", "--lat", "north", "--lon", "0", "alerts"]).is_err());
    }

    #[test]
    fn test_radius_bounds() {
        assert_eq!(parse_radius("0.1"), Ok(0.1));
        assert_eq!(parse_radius("50"), Ok(50.0));
        assert!(parse_radius("0").is_err());
        assert!(parse_radius("51").is_err());
    }

    #[test]
    fn test_parse_report_args() {
        let cli = Cli::try_parse_from([
            "roadeye", "--lat", "-33.9", "--lon", "151.2", "report", "--type", "pothole",
        ])
        .unwrap();
        assert_eq!(cli.lat, Some(-33.9));
        match cli.command {
            Commands::Report {
                hazard_type,
                severity,
                ..
            } => {
                assert_eq!(hazard_type, HazardType::Pothole);
                assert_eq!(severity, Severity::Medium);
            }
            _ => panic!("expected report"),
        }
    }
}
