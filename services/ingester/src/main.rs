//! Forecast ETL command line.
//!
//! Runs wind and wave ingestion cycles into PostgreSQL/PostGIS, purges
//! tables, and answers station and bounding-box queries.

mod commands;
mod config_loader;
mod logging;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use forecast_common::{BoundingBox, Domain, TableKind, TimeRange};
use ingestion::PurgeTarget;
use station_query::StationLookup;
use std::path::PathBuf;
use storage::{MemoryStore, PgStore};
use tracing::{info, warn};

use commands::{execute, Request};
use config_loader::load_service_config;

#[derive(Parser, Debug)]
#[command(name = "ingester")]
#[command(about = "Wind and wave forecast ETL into a spatial database")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "INGESTER_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (overridden by RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Append logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<String>,

    /// Use a throwaway in-memory store instead of the database
    #[arg(long)]
    memory: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create tables and indexes if absent
    Migrate,

    /// Run a wind cycle over one or more NetCDF files sharing a grid
    Wind {
        #[arg(short, long = "file", required = true)]
        files: Vec<PathBuf>,
    },

    /// Run a wave cycle over a tab01/tab41 pair
    Wave {
        #[arg(long)]
        tab01: PathBuf,
        #[arg(long)]
        tab41: PathBuf,
    },

    /// Delete all rows of a table
    Purge {
        domain: Domain,
        target: PurgeTarget,
    },

    /// Query loaded rows
    #[command(subcommand)]
    Query(QueryCommand),
}

#[derive(Subcommand, Debug)]
enum QueryCommand {
    /// Rows of one station, by name or nearest to a point
    Station {
        domain: Domain,
        kind: TableKind,
        #[arg(long, conflicts_with_all = ["lat", "lon"])]
        name: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        lat: Option<f64>,
        #[arg(long, allow_hyphen_values = true)]
        lon: Option<f64>,
        #[command(flatten)]
        window: TimeWindow,
    },

    /// Rows of every station inside a bounding box
    Bbox {
        domain: Domain,
        kind: TableKind,
        #[arg(long, allow_hyphen_values = true)]
        min_lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        max_lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        min_lon: f64,
        #[arg(long, allow_hyphen_values = true)]
        max_lon: f64,
        #[command(flatten)]
        window: TimeWindow,
    },
}

#[derive(Args, Debug)]
struct TimeWindow {
    /// Start of the window (inclusive)
    #[arg(long)]
    start: String,
    /// End of the window (inclusive)
    #[arg(long)]
    end: String,
}

impl TimeWindow {
    fn range(&self) -> Result<TimeRange> {
        TimeRange::parse(&self.start, &self.end).context("Invalid time window")
    }
}

impl Command {
    fn into_request(self) -> Result<Request> {
        Ok(match self {
            Command::Migrate => Request::Migrate,
            Command::Wind { files } => Request::Wind { files },
            Command::Wave { tab01, tab41 } => Request::Wave { tab01, tab41 },
            Command::Purge { domain, target } => Request::Purge { domain, target },
            Command::Query(QueryCommand::Station {
                domain,
                kind,
                name,
                lat,
                lon,
                window,
            }) => Request::Station {
                domain,
                kind,
                lookup: StationLookup::from_parts(name, lat, lon)?,
                range: window.range()?,
            },
            Command::Query(QueryCommand::Bbox {
                domain,
                kind,
                min_lat,
                max_lat,
                min_lon,
                max_lon,
                window,
            }) => Request::Bbox {
                domain,
                kind,
                bbox: BoundingBox::checked(min_lat, max_lat, min_lon, max_lon)
                    .context("Invalid bounding box")?,
                range: window.range()?,
            },
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = load_service_config(cli.config.as_deref())?;

    let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    let json = cli.log_json || config.logging.format == "json";
    let log_file = cli.log_file.as_deref().or(config.logging.file.as_deref());
    logging::init_tracing(level, json, log_file)?;

    info!(config = ?cli.config, memory = cli.memory, "Starting forecast ingester");

    let request = cli.command.into_request()?;
    let output = if cli.memory {
        warn!("Using the in-memory store; nothing will be persisted");
        execute(MemoryStore::new(), &config, request).await?
    } else {
        let url = config
            .etl
            .database_url
            .as_deref()
            .context("No database URL configured (set DATABASE_URL or etl.database_url)")?;
        let store = PgStore::connect(url, config.etl.max_connections)
            .await
            .context("Failed to connect to the database")?;
        execute(store, &config, request).await?
    };

    println!("{}", output);
    Ok(())
}
