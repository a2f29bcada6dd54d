//! Tempest Logger CLI
//!
//! Listens for WeatherFlow Tempest broadcasts and maintains the weather
//! history:
//! - Receive, log and summarize observations
//! - Dump the history at one resolution
//! - Generate a default config file

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tempest_logger::config::{generate_default_config, Config, LoggingConfig};
use tempest_logger::history::{
    snapshot, BucketStore, Granularity, HistoryError, LocalCalendar,
};
use tempest_logger::station::{self, Logbook, Station};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "tempest-logger")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Bounded-memory weather history for WeatherFlow Tempest stations")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file (default: search the standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Receive broadcasts until interrupted (default)
    Run {
        /// Directory for monthly log files
        #[arg(long)]
        log_dir: Option<PathBuf>,
        /// Directory for the snapshot cache
        #[arg(long)]
        cache_dir: Option<PathBuf>,
        /// Seconds between log file writes
        #[arg(long)]
        flush_secs: Option<u64>,
    },

    /// Print the history at one resolution, newest first
    Dump {
        /// day, week, month or year
        granularity: Granularity,
        /// Output format
        #[arg(short, long, value_enum, default_value_t = DumpFormat::Tsv)]
        format: DumpFormat,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DumpFormat {
    /// Cache lines, one per bin
    Tsv,
    /// JSON array of observations
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Config { output }) = &cli.command {
        return write_default_config(output.as_ref());
    }

    let mut config = Config::resolve(cli.config.as_deref())?;
    init_logging(&config.logging, cli.verbose);

    match cli.command.unwrap_or(Commands::Run {
        log_dir: None,
        cache_dir: None,
        flush_secs: None,
    }) {
        Commands::Run {
            log_dir,
            cache_dir,
            flush_secs,
        } => {
            if let Some(dir) = log_dir {
                config.storage.log_dir = dir.to_string_lossy().to_string();
            }
            if let Some(dir) = cache_dir {
                config.storage.cache_dir = Some(dir.to_string_lossy().to_string());
            }
            if let Some(secs) = flush_secs {
                config.storage.log_flush_secs = secs;
            }
            config.validate()?;
            run(&config).await
        }

        Commands::Dump {
            granularity,
            format,
        } => {
            config.validate()?;
            dump(&config, granularity, format)
        }

        Commands::Config { .. } => Ok(()),
    }
}

fn init_logging(logging: &LoggingConfig, verbose: u8) {
    let level = match verbose {
        0 => logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tempest_logger={}", level)));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Snapshot first, then any log files written since
fn restore(config: &Config) -> anyhow::Result<BucketStore> {
    let path = config.snapshot_path();
    let mut store = match snapshot::load(LocalCalendar::local(), config.history, &path) {
        Ok(store) => {
            tracing::info!("Restored history from {:?}", path);
            store
        }
        Err(HistoryError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!("No snapshot at {:?}, starting empty", path);
            BucketStore::with_calendar(LocalCalendar::local(), config.history)
        }
        Err(e) => {
            tracing::warn!("Ignoring snapshot {:?}: {}", path, e);
            BucketStore::with_calendar(LocalCalendar::local(), config.history)
        }
    };

    let logbook = Logbook::new(Some(config.log_dir()));
    let stats = logbook
        .replay_into(&mut store)
        .with_context(|| format!("replaying logs in {:?}", config.log_dir()))?;
    tracing::info!(
        accepted = stats.accepted,
        ignored = stats.ignored,
        "Replayed log files"
    );
    tracing::info!("History: {}", store.stats());

    Ok(store)
}

async fn run(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Tempest Logger v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Log directory: {:?}", config.log_dir());

    let store = restore(config)?;
    let settings = config.receiver_settings();
    let socket = station::bind(&settings)
        .await
        .with_context(|| format!("binding {}", settings.addr()))?;

    let station = Station::new(store, Logbook::new(Some(config.log_dir())));
    let station = station
        .run(&socket, &settings, station::shutdown_signal())
        .await;

    let (store, _) = station.into_parts();
    let path = config.snapshot_path();
    snapshot::save(&store, &path).with_context(|| format!("saving snapshot {:?}", path))?;
    tracing::info!("Saved snapshot to {:?}", path);

    Ok(())
}

fn dump(config: &Config, granularity: Granularity, format: DumpFormat) -> anyhow::Result<()> {
    let store = restore(config)?;
    let bins = store.extract(granularity);

    match format {
        DumpFormat::Tsv => {
            for bin in &bins {
                println!("{}", bin);
            }
        }
        DumpFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&bins)?);
        }
    }

    Ok(())
}

fn write_default_config(output: Option<&PathBuf>) -> anyhow::Result<()> {
    let content = generate_default_config();
    match output {
        Some(path) => {
            std::fs::write(path, content).with_context(|| format!("writing {:?}", path))?;
            eprintln!("Wrote default config to {:?}", path);
        }
        None => print!("{}", content),
    }
    Ok(())
}
