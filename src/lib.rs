//! # Tempest Logger
//!
//! Weather history for a WeatherFlow Tempest station: every UDP observation is
//! logged verbatim and folded into a fixed-size, multi-resolution history.
//!
//! ## Features
//!
//! - **Bounded memory**: 5 minute, 30 minute, 2 hour and daily bins, allocated once
//! - **Durability**: monthly raw message logs, replayed on startup
//! - **Fast restart**: snapshot cache of the whole history
//!
//! ## Modules
//!
//! - [`history`]: Observation, the cascading bucket store, replay and snapshots
//! - [`station`]: UDP receive loop, datagram decoding and log files
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tempest_logger::history::BucketStore;
//! use tempest_logger::station::{bind, shutdown_signal, Logbook, ReceiverSettings, Station};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = ReceiverSettings::default();
//!     let socket = bind(&settings).await?;
//!
//!     let station = Station::new(BucketStore::new(), Logbook::new(Some("./logs".into())));
//!     let station = station.run(&socket, &settings, shutdown_signal()).await;
//!
//!     println!("{}", station.store().stats());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod history;
pub mod station;

// Re-export top-level types for convenience
pub use history::{
    BucketStore, Capacities, Granularity, HistoryError, HistoryResult, HistoryStats, Observation,
    UpdateOutcome,
};

pub use station::{DecodeError, Logbook, Message, ReceiverSettings, Station, StationError};

pub use config::{Config, ConfigError, LoggingConfig};
