//! Tempest station receiver
//!
//! This module turns UDP broadcasts into history:
//!
//! - **decoder**: JSON datagram decoding
//! - **logbook**: Raw message log files and replay
//! - **error**: Error types
//!
//! # Architecture
//!
//! ```text
//! Receive Path:
//!   UDP datagram → Logbook queue → decode → BucketStore::update
//!
//! Every flush interval:
//!   Logbook queue → weatherflow-YYYY-MM.txt
//! ```
//!
//! The receive loop is single-task: the store is owned by the [`Station`]
//! and never shared, so no locking is involved.

pub mod decoder;
pub mod error;
pub mod logbook;

pub use decoder::{decode, decode_observation, DecodeError, Message};
pub use error::{StationError, StationResult};
pub use logbook::{log_file_name, Logbook};

use crate::history::{BucketStore, Calendar, LocalCalendar, UpdateOutcome};
use chrono::Utc;
use std::future::Future;
use std::time::Duration;
use tokio::net::UdpSocket;

/// Port Tempest hubs broadcast on
pub const DEFAULT_PORT: u16 = 50222;

/// Tempest messages are well under this
pub const MAX_DATAGRAM: usize = 1024;

/// Observations further than this ahead of the head are logged loudly:
/// once accepted, every earlier reading is stale.
const FORWARD_JUMP_WARN_SECS: i64 = 86_400;

/// Receive loop settings
#[derive(Debug, Clone)]
pub struct ReceiverSettings {
    pub bind_address: String,
    pub port: u16,
    /// Longest wait for a datagram before checking the flush timer
    pub receive_timeout: Duration,
    /// How often queued messages are written to the log
    pub flush_interval: Duration,
}

impl Default for ReceiverSettings {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            receive_timeout: Duration::from_secs(60),
            flush_interval: Duration::from_secs(300),
        }
    }
}

impl ReceiverSettings {
    /// Get socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// Open the broadcast listening socket
pub async fn bind(settings: &ReceiverSettings) -> StationResult<UdpSocket> {
    let socket = UdpSocket::bind(settings.addr()).await?;
    socket.set_broadcast(true)?;
    tracing::info!("Listening for Tempest broadcasts on {}", socket.local_addr()?);
    Ok(socket)
}

/// Resolves on Ctrl+C, or SIGHUP on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let hangup = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGHUP handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let hangup = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = hangup => {},
    }

    tracing::info!("Shutdown signal received");
}

/// A store plus the logbook recording what fed it
#[derive(Debug)]
pub struct Station<C: Calendar = LocalCalendar> {
    store: BucketStore<C>,
    logbook: Logbook,
}

impl<C: Calendar> Station<C> {
    pub fn new(store: BucketStore<C>, logbook: Logbook) -> Self {
        Self { store, logbook }
    }

    pub fn store(&self) -> &BucketStore<C> {
        &self.store
    }

    pub fn logbook(&self) -> &Logbook {
        &self.logbook
    }

    pub fn into_parts(self) -> (BucketStore<C>, Logbook) {
        (self.store, self.logbook)
    }

    /// Log one raw datagram and feed it to the store if it is an observation
    pub fn handle_datagram(&mut self, payload: &[u8]) -> Option<UpdateOutcome> {
        let raw = String::from_utf8_lossy(payload);
        self.logbook.record(&raw);

        match decode(&raw) {
            Ok(Message::Observation(obs)) => {
                if let Some(gap) = forward_jump(self.store.head().map(|h| h.time), obs.time) {
                    tracing::warn!(
                        time = obs.time,
                        gap,
                        "Observation jumps {}s past the newest reading, check the station clock",
                        gap
                    );
                }
                let outcome = self.store.update(obs);
                tracing::debug!(time = obs.time, ?outcome, "Observation");
                Some(outcome)
            }
            Ok(Message::RapidWind {
                time,
                speed,
                direction,
            }) => {
                tracing::trace!(time, speed, direction, "Rapid wind");
                None
            }
            Ok(Message::Other(kind)) => {
                tracing::trace!("Ignoring {} message", kind);
                None
            }
            Err(e) => {
                tracing::debug!("Malformed datagram: {}", e);
                None
            }
        }
    }

    /// Write queued messages to the current month's log file
    pub fn flush_log(&mut self) -> usize {
        match self.logbook.flush(Utc::now()) {
            Ok(written) => written,
            Err(e) => {
                tracing::warn!("Log flush failed: {}", e);
                0
            }
        }
    }

    /// Receive until `shutdown` resolves, then flush and hand the station back
    ///
    /// Each datagram is handled to completion before shutdown is checked again.
    pub async fn run<F>(mut self, socket: &UdpSocket, settings: &ReceiverSettings, shutdown: F) -> Self
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut buf = [0u8; MAX_DATAGRAM];
        let mut ticker = tokio::time::interval(settings.flush_interval);
        // Skip the first immediate tick
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    self.flush_log();
                }
                received = tokio::time::timeout(settings.receive_timeout, socket.recv_from(&mut buf)) => {
                    match received {
                        Ok(Ok((len, peer))) => {
                            tracing::trace!("{} bytes from {}", len, peer);
                            self.handle_datagram(&buf[..len]);
                        }
                        Ok(Err(e)) => tracing::warn!("Receive failed: {}", e),
                        Err(_) => tracing::debug!("No datagram in {:?}", settings.receive_timeout),
                    }
                }
            }
        }

        self.flush_log();
        tracing::info!("Receiver stopped: {}", self.store.stats());
        self
    }
}

/// Seconds `time` lies ahead of `head`, when that exceeds the warning threshold
fn forward_jump(head: Option<i64>, time: i64) -> Option<i64> {
    let gap = time.saturating_sub(head?);
    (gap > FORWARD_JUMP_WARN_SECS).then_some(gap)
}
