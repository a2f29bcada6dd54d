//! History error types
//!
//! Defines the errors that can occur around the bucket store: snapshot and
//! log file I/O, cache line parsing and granularity names.

use thiserror::Error;

/// Errors that can occur in the history layer
#[derive(Error, Debug)]
pub enum HistoryError {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A cache line did not hold nine well-formed fields
    #[error("Malformed cache line: {0}")]
    MalformedCacheLine(String),

    /// Snapshot slot count does not match the configured store layout
    #[error("Snapshot mismatch: expected {expected} slots, found {found}")]
    SnapshotMismatch { expected: usize, found: usize },

    /// Granularity name not one of day, week, month, year
    #[error("Unknown granularity: {0}")]
    UnknownGranularity(String),
}

/// Result type alias for history operations
pub type HistoryResult<T> = Result<T, HistoryError>;
