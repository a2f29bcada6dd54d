//! Station error types

use crate::history::HistoryError;
use thiserror::Error;

/// Errors that can occur while receiving or logging
#[derive(Error, Debug)]
pub enum StationError {
    /// Socket or log file I/O failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// History operation failed
    #[error("History error: {0}")]
    History(#[from] HistoryError),
}

/// Result type alias for station operations
pub type StationResult<T> = Result<T, StationError>;
