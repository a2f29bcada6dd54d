//! Multi-resolution weather history
//!
//! This module keeps a bounded summary of every observation ever received:
//!
//! - **types**: Observation, Granularity, Capacities and the bin spacing constants
//! - **calendar**: Wall-clock lookups, injectable for tests
//! - **region**: Named views over the store arena
//! - **store**: The cascading bucket store and its extractor
//! - **replay**: Deterministic rebuild from a sample stream
//! - **snapshot**: Cache file save/load
//! - **error**: Error types
//!
//! # Architecture
//!
//! ```text
//! Update Path:
//!   Observation → head + pending → day bins → week / month / year bins
//!
//! Read Path:
//!   extract(granularity) → valid prefix, newest first
//! ```
//!
//! # Example
//!
//! ```rust
//! use tempest_logger::history::{BucketStore, Capacities, FixedCalendar, Granularity, Observation};
//!
//! let mut store = BucketStore::with_calendar(FixedCalendar::utc(), Capacities::default());
//! for i in 0..100 {
//!     store.update(Observation::reading(1_718_150_400 + i * 60, 21.5, 48.0, 2.8));
//! }
//!
//! let day = store.extract(Granularity::Day);
//! assert!(!day.is_empty());
//! ```

pub mod calendar;
pub mod error;
pub mod region;
pub mod replay;
pub mod snapshot;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use calendar::{Calendar, FixedCalendar, LocalCalendar, ZonedCalendar};
pub use error::{HistoryError, HistoryResult};
pub use region::{Layout, Region};
pub use replay::{rebuild, replay, ReplayStats};
pub use store::{summarize, BucketStore, HistoryStats, UpdateOutcome};
pub use types::{
    Capacities, Granularity, Observation, DAY_COUNT, DAY_SAMPLE, MONTH_COUNT, MONTH_SAMPLE,
    WEEK_COUNT, WEEK_SAMPLE, YEAR_COUNT, YEAR_SAMPLE,
};
