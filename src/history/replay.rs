//! Rebuilding history from logged samples
//!
//! The store is a pure function of its input sequence, so feeding the same
//! samples in the same order always reproduces the same arena.

use crate::history::calendar::Calendar;
use crate::history::store::{BucketStore, UpdateOutcome};
use crate::history::types::{Capacities, Observation};

/// Counts from a replay run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Samples that seeded or advanced the store
    pub accepted: usize,
    /// Stale or invalid samples that were dropped
    pub ignored: usize,
}

impl ReplayStats {
    fn record(&mut self, outcome: UpdateOutcome) {
        match outcome {
            UpdateOutcome::Initialized | UpdateOutcome::Accepted { .. } => self.accepted += 1,
            UpdateOutcome::Stale | UpdateOutcome::Invalid => self.ignored += 1,
        }
    }
}

/// Feed `samples` into an existing store, in order
pub fn replay<C, I>(store: &mut BucketStore<C>, samples: I) -> ReplayStats
where
    C: Calendar,
    I: IntoIterator<Item = Observation>,
{
    let mut stats = ReplayStats::default();
    for sample in samples {
        stats.record(store.update(sample));
    }

    tracing::debug!(
        "Replayed {} samples ({} ignored)",
        stats.accepted,
        stats.ignored
    );
    stats
}

/// Build a fresh store from `samples`
pub fn rebuild<C, I>(calendar: C, capacities: Capacities, samples: I) -> BucketStore<C>
where
    C: Calendar,
    I: IntoIterator<Item = Observation>,
{
    let mut store = BucketStore::with_calendar(calendar, capacities);
    replay(&mut store, samples);
    store
}
