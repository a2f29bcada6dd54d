//! Fixed-capacity cascading bucket store
//!
//! The store keeps a bounded summary of every observation it has seen, at
//! four resolutions:
//!
//! ```text
//!   sample ─► head (verbatim)
//!          └► pending ──(every DAY_SAMPLE)──► day bins
//!                                              ├─(minute 0/30)──────► week bins  (6 day bins)
//!                                              ├─(even hour)────────► month bins (24 day bins)
//!                                              └─(local midnight)───► year bins  (288 day bins)
//! ```
//!
//! Memory is allocated once, on the first valid observation, and never grows.

use crate::history::calendar::{Calendar, LocalCalendar};
use crate::history::error::{HistoryError, HistoryResult};
use crate::history::region::{Layout, HEAD, PENDING};
use crate::history::types::{Capacities, Granularity, Observation, DAY_SAMPLE};

/// What `update` did with a sample. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The sample seeded an empty store
    Initialized,
    /// The sample was folded in; `day_bins` new day bins were flushed
    Accepted { day_bins: usize },
    /// The sample was not newer than the head and was dropped
    Stale,
    /// The sample carried no readings and was dropped
    Invalid,
}

/// Combine the leading valid bins of `fine`, at most `width` of them
///
/// Stops at the first invalid bin; regions only ever hold a valid prefix.
pub fn summarize(fine: &[Observation], width: usize) -> Observation {
    fine.iter()
        .take(width)
        .take_while(|bin| bin.is_valid())
        .fold(Observation::invalid(), |mut acc, bin| {
            acc.combine(bin);
            acc
        })
}

/// Bounded multi-resolution history of observations
#[derive(Debug, Clone)]
pub struct BucketStore<C: Calendar = LocalCalendar> {
    calendar: C,
    layout: Layout,
    /// Empty until the first valid observation arrives
    slots: Vec<Observation>,
}

impl BucketStore<LocalCalendar> {
    /// Create an empty store with default capacities in the local time zone
    pub fn new() -> Self {
        Self::with_calendar(LocalCalendar::local(), Capacities::default())
    }
}

impl Default for BucketStore<LocalCalendar> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Calendar> BucketStore<C> {
    pub fn with_calendar(calendar: C, capacities: Capacities) -> Self {
        Self {
            calendar,
            layout: Layout::new(&capacities),
            slots: Vec::new(),
        }
    }

    /// Restore a store from a full arena, as written by the snapshot
    ///
    /// An empty `slots` gives an uninitialized store.
    pub fn from_slots(
        calendar: C,
        capacities: Capacities,
        slots: Vec<Observation>,
    ) -> HistoryResult<Self> {
        let mut store = Self::with_calendar(calendar, capacities);
        if !slots.is_empty() && slots.len() != store.layout.total() {
            return Err(HistoryError::SnapshotMismatch {
                expected: store.layout.total(),
                found: slots.len(),
            });
        }
        store.slots = slots;
        Ok(store)
    }

    pub fn calendar(&self) -> &C {
        &self.calendar
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn is_initialized(&self) -> bool {
        !self.slots.is_empty()
    }

    /// The most recent raw sample
    pub fn head(&self) -> Option<&Observation> {
        self.slots.get(HEAD)
    }

    /// Samples accepted since the last day bin was flushed
    pub fn pending(&self) -> Option<&Observation> {
        self.slots.get(PENDING)
    }

    /// The whole arena: head, pending, then day, week, month and year bins
    pub fn slots(&self) -> &[Observation] {
        &self.slots
    }

    /// Raw region contents, invalid tail included
    pub fn bins(&self, granularity: Granularity) -> &[Observation] {
        if !self.is_initialized() {
            return &[];
        }
        self.layout.region(granularity).bins(&self.slots)
    }

    /// Feed one observation into the store
    pub fn update(&mut self, sample: Observation) -> UpdateOutcome {
        if !sample.is_valid() {
            return UpdateOutcome::Invalid;
        }

        if !self.is_initialized() {
            self.initialize(sample);
            return UpdateOutcome::Initialized;
        }

        if sample.time <= self.slots[HEAD].time {
            tracing::trace!(
                "Dropping stale sample {} (head {})",
                sample.time,
                self.slots[HEAD].time
            );
            return UpdateOutcome::Stale;
        }

        self.slots[HEAD] = sample;
        self.slots[PENDING].combine(&sample);

        let day_bins = self.cascade();
        UpdateOutcome::Accepted { day_bins }
    }

    /// Allocate the arena and backfill bin times from the seed
    fn initialize(&mut self, seed: Observation) {
        let mut slots = vec![Observation::invalid(); self.layout.total()];
        slots[HEAD] = seed;
        slots[PENDING] = seed;

        for &granularity in Granularity::all() {
            let interval = granularity.interval();
            let region = self.layout.region(granularity);
            for (k, bin) in region.bins_mut(&mut slots).iter_mut().enumerate() {
                bin.time = seed.time.saturating_sub((k as i64).saturating_mul(interval));
            }
        }

        tracing::debug!("History initialized at {} ({} slots)", seed.time, slots.len());
        self.slots = slots;
    }

    /// Flush pending into day bins until it is within one DAY_SAMPLE of the
    /// newest day bin, promoting into coarser regions on boundaries.
    ///
    /// Returns the number of day bins inserted.
    fn cascade(&mut self) -> usize {
        let day = self.layout.day;
        let limit = self.catch_up_limit();
        let mut inserted: usize = 0;

        loop {
            let previous = self.slots[day.start()].time;
            let gap = self.slots[PENDING].time.saturating_sub(previous);
            if gap <= DAY_SAMPLE {
                break;
            }

            // Steps beyond the limit write bins that the last `limit` steps
            // overwrite anyway, so advance the newest day bin past them.
            let skip = gap / DAY_SAMPLE - limit;
            if skip > 0 {
                tracing::warn!(
                    "Catch-up of {} day bins after {}s gap, fast-forwarding {}",
                    gap / DAY_SAMPLE,
                    gap,
                    skip
                );
                self.slots[day.start()].time = previous.saturating_add(skip * DAY_SAMPLE);
                inserted = inserted.saturating_add(usize::try_from(skip).unwrap_or(usize::MAX));
                continue;
            }

            let mut bin = self.slots[PENDING];
            bin.normalize_time(Granularity::Day, &self.calendar);
            // Long outages advance one bin per iteration instead of jumping.
            if !(1..=DAY_SAMPLE).contains(&bin.time.saturating_sub(previous)) {
                bin.time = previous.saturating_add(DAY_SAMPLE);
            }

            day.evict_oldest_insert_newest(&mut self.slots, bin);
            inserted = inserted.saturating_add(1);

            let boundary = bin.classify(&self.calendar);
            for coarse in [Granularity::Year, Granularity::Month, Granularity::Week] {
                if boundary < coarse {
                    continue;
                }
                let summary = summarize(day.bins(&self.slots), coarse.day_bins_per_bin());
                tracing::trace!("Promoting {} bin at {}", coarse, bin.time);
                self.layout
                    .region(coarse)
                    .evict_oldest_insert_newest(&mut self.slots, summary);
            }
        }

        if inserted > 0 {
            self.slots[PENDING] = Observation::invalid();
        }

        inserted
    }

    /// Catch-up steps after which every region holds only carried-forward bins
    ///
    /// Twice the span of the longest coarse region covers uneven local days,
    /// plus enough day bins to refill the day region and one year summary.
    fn catch_up_limit(&self) -> i64 {
        let coarse = [Granularity::Week, Granularity::Month, Granularity::Year]
            .iter()
            .map(|&g| self.layout.region(g).len().saturating_mul(g.day_bins_per_bin()))
            .max()
            .unwrap_or(0);
        let limit = coarse
            .saturating_mul(2)
            .saturating_add(self.layout.day.len())
            .saturating_add(Granularity::Year.day_bins_per_bin());
        i64::try_from(limit).unwrap_or(i64::MAX)
    }

    /// Valid history at one granularity, newest first
    ///
    /// For `Day`, the first element carries the head's time so charts end at
    /// the current moment.
    pub fn extract(&self, granularity: Granularity) -> Vec<Observation> {
        let Some(head) = self.head() else {
            return Vec::new();
        };

        let mut bins: Vec<Observation> = self
            .bins(granularity)
            .iter()
            .take_while(|bin| bin.is_valid())
            .copied()
            .collect();

        if granularity == Granularity::Day {
            if let Some(first) = bins.first_mut() {
                first.time = head.time;
            }
        }

        bins
    }

    /// Get history statistics
    pub fn stats(&self) -> HistoryStats {
        let valid = |g: Granularity| self.bins(g).iter().take_while(|b| b.is_valid()).count();

        HistoryStats {
            head_time: self.head().map(|h| h.time),
            pending_samples: self.pending().map(|p| p.sample_count).unwrap_or(0),
            day_bins: valid(Granularity::Day),
            week_bins: valid(Granularity::Week),
            month_bins: valid(Granularity::Month),
            year_bins: valid(Granularity::Year),
        }
    }
}

/// History statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryStats {
    pub head_time: Option<i64>,
    pub pending_samples: u32,
    pub day_bins: usize,
    pub week_bins: usize,
    pub month_bins: usize,
    pub year_bins: usize,
}

impl std::fmt::Display for HistoryStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let head = self
            .head_time
            .and_then(|t| chrono::DateTime::from_timestamp(t, 0))
            .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
            .unwrap_or_else(|| "none".to_string());
        write!(
            f,
            "Head: {}, Pending: {}, Day: {}, Week: {}, Month: {}, Year: {}",
            head,
            self.pending_samples,
            self.day_bins,
            self.week_bins,
            self.month_bins,
            self.year_bins
        )
    }
}
