//! Named regions over the store arena
//!
//! The store keeps every bin in one contiguous `Vec`. A [`Region`] is a
//! `(start, len)` view of that vector ordered newest-first; [`Layout`] places
//! the head slot, the pending slot and the four granularity regions.

use crate::history::types::{Capacities, Granularity, Observation};
use std::ops::Range;

/// Arena index of the most recent raw sample
pub const HEAD: usize = 0;
/// Arena index of the pending accumulator
pub const PENDING: usize = 1;

/// A fixed window of bins inside the arena, index 0 is the newest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    start: usize,
    len: usize,
}

impl Region {
    pub fn new(start: usize, len: usize) -> Self {
        Self { start, len }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.start + self.len
    }

    pub fn bins<'a>(&self, slots: &'a [Observation]) -> &'a [Observation] {
        &slots[self.range()]
    }

    pub fn bins_mut<'a>(&self, slots: &'a mut [Observation]) -> &'a mut [Observation] {
        &mut slots[self.range()]
    }

    /// Drop the oldest bin, shift the rest one slot back, put `bin` in front
    pub fn evict_oldest_insert_newest(&self, slots: &mut [Observation], bin: Observation) {
        let bins = self.bins_mut(slots);
        if bins.is_empty() {
            return;
        }
        bins.rotate_right(1);
        bins[0] = bin;
    }
}

/// Placement of every region inside the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub day: Region,
    pub week: Region,
    pub month: Region,
    pub year: Region,
}

impl Layout {
    pub fn new(capacities: &Capacities) -> Self {
        // The cascade compares against the newest day bin, so keep at least one.
        let day = Region::new(PENDING + 1, capacities.day_count.max(1));
        let week = Region::new(day.range().end, capacities.week_count);
        let month = Region::new(week.range().end, capacities.month_count);
        let year = Region::new(month.range().end, capacities.year_count);
        Self {
            day,
            week,
            month,
            year,
        }
    }

    pub fn region(&self, granularity: Granularity) -> Region {
        match granularity {
            Granularity::Day => self.day,
            Granularity::Week => self.week,
            Granularity::Month => self.month,
            Granularity::Year => self.year,
        }
    }

    /// Total number of arena slots, head and pending included
    pub fn total(&self) -> usize {
        self.year.range().end
    }
}
