//! Wall-clock lookups for bucketing
//!
//! Classification and year normalization depend on the local calendar, while
//! day/week/month normalization divides raw epoch seconds. Every timezone
//! lookup goes through [`Calendar`] so tests can pin an offset.

use chrono::{FixedOffset, Local, Offset, TimeZone, Timelike, Utc};

/// Local wall-clock view of epoch timestamps
pub trait Calendar {
    /// Local `(hour, minute)` of `epoch`, or `None` if it cannot be represented
    fn wall_clock(&self, epoch: i64) -> Option<(u32, u32)>;

    /// Epoch of 00:00 local time on the same local day as `epoch`
    fn local_midnight(&self, epoch: i64) -> Option<i64>;
}

/// [`Calendar`] backed by a chrono time zone
#[derive(Debug, Clone)]
pub struct ZonedCalendar<Tz: TimeZone> {
    tz: Tz,
}

/// Calendar following the process's local time zone
pub type LocalCalendar = ZonedCalendar<Local>;

/// Calendar pinned to a fixed UTC offset
pub type FixedCalendar = ZonedCalendar<FixedOffset>;

impl<Tz: TimeZone> ZonedCalendar<Tz> {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

impl LocalCalendar {
    pub fn local() -> Self {
        Self::new(Local)
    }
}

impl Default for LocalCalendar {
    fn default() -> Self {
        Self::local()
    }
}

impl FixedCalendar {
    /// Calendar at `offset_secs` east of UTC; `None` if out of range
    pub fn fixed(offset_secs: i32) -> Option<Self> {
        FixedOffset::east_opt(offset_secs).map(Self::new)
    }

    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }
}

impl<Tz: TimeZone> Calendar for ZonedCalendar<Tz> {
    fn wall_clock(&self, epoch: i64) -> Option<(u32, u32)> {
        let local = self.tz.timestamp_opt(epoch, 0).single()?;
        Some((local.hour(), local.minute()))
    }

    fn local_midnight(&self, epoch: i64) -> Option<i64> {
        let local = self.tz.timestamp_opt(epoch, 0).single()?;
        let midnight = local.date_naive().and_hms_opt(0, 0, 0)?;
        // A DST transition at midnight can make 00:00 ambiguous; take the first.
        self.tz
            .from_local_datetime(&midnight)
            .earliest()
            .map(|dt| dt.timestamp())
    }
}
