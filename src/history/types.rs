//! Core data types for the multi-resolution history
//!
//! This module defines the value types the bucket store is built from:
//! - `Observation`: one averaged reading with min/max/count metadata
//! - `Granularity`: the four fixed resolutions and their spacing
//! - `Capacities`: how many bins each resolution keeps

use crate::history::calendar::Calendar;
use crate::history::error::{HistoryError, HistoryResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Day bin spacing: one bin every 5 minutes
pub const DAY_SAMPLE: i64 = 5 * 60;
/// Week bin spacing: one bin every 30 minutes
pub const WEEK_SAMPLE: i64 = 30 * 60;
/// Month bin spacing: one bin every 2 hours
pub const MONTH_SAMPLE: i64 = 2 * 60 * 60;
/// Year bin spacing: one bin every 24 hours
pub const YEAR_SAMPLE: i64 = 24 * 60 * 60;

/// 600 day bins is 50 hours
pub const DAY_COUNT: usize = 600;
/// 600 week bins is 12.5 days
pub const WEEK_COUNT: usize = 600;
/// 600 month bins is 50 days
pub const MONTH_COUNT: usize = 600;
/// One bin per day, two leap years
pub const YEAR_COUNT: usize = 2 * 366;

/// One weather reading, or the running average of several
///
/// `sample_count == 0` marks a placeholder that never contributes to merges
/// or queries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Observation {
    /// Unix timestamp in seconds
    pub time: i64,
    /// Degrees Celsius
    pub temperature: f64,
    pub temperature_min: f64,
    pub temperature_max: f64,
    /// Relative humidity, percent
    pub humidity: f64,
    pub humidity_min: f64,
    pub humidity_max: f64,
    /// Battery volts; the minimum is kept when merging
    pub battery: f64,
    /// Number of raw readings folded into this record
    pub sample_count: u32,
}

impl Observation {
    /// Create a placeholder record
    pub fn invalid() -> Self {
        Self {
            time: 0,
            temperature: 0.0,
            temperature_min: f64::INFINITY,
            temperature_max: f64::NEG_INFINITY,
            humidity: 0.0,
            humidity_min: f64::INFINITY,
            humidity_max: f64::NEG_INFINITY,
            battery: f64::INFINITY,
            sample_count: 0,
        }
    }

    /// Create a record from a single raw reading
    pub fn reading(time: i64, temperature: f64, humidity: f64, battery: f64) -> Self {
        Self {
            time,
            temperature,
            temperature_min: temperature,
            temperature_max: temperature,
            humidity,
            humidity_min: humidity,
            humidity_max: humidity,
            battery,
            sample_count: 1,
        }
    }

    /// Builder method: set the sample count
    pub fn sample_count(mut self, sample_count: u32) -> Self {
        self.sample_count = sample_count;
        self
    }

    pub fn is_valid(&self) -> bool {
        self.sample_count > 0
    }

    /// Fold `other` into this record as a count-weighted average
    ///
    /// Does nothing if `other` is invalid. The averaged current value is
    /// folded into the extremes because it can fall outside the old ones.
    pub fn combine(&mut self, other: &Observation) {
        if !other.is_valid() {
            return;
        }
        if !self.is_valid() {
            *self = *other;
            return;
        }

        let mine = f64::from(self.sample_count);
        let theirs = f64::from(other.sample_count);
        let total = mine + theirs;

        self.time = self.time.max(other.time);

        self.temperature = (self.temperature * mine + other.temperature * theirs) / total;
        self.temperature_min = self
            .temperature
            .min(self.temperature_min)
            .min(other.temperature_min);
        self.temperature_max = self
            .temperature
            .max(self.temperature_max)
            .max(other.temperature_max);

        self.humidity = (self.humidity * mine + other.humidity * theirs) / total;
        self.humidity_min = self.humidity.min(self.humidity_min).min(other.humidity_min);
        self.humidity_max = self.humidity.max(self.humidity_max).max(other.humidity_max);

        self.battery = self.battery.min(other.battery);
        self.sample_count += other.sample_count;
    }

    /// Snap `time` onto the bin grid of `granularity`
    ///
    /// Day, week and month divide raw epoch seconds (timezone-agnostic); year
    /// snaps to local midnight through `calendar`.
    pub fn normalize_time<C: Calendar + ?Sized>(&mut self, granularity: Granularity, calendar: &C) {
        match granularity {
            Granularity::Day | Granularity::Week | Granularity::Month => {
                let interval = granularity.interval();
                self.time = self.time.saturating_sub(self.time.rem_euclid(interval));
            }
            Granularity::Year => {
                if let Some(midnight) = calendar.local_midnight(self.time) {
                    self.time = midnight;
                }
            }
        }
    }

    /// Finest granularity boundary this timestamp falls on, by local time
    pub fn classify<C: Calendar + ?Sized>(&self, calendar: &C) -> Granularity {
        match calendar.wall_clock(self.time) {
            Some((0, 0)) => Granularity::Year,
            Some((hour, 0)) if hour % 2 == 0 => Granularity::Month,
            Some((_, 0)) | Some((_, 30)) => Granularity::Week,
            _ => Granularity::Day,
        }
    }
}

impl Default for Observation {
    fn default() -> Self {
        Self::invalid()
    }
}

/// Cache line: nine tab-separated fields in fixed order
impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.time,
            self.temperature,
            self.temperature_min,
            self.temperature_max,
            self.humidity,
            self.humidity_min,
            self.humidity_max,
            self.battery,
            self.sample_count
        )
    }
}

impl FromStr for Observation {
    type Err = HistoryError;

    fn from_str(line: &str) -> HistoryResult<Self> {
        let fields: Vec<&str> = line.split_ascii_whitespace().collect();
        if fields.len() != 9 {
            return Err(HistoryError::MalformedCacheLine(format!(
                "expected 9 fields, found {}",
                fields.len()
            )));
        }

        let float = |idx: usize| -> HistoryResult<f64> {
            fields[idx].parse().map_err(|_| {
                HistoryError::MalformedCacheLine(format!(
                    "field {} is not a number: {:?}",
                    idx, fields[idx]
                ))
            })
        };

        Ok(Self {
            time: fields[0].parse().map_err(|_| {
                HistoryError::MalformedCacheLine(format!("bad time: {:?}", fields[0]))
            })?,
            temperature: float(1)?,
            temperature_min: float(2)?,
            temperature_max: float(3)?,
            humidity: float(4)?,
            humidity_min: float(5)?,
            humidity_max: float(6)?,
            battery: float(7)?,
            sample_count: fields[8].parse().map_err(|_| {
                HistoryError::MalformedCacheLine(format!("bad sample count: {:?}", fields[8]))
            })?,
        })
    }
}

/// One of the four fixed history resolutions, finest first
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Week,
    Month,
    Year,
}

impl Granularity {
    pub fn all() -> &'static [Granularity] {
        &[
            Granularity::Day,
            Granularity::Week,
            Granularity::Month,
            Granularity::Year,
        ]
    }

    /// Nominal spacing between bins, in seconds
    pub fn interval(&self) -> i64 {
        match self {
            Granularity::Day => DAY_SAMPLE,
            Granularity::Week => WEEK_SAMPLE,
            Granularity::Month => MONTH_SAMPLE,
            Granularity::Year => YEAR_SAMPLE,
        }
    }

    /// How many day bins one bin of this granularity summarizes
    pub fn day_bins_per_bin(&self) -> usize {
        (self.interval() / DAY_SAMPLE) as usize
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::Day => write!(f, "day"),
            Granularity::Week => write!(f, "week"),
            Granularity::Month => write!(f, "month"),
            Granularity::Year => write!(f, "year"),
        }
    }
}

impl FromStr for Granularity {
    type Err = HistoryError;

    fn from_str(s: &str) -> HistoryResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "day" => Ok(Granularity::Day),
            "week" => Ok(Granularity::Week),
            "month" => Ok(Granularity::Month),
            "year" => Ok(Granularity::Year),
            _ => Err(HistoryError::UnknownGranularity(s.to_string())),
        }
    }
}

/// Number of bins kept per granularity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Capacities {
    #[serde(default = "default_day_count")]
    pub day_count: usize,

    #[serde(default = "default_week_count")]
    pub week_count: usize,

    #[serde(default = "default_month_count")]
    pub month_count: usize,

    #[serde(default = "default_year_count")]
    pub year_count: usize,
}

fn default_day_count() -> usize {
    DAY_COUNT
}

fn default_week_count() -> usize {
    WEEK_COUNT
}

fn default_month_count() -> usize {
    MONTH_COUNT
}

fn default_year_count() -> usize {
    YEAR_COUNT
}

impl Default for Capacities {
    fn default() -> Self {
        Self {
            day_count: DAY_COUNT,
            week_count: WEEK_COUNT,
            month_count: MONTH_COUNT,
            year_count: YEAR_COUNT,
        }
    }
}

impl Capacities {
    pub fn new(day_count: usize, week_count: usize, month_count: usize, year_count: usize) -> Self {
        Self {
            day_count,
            week_count,
            month_count,
            year_count,
        }
    }

    pub fn count(&self, granularity: Granularity) -> usize {
        match granularity {
            Granularity::Day => self.day_count,
            Granularity::Week => self.week_count,
            Granularity::Month => self.month_count,
            Granularity::Year => self.year_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::calendar::FixedCalendar;
    use approx::assert_relative_eq;

    // 2024-06-12 00:00:00 UTC
    const MIDNIGHT: i64 = 1_718_150_400;

    #[test]
    fn test_invalid_observation() {
        let obs = Observation::invalid();
        assert!(!obs.is_valid());
        assert_eq!(obs.temperature_min, f64::INFINITY);
        assert_eq!(obs.temperature_max, f64::NEG_INFINITY);
        assert_eq!(Observation::default(), obs);
    }

    #[test]
    fn test_reading() {
        let obs = Observation::reading(1000, 14.58, 60.34, 2.805);
        assert!(obs.is_valid());
        assert_eq!(obs.sample_count, 1);
        assert_eq!(obs.temperature_min, 14.58);
        assert_eq!(obs.temperature_max, 14.58);
        assert_eq!(obs.humidity_min, 60.34);
        assert_eq!(obs.humidity_max, 60.34);
    }

    #[test]
    fn test_combine_weighted_mean() {
        let mut a = Observation::reading(1000, 10.0, 40.0, 2.7).sample_count(3);
        let b = Observation::reading(1060, 20.0, 60.0, 2.6);

        a.combine(&b);

        assert_eq!(a.sample_count, 4);
        assert_eq!(a.time, 1060);
        assert_relative_eq!(a.temperature, 12.5);
        assert_relative_eq!(a.humidity, 45.0);
        assert_eq!(a.temperature_min, 10.0);
        assert_eq!(a.temperature_max, 20.0);
        assert_eq!(a.battery, 2.6);
    }

    #[test]
    fn test_combine_keeps_newest_time() {
        let mut a = Observation::reading(2000, 10.0, 40.0, 2.7);
        a.combine(&Observation::reading(1000, 12.0, 40.0, 2.7));
        assert_eq!(a.time, 2000);
    }

    #[test]
    fn test_combine_ignores_invalid() {
        let mut a = Observation::reading(1000, 10.0, 40.0, 2.7);
        let before = a;
        a.combine(&Observation::invalid());
        assert_eq!(a, before);
    }

    #[test]
    fn test_combine_into_invalid_accumulator() {
        let mut acc = Observation::invalid();
        acc.combine(&Observation::reading(1000, 10.0, 40.0, 2.7));
        acc.combine(&Observation::reading(1300, 14.0, 50.0, 2.8));

        assert_eq!(acc.sample_count, 2);
        assert_eq!(acc.time, 1300);
        assert_relative_eq!(acc.temperature, 12.0);
        assert_eq!(acc.temperature_min, 10.0);
        assert_eq!(acc.temperature_max, 14.0);
        assert_eq!(acc.battery, 2.7);

        let mut acc = Observation::invalid();
        acc.combine(&Observation::reading(-5000, 10.0, 40.0, 2.7));
        assert_eq!(acc.time, -5000);
    }

    #[test]
    fn test_normalize_time_at_extremes() {
        let calendar = FixedCalendar::utc();

        let mut obs = Observation::reading(i64::MIN + 3, 0.0, 0.0, 0.0);
        obs.normalize_time(Granularity::Day, &calendar);
        assert_eq!(obs.time, i64::MIN);

        let mut obs = Observation::reading(i64::MAX, 0.0, 0.0, 0.0);
        obs.normalize_time(Granularity::Month, &calendar);
        assert!(i64::MAX - obs.time < 7200);

        let mut obs = Observation::reading(i64::MAX, 0.0, 0.0, 0.0);
        obs.normalize_time(Granularity::Year, &calendar);
        assert_eq!(obs.time, i64::MAX);
        assert_eq!(obs.classify(&calendar), Granularity::Day);
    }

    #[test]
    fn test_normalize_time() {
        let calendar = FixedCalendar::utc();
        let base = MIDNIGHT + 3 * 3600 + 47 * 60 + 13;

        let mut obs = Observation::reading(base, 0.0, 0.0, 0.0);
        obs.normalize_time(Granularity::Day, &calendar);
        assert_eq!(obs.time, MIDNIGHT + 3 * 3600 + 45 * 60);

        let mut obs = Observation::reading(base, 0.0, 0.0, 0.0);
        obs.normalize_time(Granularity::Week, &calendar);
        assert_eq!(obs.time, MIDNIGHT + 3 * 3600 + 30 * 60);

        let mut obs = Observation::reading(base, 0.0, 0.0, 0.0);
        obs.normalize_time(Granularity::Month, &calendar);
        assert_eq!(obs.time, MIDNIGHT + 2 * 3600);

        let mut obs = Observation::reading(base, 0.0, 0.0, 0.0);
        obs.normalize_time(Granularity::Year, &calendar);
        assert_eq!(obs.time, MIDNIGHT);
    }

    #[test]
    fn test_normalize_year_is_timezone_aware() {
        // Day bins stay on the raw epoch grid, year snaps to local midnight.
        let calendar = FixedCalendar::fixed(-5 * 3600).unwrap();
        let noon_utc = MIDNIGHT + 12 * 3600;

        let mut obs = Observation::reading(noon_utc + 17, 0.0, 0.0, 0.0);
        obs.normalize_time(Granularity::Day, &calendar);
        assert_eq!(obs.time, noon_utc);

        let mut obs = Observation::reading(noon_utc, 0.0, 0.0, 0.0);
        obs.normalize_time(Granularity::Year, &calendar);
        assert_eq!(obs.time, MIDNIGHT + 5 * 3600);
    }

    #[test]
    fn test_classify() {
        let calendar = FixedCalendar::utc();
        let at = |secs: i64| Observation::reading(MIDNIGHT + secs, 0.0, 0.0, 0.0);

        assert_eq!(at(0).classify(&calendar), Granularity::Year);
        assert_eq!(at(2 * 3600).classify(&calendar), Granularity::Month);
        assert_eq!(at(3600).classify(&calendar), Granularity::Week);
        assert_eq!(at(3600 + 30 * 60).classify(&calendar), Granularity::Week);
        assert_eq!(at(2 * 3600 + 30 * 60).classify(&calendar), Granularity::Week);
        assert_eq!(at(5 * 60).classify(&calendar), Granularity::Day);
        assert_eq!(at(23 * 3600 + 55 * 60).classify(&calendar), Granularity::Day);
    }

    #[test]
    fn test_classify_uses_local_time() {
        // 00:00 UTC is 19:00 in UTC-5: odd hour, so only a week boundary
        let calendar = FixedCalendar::fixed(-5 * 3600).unwrap();
        let obs = Observation::reading(MIDNIGHT, 0.0, 0.0, 0.0);
        assert_eq!(obs.classify(&calendar), Granularity::Week);

        let local_midnight = Observation::reading(MIDNIGHT + 5 * 3600, 0.0, 0.0, 0.0);
        assert_eq!(local_midnight.classify(&calendar), Granularity::Year);
    }

    #[test]
    fn test_cache_line_format() {
        let obs = Observation::reading(1_718_217_086, 14.58, 60.34, 2.805).sample_count(1);
        assert_eq!(
            obs.to_string(),
            "1718217086\t14.58\t14.58\t14.58\t60.34\t60.34\t60.34\t2.805\t1"
        );
    }

    #[test]
    fn test_cache_line_round_trip() {
        let mut obs = Observation::reading(1_718_217_086, 14.58, 60.34, 2.805);
        obs.combine(&Observation::reading(1_718_217_146, 14.61, 60.1, 2.803));
        obs.combine(&Observation::reading(1_718_217_206, 14.7, 59.87, 2.81));

        let restored: Observation = obs.to_string().parse().unwrap();
        assert_eq!(restored, obs);
    }

    #[test]
    fn test_cache_line_invalid_round_trip() {
        let obs = Observation::invalid();
        let restored: Observation = obs.to_string().parse().unwrap();
        assert_eq!(restored, obs);
    }

    #[test]
    fn test_cache_line_accepts_spaces() {
        let obs: Observation = "100 1.5 1 2 50 49 51 2.7 4".parse().unwrap();
        assert_eq!(obs.time, 100);
        assert_eq!(obs.sample_count, 4);
        assert_eq!(obs.humidity_max, 51.0);
    }

    #[test]
    fn test_cache_line_rejects_malformed() {
        assert!(matches!(
            "100\t1.5\t1".parse::<Observation>(),
            Err(HistoryError::MalformedCacheLine(_))
        ));
        assert!(matches!(
            "100\t1.5\t1\t2\t50\t49\t51\t2.7\tmany".parse::<Observation>(),
            Err(HistoryError::MalformedCacheLine(_))
        ));
        assert!(matches!(
            "".parse::<Observation>(),
            Err(HistoryError::MalformedCacheLine(_))
        ));
    }

    #[test]
    fn test_granularity_parse() {
        assert_eq!("day".parse::<Granularity>().unwrap(), Granularity::Day);
        assert_eq!("Year".parse::<Granularity>().unwrap(), Granularity::Year);
        assert!("decade".parse::<Granularity>().is_err());

        for g in Granularity::all() {
            assert_eq!(g.to_string().parse::<Granularity>().unwrap(), *g);
        }
    }

    #[test]
    fn test_day_bins_per_bin() {
        assert_eq!(Granularity::Day.day_bins_per_bin(), 1);
        assert_eq!(Granularity::Week.day_bins_per_bin(), 6);
        assert_eq!(Granularity::Month.day_bins_per_bin(), 24);
        assert_eq!(Granularity::Year.day_bins_per_bin(), 288);
    }
}
