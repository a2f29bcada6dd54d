//! Snapshot cache of the store arena
//!
//! One cache line per slot, in arena order. Saving goes through a temporary
//! file and a rename so a crash never leaves a half-written cache behind.

use crate::history::calendar::Calendar;
use crate::history::error::HistoryResult;
use crate::history::store::BucketStore;
use crate::history::types::{Capacities, Observation};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Snapshot file name inside the cache directory
pub const SNAPSHOT_FILE: &str = "weatherflow-cache.txt";

/// Write every slot of `store` to `path`
pub fn save<C: Calendar>(store: &BucketStore<C>, path: impl AsRef<Path>) -> HistoryResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("tmp");
    {
        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        for slot in store.slots() {
            writeln!(writer, "{}", slot)?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }
    fs::rename(&tmp_path, path)?;

    tracing::debug!("Saved {} slots to {:?}", store.slots().len(), path);
    Ok(())
}

/// Restore a store from `path`
///
/// Blank lines are skipped. The slot count must match `capacities` exactly.
pub fn load<C: Calendar>(
    calendar: C,
    capacities: Capacities,
    path: impl AsRef<Path>,
) -> HistoryResult<BucketStore<C>> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);

    let mut slots = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        slots.push(line.parse::<Observation>()?);
    }

    tracing::debug!("Loaded {} slots from {:?}", slots.len(), path);
    BucketStore::from_slots(calendar, capacities, slots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::calendar::FixedCalendar;
    use crate::history::error::HistoryError;
    use crate::history::replay::rebuild;
    use crate::history::types::Granularity;
    use tempfile::tempdir;

    fn populated(capacities: Capacities) -> BucketStore<FixedCalendar> {
        let start = 1_718_150_400 + 13;
        let samples = (0..1500).map(|i: i64| {
            Observation::reading(start + i * 59, 21.0 + (i % 9) as f64 * 0.17, 48.5, 2.79)
        });
        rebuild(FixedCalendar::utc(), capacities, samples)
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SNAPSHOT_FILE);

        let store = populated(Capacities::default());
        save(&store, &path).unwrap();

        let restored = load(FixedCalendar::utc(), Capacities::default(), &path).unwrap();
        assert_eq!(restored.slots(), store.slots());
        assert_eq!(
            restored.extract(Granularity::Week),
            store.extract(Granularity::Week)
        );
        assert!(!dir.path().join("weatherflow-cache.tmp").exists());
    }

    #[test]
    fn test_restored_store_keeps_running() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SNAPSHOT_FILE);

        let mut online = populated(Capacities::default());
        save(&online, &path).unwrap();
        let mut restored = load(FixedCalendar::utc(), Capacities::default(), &path).unwrap();

        let next = online.head().unwrap().time;
        for i in 1..400 {
            let sample = Observation::reading(next + i * 59, 19.0, 50.0, 2.8);
            online.update(sample);
            restored.update(sample);
        }
        assert_eq!(restored.slots(), online.slots());
    }

    #[test]
    fn test_uninitialized_store_writes_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join(SNAPSHOT_FILE);

        let store = BucketStore::with_calendar(FixedCalendar::utc(), Capacities::default());
        save(&store, &path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");

        let restored = load(FixedCalendar::utc(), Capacities::default(), &path).unwrap();
        assert!(!restored.is_initialized());
    }

    #[test]
    fn test_wrong_capacities_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SNAPSHOT_FILE);

        save(&populated(Capacities::new(10, 10, 10, 10)), &path).unwrap();

        let result = load(FixedCalendar::utc(), Capacities::default(), &path);
        assert!(matches!(
            result,
            Err(HistoryError::SnapshotMismatch {
                expected: 2534,
                found: 42
            })
        ));
    }

    #[test]
    fn test_malformed_line_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SNAPSHOT_FILE);
        fs::write(&path, "1718150400\t20\t20\n").unwrap();

        let result = load(FixedCalendar::utc(), Capacities::default(), &path);
        assert!(matches!(result, Err(HistoryError::MalformedCacheLine(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let result = load(
            FixedCalendar::utc(),
            Capacities::default(),
            dir.path().join(SNAPSHOT_FILE),
        );
        assert!(matches!(result, Err(HistoryError::Io(_))));
    }
}
