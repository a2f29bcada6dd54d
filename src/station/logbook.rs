//! Raw message log files
//!
//! Every received datagram is queued verbatim and appended to a monthly file
//! (`weatherflow-YYYY-MM.txt`, UTC) on each flush. The files are the durable
//! record; the history is rebuilt from them on startup.

use crate::history::{replay, BucketStore, Calendar, ReplayStats};
use crate::station::decoder::decode_observation;
use crate::station::error::StationResult;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const LOG_FILE_PATTERN: &str = r"^weatherflow-\d{4}-\d{2}\.txt$";

/// Name of the log file covering `now`
pub fn log_file_name(now: DateTime<Utc>) -> String {
    format!("weatherflow-{}.txt", now.format("%Y-%m"))
}

/// Queue of raw messages plus the directory they are flushed to
#[derive(Debug, Default)]
pub struct Logbook {
    dir: Option<PathBuf>,
    queue: Vec<String>,
}

impl Logbook {
    /// With `dir == None` messages are accepted and dropped on flush
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self {
            dir,
            queue: Vec::new(),
        }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Number of queued messages
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn record(&mut self, raw: &str) {
        let line = raw.trim_end();
        if !line.is_empty() {
            self.queue.push(line.to_string());
        }
    }

    /// Append queued messages to the month file for `now`
    ///
    /// Returns the number of lines written.
    pub fn flush(&mut self, now: DateTime<Utc>) -> StationResult<usize> {
        let Some(dir) = &self.dir else {
            self.queue.clear();
            return Ok(0);
        };
        if self.queue.is_empty() {
            return Ok(0);
        }

        fs::create_dir_all(dir)?;
        let path = dir.join(log_file_name(now));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = BufWriter::new(file);
        for line in &self.queue {
            writeln!(writer, "{}", line)?;
        }
        writer.flush()?;

        let written = self.queue.len();
        self.queue.clear();
        tracing::info!("Wrote {} messages to {:?}", written, path);
        Ok(written)
    }

    /// Log files in the directory, oldest month first
    pub fn log_files(&self) -> StationResult<Vec<PathBuf>> {
        let Some(dir) = &self.dir else {
            return Ok(Vec::new());
        };
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let re = Regex::new(LOG_FILE_PATTERN)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if re.is_match(&entry.file_name().to_string_lossy()) {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }

    /// Replay every log file into `store`
    ///
    /// Files last modified before the store head are skipped; their content
    /// is already part of the restored history.
    pub fn replay_into<C: Calendar>(&self, store: &mut BucketStore<C>) -> StationResult<ReplayStats> {
        let mut total = ReplayStats::default();

        for path in self.log_files()? {
            if let Some(head) = store.head().map(|h| h.time) {
                let modified: DateTime<Utc> = fs::metadata(&path)?.modified()?.into();
                if modified.timestamp() < head {
                    tracing::debug!("Skipping {:?}, older than history", path);
                    continue;
                }
            }

            tracing::info!("Reading {:?}", path);
            let content = fs::read_to_string(&path)?;
            let mut lines: Vec<&str> = content.lines().collect();
            lines.sort_unstable();

            let stats = replay(store, lines.into_iter().filter_map(decode_observation));
            total.accepted += stats.accepted;
            total.ignored += stats.ignored;
        }

        Ok(total)
    }
}
