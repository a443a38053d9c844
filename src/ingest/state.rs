//! Processed-file state partitioned by calendar day.
//!
//! Each day key owns its own set of file paths. Partitions are created
//! lazily when a day is first seen and the oldest ones are evicted once more
//! than `retention` days are held, so memory stays bounded while the
//! previous day's partition survives the midnight rollover.
//!
//! Nothing here is persisted; a restart starts from empty state.

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Why a file is excluded from dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// Converted and acknowledged by the sink (or decoded to nothing).
    Processed,
    /// Given up on for the rest of the day.
    Quarantined,
}

/// Per-day record of files that must not be dispatched again.
#[derive(Debug)]
pub struct ProcessedFileSet {
    retention: usize,
    active: Option<NaiveDate>,
    days: BTreeMap<NaiveDate, HashMap<PathBuf, FileOutcome>>,
}

impl ProcessedFileSet {
    /// `retention` is clamped to at least one day.
    pub fn new(retention: usize) -> Self {
        Self {
            retention: retention.max(1),
            active: None,
            days: BTreeMap::new(),
        }
    }

    /// Day of the most recent `rotate`.
    pub fn active_day(&self) -> Option<NaiveDate> {
        self.active
    }

    /// Makes `day` the active partition.
    ///
    /// Returns the previously active day when the day changed. The first
    /// call after construction returns `None`.
    pub fn rotate(&mut self, day: NaiveDate) -> Option<NaiveDate> {
        let previous = self.active.replace(day);
        self.days.entry(day).or_default();
        self.evict();
        previous.filter(|prev| *prev != day)
    }

    fn evict(&mut self) {
        while self.days.len() > self.retention {
            let oldest = self
                .days
                .keys()
                .copied()
                .find(|d| Some(*d) != self.active);
            match oldest {
                Some(day) => {
                    self.days.remove(&day);
                }
                None => break,
            }
        }
    }

    /// Whether `path` is excluded from dispatch under `day`.
    pub fn contains(&self, day: NaiveDate, path: &Path) -> bool {
        self.outcome(day, path).is_some()
    }

    /// How `path` was settled under `day`, if it was.
    pub fn outcome(&self, day: NaiveDate, path: &Path) -> Option<FileOutcome> {
        self.days.get(&day).and_then(|files| files.get(path)).copied()
    }

    /// Records a file the sink acknowledged or that decoded to nothing.
    pub fn mark_processed(&mut self, day: NaiveDate, path: &Path) {
        self.insert(day, path, FileOutcome::Processed);
    }

    /// Records a file given up on for the rest of `day`.
    pub fn mark_quarantined(&mut self, day: NaiveDate, path: &Path) {
        self.insert(day, path, FileOutcome::Quarantined);
    }

    fn insert(&mut self, day: NaiveDate, path: &Path, outcome: FileOutcome) {
        self.days
            .entry(day)
            .or_default()
            .insert(path.to_path_buf(), outcome);
        self.evict();
    }

    /// Whether the partition for `day` is still held.
    pub fn is_retained(&self, day: NaiveDate) -> bool {
        self.days.contains_key(&day)
    }

    /// Retained day keys, oldest first.
    pub fn retained_days(&self) -> Vec<NaiveDate> {
        self.days.keys().copied().collect()
    }

    /// Number of files recorded under `day`.
    pub fn len(&self, day: NaiveDate) -> usize {
        self.days.get(&day).map_or(0, HashMap::len)
    }

    /// True when no retained day has any file recorded.
    pub fn is_empty(&self) -> bool {
        self.days.values().all(HashMap::is_empty)
    }
}
