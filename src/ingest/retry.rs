//! Exponential backoff for files whose processing failed.

use crate::config::RetryConfig;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// What to do with a file after a transient failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again once the clock reaches `at`.
    RetryAt {
        /// Earliest time of the next attempt.
        at: NaiveDateTime,
        /// Failures so far, including this one.
        attempts: u32,
    },
    /// Attempts exhausted.
    GiveUp {
        /// Failures recorded before giving up.
        attempts: u32,
    },
}

#[derive(Debug, Clone)]
struct RetryEntry {
    day: NaiveDate,
    attempts: u32,
    next_attempt: NaiveDateTime,
}

/// Failure counts and next-attempt times for files that are not yet settled.
#[derive(Debug)]
pub struct RetryTracker {
    max_attempts: u32,
    base_backoff: Duration,
    max_backoff: Duration,
    entries: HashMap<PathBuf, RetryEntry>,
}

impl RetryTracker {
    /// Tracker with no entries. `max_attempts` is clamped to at least one.
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_backoff: config.base_backoff,
            max_backoff: config.max_backoff,
            entries: HashMap::new(),
        }
    }

    /// Delay before the attempt following failure number `attempts`.
    pub fn backoff(&self, attempts: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempts.saturating_sub(1));
        self.base_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// Whether `path` may be attempted at `now`.
    pub fn is_due(&self, path: &Path, now: NaiveDateTime) -> bool {
        self.entries
            .get(path)
            .map_or(true, |entry| now >= entry.next_attempt)
    }

    /// Failures recorded so far for `path`.
    pub fn attempts(&self, path: &Path) -> u32 {
        self.entries.get(path).map_or(0, |entry| entry.attempts)
    }

    /// Records one more failure and decides whether to keep trying.
    pub fn record_failure(
        &mut self,
        day: NaiveDate,
        path: &Path,
        now: NaiveDateTime,
    ) -> RetryDecision {
        let attempts = self.attempts(path) + 1;
        if attempts >= self.max_attempts {
            self.entries.remove(path);
            return RetryDecision::GiveUp { attempts };
        }

        let delay = chrono::Duration::from_std(self.backoff(attempts))
            .unwrap_or(chrono::Duration::MAX);
        let at = now.checked_add_signed(delay).unwrap_or(NaiveDateTime::MAX);
        self.entries.insert(
            path.to_path_buf(),
            RetryEntry {
                day,
                attempts,
                next_attempt: at,
            },
        );
        RetryDecision::RetryAt { at, attempts }
    }

    /// Forgets `path`, typically after it succeeded.
    pub fn clear(&mut self, path: &Path) {
        self.entries.remove(path);
    }

    /// Drops entries recorded under days for which `keep` is false.
    pub fn prune<F: Fn(NaiveDate) -> bool>(&mut self, keep: F) {
        self.entries.retain(|_, entry| keep(entry.day));
    }

    /// Whether a file recorded under `day` is still waiting for a retry.
    pub fn has_pending(&self, day: NaiveDate) -> bool {
        self.entries.values().any(|entry| entry.day == day)
    }

    /// Number of files waiting for a retry.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is waiting for a retry.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
