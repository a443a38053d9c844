//! Wall-clock sources.

use chrono::{Local, NaiveDate, NaiveDateTime};
use std::sync::Mutex;
use std::time::Duration;

/// Local wall-clock time as seen by the worker.
pub trait Clock: Send + Sync {
    /// Current local date and time.
    fn now(&self) -> NaiveDateTime;

    /// Calendar day of `now`.
    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// The system's local time.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    /// Clock frozen at `at`.
    pub fn new(at: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(at),
        }
    }

    /// Jumps to `at`, forwards or backwards.
    pub fn set(&self, at: NaiveDateTime) {
        *self.now.lock().unwrap_or_else(|p| p.into_inner()) = at;
    }

    /// Moves forward by `by`, saturating at the maximum date.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|p| p.into_inner());
        let delta = chrono::Duration::from_std(by).unwrap_or(chrono::Duration::MAX);
        *now = now.checked_add_signed(delta).unwrap_or(NaiveDateTime::MAX);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}
