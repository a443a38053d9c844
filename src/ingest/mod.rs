//! The ingestion reconciliation loop.
//!
//! - `clock`: wall-clock source for day keys and retry timing
//! - `state`: per-day processed-file partitions with bounded retention
//! - `retry`: backoff bookkeeping for files whose processing failed
//! - `discovery`: listing candidate files in a day directory
//! - `worker`: the loop itself

pub mod clock;
pub mod discovery;
pub mod retry;
pub mod state;
pub mod worker;

pub use clock::{Clock, LocalClock, ManualClock};
pub use state::{FileOutcome, ProcessedFileSet};
pub use worker::{CycleReport, IngestEvent, IngestWorker, WorkerSettings};
