//! Reconciliation loop: discover new measurement files for the current day
//! and drive each through read -> build -> serialize -> sink.
//!
//! # Architecture
//!
//! ```text
//! every poll_interval:
//!   clock.today() ──► ProcessedFileSet::rotate ──► (day changed? catch up previous day)
//!        │
//!        ▼
//!   <root>/<day>/*.<ext> ──► not processed? due for retry? settled?
//!        │
//!        ▼
//!   read ──► RecordBuilder (blocking task) ──► RecordSink::persist ──► mark processed
//! ```
//!
//! The worker is the single owner of its state; nothing is shared, so no
//! locking is involved. Files within a cycle are handled one at a time in
//! path order. A file is marked processed only after the sink acknowledges
//! it. Failures never escape a file: transient ones are retried with
//! backoff, permanent ones quarantine the file for the rest of the day.
//!
//! Cancellation is observed before each file and during the inter-cycle
//! sleep; a file already in flight runs to completion.

use super::clock::{Clock, LocalClock};
use super::discovery;
use super::retry::{RetryDecision, RetryTracker};
use super::state::ProcessedFileSet;
use crate::builder::RecordBuilder;
use crate::config::{IngestConfig, RetryConfig};
use crate::decoder::ReaderRegistry;
use crate::error::{DiscoveryError, IngestError, IngestResult};
use crate::serializer;
use crate::sink::{self, FileIdentifier, RecordSink};
use chrono::{NaiveDate, NaiveDateTime};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, info_span, warn, Instrument};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Loop parameters taken from the `[watch]` section.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Directory holding one subdirectory per day.
    pub root_dir: PathBuf,
    /// Lowercase, without the leading dot.
    pub extension: String,
    /// strftime pattern naming day directories.
    pub day_format: String,
    /// Pause between cycles.
    pub poll_interval: Duration,
    /// Minimum age since last modification before a file is read.
    pub settle_time: Duration,
    /// Day partitions of processed-file state kept.
    pub retention_days: usize,
    /// Sweep the previous day after midnight until it has nothing outstanding.
    pub catch_up_previous_day: bool,
}

impl WorkerSettings {
    /// Settings from a validated configuration.
    pub fn from_config(config: &IngestConfig) -> Self {
        Self {
            root_dir: config.watch.root_dir.clone(),
            extension: config.normalized_extension(),
            day_format: config.watch.day_format.clone(),
            poll_interval: config.watch.poll_interval,
            settle_time: config.watch.settle_time,
            retention_days: config.watch.retention_days,
            catch_up_previous_day: config.watch.catch_up_previous_day,
        }
    }

    /// Directory scanned for `day`.
    pub fn day_directory(&self, day: NaiveDate) -> Result<PathBuf, DiscoveryError> {
        discovery::day_directory(&self.root_dir, day, &self.day_format)
    }
}

/// Notifications for external observers.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestEvent {
    /// Converted and persisted.
    Processed {
        /// Measurement file.
        path: PathBuf,
        /// Day partition the file belongs to.
        day: NaiveDate,
        /// Channels in the emitted record.
        channels: usize,
    },
    /// Decoded to nothing worth emitting; marked processed without a sink call.
    Skipped {
        /// Measurement file.
        path: PathBuf,
        /// Day partition the file belongs to.
        day: NaiveDate,
    },
    /// Transient failure; the file will be retried at `retry_at`.
    Failed {
        /// Measurement file.
        path: PathBuf,
        /// Pipeline stage that failed.
        stage: &'static str,
        /// Rendered error.
        error: String,
        /// Failures so far.
        attempts: u32,
        /// Earliest time of the next attempt.
        retry_at: NaiveDateTime,
    },
    /// Excluded for the rest of the day.
    Quarantined {
        /// Measurement file.
        path: PathBuf,
        /// Pipeline stage that rejected the file.
        stage: &'static str,
        /// Rendered error.
        error: String,
    },
    /// The active day changed.
    DayRolledOver {
        /// Previous active day.
        from: NaiveDate,
        /// New active day.
        to: NaiveDate,
    },
    /// The cycle aborted before finishing (e.g. the root is missing).
    CycleFailed {
        /// Rendered error.
        error: String,
    },
}

/// Counters for one reconciliation cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Active day key of the cycle.
    pub day: Option<NaiveDate>,
    /// Days whose directories were scanned, in scan order.
    pub scanned_days: Vec<NaiveDate>,
    /// Files with the configured extension across scanned days.
    pub candidates: usize,
    /// Candidates already processed or quarantined.
    pub already_done: usize,
    /// Waiting for a retry backoff to expire.
    pub deferred: usize,
    /// Modified too recently to read.
    pub unsettled: usize,
    /// Files handed to the pipeline.
    pub dispatched: usize,
    /// Files the sink acknowledged.
    pub processed: usize,
    /// Files that decoded to nothing.
    pub skipped: usize,
    /// Transient failures scheduled for retry or given up on.
    pub failed: usize,
    /// Files excluded for the rest of the day.
    pub quarantined: usize,
    /// Cancellation was observed before every candidate was visited.
    pub cancelled: bool,
}

enum FileResult {
    Persisted { channels: usize },
    Empty,
}

/// Polls the watch root and pushes every new measurement file through the pipeline once per day.
pub struct IngestWorker {
    settings: WorkerSettings,
    builder: RecordBuilder,
    sink: Arc<dyn RecordSink>,
    clock: Arc<dyn Clock>,
    state: ProcessedFileSet,
    retries: RetryTracker,
    pending_catch_up: Option<NaiveDate>,
    events: broadcast::Sender<IngestEvent>,
}

impl IngestWorker {
    /// Worker on the local wall clock with empty state.
    pub fn new(
        settings: WorkerSettings,
        retry: &RetryConfig,
        builder: RecordBuilder,
        sink: Arc<dyn RecordSink>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: ProcessedFileSet::new(settings.retention_days),
            settings,
            builder,
            sink,
            clock: Arc::new(LocalClock),
            retries: RetryTracker::new(retry),
            pending_catch_up: None,
            events,
        }
    }

    /// Wires reader, builder, and sink from a validated configuration.
    pub async fn from_config(config: &IngestConfig, readers: &ReaderRegistry) -> IngestResult<Self> {
        if config.decoder.is_synthetic() {
            warn!(reader = %config.decoder.reader, "dry run: records will contain synthetic samples");
        }
        let reader = readers.create(&config.decoder.reader)?;
        let builder = RecordBuilder::from_config(reader, &config.transform);
        let sink = sink::create_sink(&config.sink).await?;
        Ok(Self::new(
            WorkerSettings::from_config(config),
            &config.retry,
            builder,
            sink,
        ))
    }

    /// Replaces the wall clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Receiver for events emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<IngestEvent> {
        self.events.subscribe()
    }

    /// Processed-file state, for inspection.
    pub fn state(&self) -> &ProcessedFileSet {
        &self.state
    }

    /// Settings the worker was built with.
    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    /// Runs cycles until `shutdown` becomes `true` or its sender is dropped.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            root = %self.settings.root_dir.display(),
            extension = %self.settings.extension,
            interval = ?self.settings.poll_interval,
            sink = self.sink.name(),
            "ingest worker started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.run_cycle(Some(&shutdown)).await {
                Ok(report) if report.dispatched > 0 => {
                    info!(
                        day = ?report.day,
                        dispatched = report.dispatched,
                        processed = report.processed,
                        skipped = report.skipped,
                        failed = report.failed,
                        quarantined = report.quarantined,
                        "ingest cycle complete"
                    );
                }
                Ok(report) => debug!(day = ?report.day, candidates = report.candidates, "nothing new"),
                Err(e) => {
                    error!(error = %e, "ingest cycle failed");
                    self.emit(IngestEvent::CycleFailed {
                        error: e.to_string(),
                    });
                }
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
            }
        }

        info!("ingest worker stopped");
    }

    /// Runs exactly one reconciliation cycle.
    ///
    /// Only discovery failures are returned; per-file failures are counted in
    /// the report and announced as events.
    pub async fn run_cycle(
        &mut self,
        shutdown: Option<&watch::Receiver<bool>>,
    ) -> IngestResult<CycleReport> {
        let now = self.clock.now();
        let today = now.date();
        let span = info_span!("ingest_cycle", day = %today);
        self.reconcile(now, shutdown).instrument(span).await
    }

    async fn reconcile(
        &mut self,
        now: NaiveDateTime,
        shutdown: Option<&watch::Receiver<bool>>,
    ) -> IngestResult<CycleReport> {
        let today = now.date();
        if let Some(previous) = self.state.rotate(today) {
            info!(from = %previous, to = %today, "new day detected");
            let state = &self.state;
            self.retries.prune(|day| state.is_retained(day));
            if self.settings.catch_up_previous_day && previous < today {
                self.pending_catch_up = Some(previous);
            }
            self.emit(IngestEvent::DayRolledOver {
                from: previous,
                to: today,
            });
        }

        let mut report = CycleReport {
            day: Some(today),
            ..Default::default()
        };

        if let Some(previous) = self.pending_catch_up {
            if self.state.is_retained(previous) {
                let unsettled_before = report.unsettled;
                self.scan_day(previous, now, shutdown, &mut report).await?;

                // Swept again each cycle until nothing from that day is waiting.
                let outstanding = report.cancelled
                    || report.unsettled > unsettled_before
                    || self.retries.has_pending(previous);
                if outstanding {
                    debug!(day = %previous, "previous day still has files outstanding");
                } else {
                    self.pending_catch_up = None;
                }
            } else {
                self.pending_catch_up = None;
            }
            if report.cancelled {
                return Ok(report);
            }
        }

        self.scan_day(today, now, shutdown, &mut report).await?;
        Ok(report)
    }

    async fn scan_day(
        &mut self,
        day: NaiveDate,
        now: NaiveDateTime,
        shutdown: Option<&watch::Receiver<bool>>,
        report: &mut CycleReport,
    ) -> IngestResult<()> {
        let dir = self.settings.day_directory(day)?;
        report.scanned_days.push(day);

        let Some(candidates) =
            discovery::list_candidates(&self.settings.root_dir, &dir, &self.settings.extension)
                .await?
        else {
            debug!(dir = %dir.display(), "day directory does not exist yet");
            return Ok(());
        };

        report.candidates += candidates.len();
        let wall_now = SystemTime::now();

        for candidate in candidates {
            if shutdown.is_some_and(|rx| *rx.borrow()) {
                report.cancelled = true;
                break;
            }
            if self.state.contains(day, &candidate.path) {
                report.already_done += 1;
                continue;
            }
            if !self.retries.is_due(&candidate.path, now) {
                report.deferred += 1;
                continue;
            }
            if !candidate.is_settled(self.settings.settle_time, wall_now) {
                debug!(path = %candidate.path.display(), "file still settling");
                report.unsettled += 1;
                continue;
            }

            report.dispatched += 1;
            let span = info_span!("ingest_file", path = %candidate.path.display());
            let result = self.process_file(&candidate.path).instrument(span).await;
            self.record_result(day, now, candidate.path, result, report);
        }

        Ok(())
    }

    async fn process_file(&self, path: &Path) -> IngestResult<FileResult> {
        info!("processing new measurement file");

        // Whole file in memory before decoding; partial buffers never reach the reader.
        let bytes = tokio::fs::read(path).await?;

        let builder = self.builder.clone();
        let payload = tokio::task::spawn_blocking(move || -> IngestResult<_> {
            match builder.build(&bytes)? {
                Some(record) => {
                    let channels = record.channel_count();
                    Ok(Some((serializer::to_json_bytes(&record)?, channels)))
                }
                None => Ok(None),
            }
        })
        .await
        .map_err(|e| IngestError::Task(e.to_string()))??;

        let Some((payload, channels)) = payload else {
            return Ok(FileResult::Empty);
        };

        let id = FileIdentifier::from_path(path);
        self.sink.persist(&id, &payload).await?;
        Ok(FileResult::Persisted { channels })
    }

    fn record_result(
        &mut self,
        day: NaiveDate,
        now: NaiveDateTime,
        path: PathBuf,
        result: IngestResult<FileResult>,
        report: &mut CycleReport,
    ) {
        match result {
            Ok(FileResult::Persisted { channels }) => {
                self.state.mark_processed(day, &path);
                self.retries.clear(&path);
                report.processed += 1;
                info!(path = %path.display(), channels, sink = self.sink.name(), "measurement file converted");
                self.emit(IngestEvent::Processed {
                    path,
                    day,
                    channels,
                });
            }
            Ok(FileResult::Empty) => {
                self.state.mark_processed(day, &path);
                self.retries.clear(&path);
                report.skipped += 1;
                info!(path = %path.display(), "measurement file has no channel data; nothing persisted");
                self.emit(IngestEvent::Skipped { path, day });
            }
            Err(e) => {
                let decision = if e.is_permanent() {
                    RetryDecision::GiveUp {
                        attempts: self.retries.attempts(&path) + 1,
                    }
                } else {
                    self.retries.record_failure(day, &path, now)
                };

                match decision {
                    RetryDecision::RetryAt { at, attempts } => {
                        report.failed += 1;
                        warn!(
                            path = %path.display(),
                            stage = e.stage(),
                            error = %e,
                            attempts,
                            retry_at = %at,
                            "failed to convert measurement file; will retry"
                        );
                        self.emit(IngestEvent::Failed {
                            path,
                            stage: e.stage(),
                            error: e.to_string(),
                            attempts,
                            retry_at: at,
                        });
                    }
                    RetryDecision::GiveUp { attempts } => {
                        self.state.mark_quarantined(day, &path);
                        self.retries.clear(&path);
                        report.quarantined += 1;
                        error!(
                            path = %path.display(),
                            stage = e.stage(),
                            error = %e,
                            attempts,
                            "failed to convert measurement file; quarantined for the day"
                        );
                        self.emit(IngestEvent::Quarantined {
                            path,
                            stage: e.stage(),
                            error: e.to_string(),
                        });
                    }
                }
            }
        }
    }

    fn emit(&self, event: IngestEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
