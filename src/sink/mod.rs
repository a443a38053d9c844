//! Persistence targets for serialized records.
//!
//! The worker hands every rendered record to a [`RecordSink`] and marks the
//! source file processed only after `persist` returns `Ok`.
//!
//! Available sinks:
//! - [`JsonFileSink`]: sidecar `<name>.json` next to the measurement file
//! - `SqliteSink` (feature `sink_sqlite`): one row per file in SQLite
//! - [`FanOutSink`]: several sinks in sequence

pub mod json_file;
#[cfg(feature = "sink_sqlite")]
pub mod sqlite;

pub use json_file::JsonFileSink;
#[cfg(feature = "sink_sqlite")]
pub use sqlite::SqliteSink;

use crate::config::SinkConfig;
use crate::error::{IngestResult, SinkError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Which sink(s) the worker writes to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Sidecar `.json` next to each measurement file.
    #[default]
    Json,
    /// One row per file in a SQLite table.
    Sqlite,
    /// Sidecar first, then the database.
    Both,
}

impl SinkKind {
    /// Whether a database connection is required.
    pub fn needs_database(self) -> bool {
        matches!(self, SinkKind::Sqlite | SinkKind::Both)
    }
}

/// Identity of an input file as seen by sinks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileIdentifier {
    /// Path of the measurement file.
    pub path: PathBuf,
    /// Final path component, used as the database key.
    pub file_name: String,
}

impl FileIdentifier {
    /// Identifier for `path`; `file_name` falls back to the whole path.
    pub fn from_path(path: &Path) -> Self {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self {
            path: path.to_path_buf(),
            file_name,
        }
    }
}

/// Persists the UTF-8 JSON payload produced for one input file.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Stores `payload`. Must only return `Ok` once the data is durable.
    async fn persist(&self, file: &FileIdentifier, payload: &[u8]) -> Result<(), SinkError>;
}

/// Writes to each inner sink in order, stopping at the first failure.
pub struct FanOutSink {
    sinks: Vec<Arc<dyn RecordSink>>,
}

impl FanOutSink {
    /// Fan-out over `sinks`, written in the given order.
    pub fn new(sinks: Vec<Arc<dyn RecordSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl RecordSink for FanOutSink {
    fn name(&self) -> &str {
        "fan-out"
    }

    async fn persist(&self, file: &FileIdentifier, payload: &[u8]) -> Result<(), SinkError> {
        for sink in &self.sinks {
            sink.persist(file, payload).await?;
        }
        Ok(())
    }
}

/// Creates the sink selected by the `[sink]` section.
pub async fn create_sink(config: &SinkConfig) -> IngestResult<Arc<dyn RecordSink>> {
    match config.kind {
        SinkKind::Json => Ok(Arc::new(JsonFileSink::new())),
        SinkKind::Sqlite => open_database(config).await,
        SinkKind::Both => {
            let database = open_database(config).await?;
            Ok(Arc::new(FanOutSink::new(vec![
                Arc::new(JsonFileSink::new()),
                database,
            ])))
        }
    }
}

#[cfg(feature = "sink_sqlite")]
async fn open_database(config: &SinkConfig) -> IngestResult<Arc<dyn RecordSink>> {
    Ok(Arc::new(SqliteSink::connect(&config.database_url).await?))
}

#[cfg(not(feature = "sink_sqlite"))]
async fn open_database(_config: &SinkConfig) -> IngestResult<Arc<dyn RecordSink>> {
    Err(crate::error::IngestError::FeatureNotEnabled(
        "sink_sqlite".to_string(),
    ))
}
