//! Custom error types for the ingestion worker.
//!
//! Each stage of the per-file pipeline has its own error enum so callers can
//! tell where a file failed. They all convert into the crate-level
//! `IngestError` via `#[from]`, which keeps `?` usable across stage
//! boundaries.
//!
//! ## Error Hierarchy
//!
//! - **`Discovery`**: listing the day directory failed. Aborts the current
//!   cycle only; the loop retries on the next one.
//! - **`Decode`**: the measurement-file reader could not produce groups and
//!   channels from the byte buffer.
//! - **`Transform`**: the per-channel numeric policy rejected the samples.
//! - **`Serialize`**: the record could not be rendered to JSON.
//! - **`Sink`**: persistence failed. The file is left unmarked so it is
//!   attempted again.
//! - **`Config`** / **`Configuration`**: figment parse errors and semantic
//!   validation errors respectively.
//!
//! `IngestError::is_permanent` classifies failures for the retry policy: a
//! permanent failure will not succeed by trying the same bytes again.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type IngestResult<T> = std::result::Result<T, IngestError>;

/// Top-level error for the worker and its CLI.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Loading or merging configuration sources failed.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// A loaded value is out of range.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// Reading a measurement file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Listing the watch root failed.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// The reader rejected a file.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A channel policy rejected its samples.
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// The record could not be rendered as JSON.
    #[error(transparent)]
    Serialize(#[from] SerializeError),

    /// The sink did not acknowledge a record.
    #[error(transparent)]
    Sink(#[from] SinkError),

    /// A `spawn_blocking` conversion panicked or was cancelled.
    #[error("Blocking task failed: {0}")]
    Task(String),

    /// No reader is registered under the configured name.
    #[error("Unknown measurement reader '{0}'")]
    UnknownReader(String),

    /// The configuration needs a cargo feature this build lacks.
    #[error("Feature '{0}' is not enabled. Please build with --features {0}")]
    FeatureNotEnabled(String),
}

impl From<figment::Error> for IngestError {
    fn from(value: figment::Error) -> Self {
        IngestError::Config(Box::new(value))
    }
}

impl IngestError {
    /// Whether retrying the same input can never succeed.
    pub fn is_permanent(&self) -> bool {
        match self {
            IngestError::Decode(err) => err.is_permanent(),
            IngestError::Transform(_) | IngestError::Serialize(_) => true,
            IngestError::Config(_)
            | IngestError::Configuration(_)
            | IngestError::UnknownReader(_)
            | IngestError::FeatureNotEnabled(_) => true,
            IngestError::Io(_)
            | IngestError::Discovery(_)
            | IngestError::Sink(_)
            | IngestError::Task(_) => false,
        }
    }

    /// Short stage label used in logs and events.
    pub fn stage(&self) -> &'static str {
        match self {
            IngestError::Config(_) | IngestError::Configuration(_) => "config",
            IngestError::Io(_) => "read",
            IngestError::Discovery(_) => "discovery",
            IngestError::Decode(_) | IngestError::UnknownReader(_) => "decode",
            IngestError::Transform(_) => "transform",
            IngestError::Serialize(_) => "serialize",
            IngestError::Sink(_) => "sink",
            IngestError::Task(_) => "task",
            IngestError::FeatureNotEnabled(_) => "feature",
        }
    }
}

/// Listing candidate files failed.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// The watch root is not there (unmounted share, typo).
    #[error("Watch root '{}' does not exist", path.display())]
    RootMissing {
        /// Configured root directory.
        path: PathBuf,
    },

    /// The day format contains time fields or invalid specifiers.
    #[error("Day format '{format}' cannot render a calendar date")]
    DayFormat {
        /// The offending strftime string.
        format: String,
    },

    /// A day directory exists but could not be listed.
    #[error("Failed to read directory '{}': {source}", path.display())]
    ReadDir {
        /// Directory being listed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// One entry of a day directory could not be inspected.
    #[error("Failed to read entry in '{}': {source}", path.display())]
    Entry {
        /// Directory being listed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// The measurement-file reader could not decode a buffer.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The buffer is not a valid measurement file.
    #[error("Malformed measurement file: {0}")]
    Malformed(String),

    /// The buffer ends early, typically because the file is still being written.
    #[error("Incomplete measurement file: {0}")]
    Incomplete(String),
}

impl DecodeError {
    /// Retrying cannot help; the file is quarantined instead.
    pub fn is_permanent(&self) -> bool {
        matches!(self, DecodeError::Malformed(_))
    }
}

/// The per-channel numeric policy rejected its input.
#[derive(Error, Debug, PartialEq)]
pub enum TransformError {
    /// NaN or infinity reached a channel policy.
    #[error("Channel '{channel}' has a non-finite sample at index {index}")]
    NonFinite {
        /// Channel name as decoded.
        channel: String,
        /// Position of the first offending sample.
        index: usize,
    },
}

/// Rendering a record to JSON failed.
#[derive(Error, Debug)]
pub enum SerializeError {
    /// `serde_json` refused the value.
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persistence failed; the file must not be marked processed.
#[derive(Error, Debug)]
pub enum SinkError {
    /// Writing a sidecar file failed.
    #[error("Failed to write '{}': {source}", path.display())]
    Write {
        /// File being written or renamed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The database rejected the insert or was unreachable.
    #[error("Database error: {0}")]
    Database(String),
}
