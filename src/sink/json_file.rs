//! Sidecar JSON writer.
//!
//! `/data/2024-03-01/run_01.tdms` is persisted as
//! `/data/2024-03-01/run_01.json`. The payload is first written to
//! `run_01.json.tmp`, flushed to disk, and renamed into place, so readers
//! never observe a half-written sidecar and an acknowledged sidecar survives
//! a power loss.

use super::{FileIdentifier, RecordSink};
use crate::error::SinkError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Extension of the sidecar file.
pub const SIDECAR_EXTENSION: &str = "json";

/// Writes each payload to a sidecar next to its measurement file.
///
/// # Example
///
/// ```
/// use daq_ingest::sink::{FileIdentifier, JsonFileSink, RecordSink};
///
/// let dir = tempfile::tempdir().unwrap();
/// let measurement = dir.path().join("run_01.tdms");
///
/// # tokio_test::block_on(async {
/// let sink = JsonFileSink::new();
/// sink.persist(&FileIdentifier::from_path(&measurement), b"[]")
///     .await
///     .unwrap();
/// # });
/// assert!(dir.path().join("run_01.json").exists());
/// ```
#[derive(Debug, Default, Clone)]
pub struct JsonFileSink;

impl JsonFileSink {
    /// Creates the sink.
    pub fn new() -> Self {
        Self
    }

    /// Sidecar path for a measurement file.
    pub fn sidecar_path(path: &Path) -> PathBuf {
        path.with_extension(SIDECAR_EXTENSION)
    }
}

#[async_trait]
impl RecordSink for JsonFileSink {
    fn name(&self) -> &str {
        "json"
    }

    async fn persist(&self, file: &FileIdentifier, payload: &[u8]) -> Result<(), SinkError> {
        let target = Self::sidecar_path(&file.path);
        let staging = file.path.with_extension(format!("{SIDECAR_EXTENSION}.tmp"));

        write_synced(&staging, payload)
            .await
            .map_err(|source| SinkError::Write {
                path: staging.clone(),
                source,
            })?;
        tokio::fs::rename(&staging, &target)
            .await
            .map_err(|source| SinkError::Write {
                path: target.clone(),
                source,
            })?;
        sync_parent(&target)
            .await
            .map_err(|source| SinkError::Write {
                path: target.clone(),
                source,
            })?;

        debug!(path = %target.display(), bytes = payload.len(), "sidecar written");
        Ok(())
    }
}

async fn write_synced(path: &Path, payload: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path).await?;
    file.write_all(payload).await?;
    file.sync_all().await
}

/// Makes the rename itself durable.
#[cfg(unix)]
async fn sync_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(dir) if dir.as_os_str().is_empty() => File::open(".").await?.sync_all().await,
        Some(dir) => File::open(dir).await?.sync_all().await,
        None => Ok(()),
    }
}

#[cfg(not(unix))]
async fn sync_parent(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
