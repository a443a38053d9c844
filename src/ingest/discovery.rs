//! Candidate listing for a day directory.

use crate::error::DiscoveryError;
use chrono::NaiveDate;
use std::fmt::Write;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// A measurement file found in a day directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Full path of the file.
    pub path: PathBuf,
    /// Last modification time, when the filesystem reports one.
    pub modified: Option<SystemTime>,
}

impl Candidate {
    /// Whether the file has not been modified for at least `settle_time`.
    ///
    /// Unknown modification times count as settled.
    pub fn is_settled(&self, settle_time: Duration, now: SystemTime) -> bool {
        match self.modified {
            Some(modified) => {
                now.duration_since(modified).unwrap_or(Duration::ZERO) >= settle_time
            }
            None => true,
        }
    }
}

/// Renders the day key of `day`.
///
/// Fails when `day_format` is not a valid strftime string or asks for
/// fields a calendar date does not carry, such as `%H`.
pub fn day_key(day: NaiveDate, day_format: &str) -> Result<String, DiscoveryError> {
    let mut key = String::new();
    write!(key, "{}", day.format(day_format)).map_err(|_| DiscoveryError::DayFormat {
        format: day_format.to_string(),
    })?;
    Ok(key)
}

/// Directory holding the files of `day`.
pub fn day_directory(
    root: &Path,
    day: NaiveDate,
    day_format: &str,
) -> Result<PathBuf, DiscoveryError> {
    Ok(root.join(day_key(day, day_format)?))
}

/// Lists files with `extension` (lowercase, no dot) in `dir`, sorted by path.
///
/// Returns `Ok(None)` when `dir` does not exist yet but `root` does. A
/// missing `root` is an error.
pub async fn list_candidates(
    root: &Path,
    dir: &Path,
    extension: &str,
) -> Result<Option<Vec<Candidate>>, DiscoveryError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return if tokio::fs::metadata(root).await.is_ok() {
                Ok(None)
            } else {
                Err(DiscoveryError::RootMissing {
                    path: root.to_path_buf(),
                })
            };
        }
        Err(source) => {
            return Err(DiscoveryError::ReadDir {
                path: dir.to_path_buf(),
                source,
            })
        }
    };

    let mut candidates = Vec::new();
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(source) => {
                return Err(DiscoveryError::Entry {
                    path: dir.to_path_buf(),
                    source,
                })
            }
        };

        let path = entry.path();
        if !has_extension(&path, extension) {
            continue;
        }
        // Entries can vanish between listing and stat; skip them.
        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        candidates.push(Candidate {
            path,
            modified: metadata.modified().ok(),
        });
    }

    candidates.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(Some(candidates))
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}
