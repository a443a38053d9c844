//! Measurement-file reader contract.
//!
//! Parsing the binary container format is delegated to an implementation of
//! [`MeasurementFileReader`]. The ingestion pipeline only sees the decoded
//! shape: groups of channels, each with raw `f64` samples and a property map.
//!
//! Readers are selected by name through [`ReaderRegistry`], which ships with
//! the synthetic `mock` reader for dry runs. Deployments register the real
//! format decoder under its own name.

pub mod mock;

use crate::error::{DecodeError, IngestError, IngestResult};
use crate::measurement::Properties;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// A channel as the reader produced it, before any numeric policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecodedChannel {
    /// Channel name, possibly empty.
    pub name: String,
    /// Raw samples in file order.
    pub samples: Vec<f64>,
    /// Channel properties, in file order.
    #[serde(default)]
    pub properties: Properties,
}

/// A group as the reader produced it. The name is not yet normalized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecodedGroup {
    /// Group name, possibly a placeholder such as "Untitled".
    pub name: String,
    /// Channels in file order.
    pub channels: Vec<DecodedChannel>,
}

/// Everything decoded from one measurement file, in file order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecodedFile {
    /// Groups in file order.
    pub groups: Vec<DecodedGroup>,
}

/// Decodes a complete in-memory measurement file.
///
/// Implementations must be pure with respect to the buffer: the same bytes
/// always decode to the same groups and channels.
pub trait MeasurementFileReader: Send + Sync {
    /// Name the reader is registered under.
    fn name(&self) -> &str;

    /// Decodes the whole buffer.
    fn read(&self, bytes: &[u8]) -> Result<DecodedFile, DecodeError>;
}

type ReaderFactory = Box<dyn Fn() -> Arc<dyn MeasurementFileReader> + Send + Sync>;

/// Registry of measurement reader factories keyed by name.
///
/// # Examples
///
/// ```
/// use daq_ingest::decoder::ReaderRegistry;
///
/// let registry = ReaderRegistry::new();
/// let reader = registry.create("mock")?;
/// assert_eq!(reader.name(), "mock");
/// # Ok::<(), daq_ingest::error::IngestError>(())
/// ```
pub struct ReaderRegistry {
    factories: HashMap<String, ReaderFactory>,
}

impl Default for ReaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ReaderRegistry {
    /// Creates a registry holding the built-in readers.
    pub fn new() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };
        registry.register(mock::MOCK_READER_NAME, || Arc::new(mock::MockReader::new()));
        registry
    }

    /// Registers (or replaces) a reader factory.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Arc<dyn MeasurementFileReader> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    /// Creates the reader registered under `name`.
    pub fn create(&self, name: &str) -> IngestResult<Arc<dyn MeasurementFileReader>> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| IngestError::UnknownReader(name.to_string()))
    }

    /// Registered reader names, sorted.
    pub fn list_readers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Whether a factory exists for `name`.
    pub fn is_registered(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}
