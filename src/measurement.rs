//! Measurement data model: groups, channels, properties, and the record
//! emitted per input file.
//!
//! Field names serialize in PascalCase (`GroupName`, `Channels`, `Name`,
//! `Data`, `Properties`), the layout downstream consumers of the JSON
//! sidecars already read. Properties are kept in a `BTreeMap` so the
//! rendered key order is stable from run to run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label given to groups with no usable name.
pub const UNTITLED: &str = "Untitled";

/// A decoded property value.
///
/// Serialized without a tag: strings and timestamps as JSON strings
/// (timestamps in RFC 3339), numbers as JSON numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Boolean property.
    Bool(bool),
    /// Any integer property, widened to `i64`.
    Integer(i64),
    /// Floating-point property.
    Float(f64),
    /// Absolute time, rendered in RFC 3339.
    Timestamp(DateTime<Utc>),
    /// String property.
    Text(String),
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Integer(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Float(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<DateTime<Utc>> for PropertyValue {
    fn from(value: DateTime<Utc>) -> Self {
        PropertyValue::Timestamp(value)
    }
}

/// Property map of a channel, ordered by key.
pub type Properties = BTreeMap<String, PropertyValue>;

/// Channel samples after the numeric policy has run.
///
/// Raw and rounded samples keep double precision; spectral magnitudes are
/// single precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Samples {
    /// Raw or rounded samples.
    F64(Vec<f64>),
    /// Spectral magnitudes.
    F32(Vec<f32>),
}

impl Samples {
    /// Number of values.
    pub fn len(&self) -> usize {
        match self {
            Samples::F64(values) => values.len(),
            Samples::F32(values) => values.len(),
        }
    }

    /// True when there are no values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values widened to `f64`.
    pub fn to_f64(&self) -> Vec<f64> {
        match self {
            Samples::F64(values) => values.clone(),
            Samples::F32(values) => values.iter().map(|&v| f64::from(v)).collect(),
        }
    }
}

/// A named channel with its samples and properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MeasurementChannel {
    /// Channel name.
    pub name: String,
    /// Samples after the numeric policy.
    pub data: Samples,
    /// Channel properties, ordered by key.
    pub properties: Properties,
}

/// A named collection of channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MeasurementGroup {
    /// Normalized group name; placeholder names become [`UNTITLED`].
    pub group_name: String,
    /// Channels in file order.
    pub channels: Vec<MeasurementChannel>,
}

/// The serializable unit produced for one input file.
///
/// `Groups` renders as a JSON array of groups; `Channel` renders as a
/// single channel object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum IngestionRecord {
    /// Every group of the file.
    Groups(Vec<MeasurementGroup>),
    /// Only the first channel of the first group.
    Channel(MeasurementChannel),
}

impl IngestionRecord {
    /// Number of channels carried by the record.
    pub fn channel_count(&self) -> usize {
        match self {
            IngestionRecord::Groups(groups) => groups.iter().map(|g| g.channels.len()).sum(),
            IngestionRecord::Channel(_) => 1,
        }
    }
}

/// Rewrites empty, whitespace-only, and placeholder group names to
/// [`UNTITLED`]; any other name is returned verbatim.
///
/// Placeholders are compared after trimming and ignoring case.
pub fn normalize_group_name<S: AsRef<str>>(name: &str, placeholders: &[S]) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return UNTITLED.to_string();
    }
    let is_placeholder = placeholders
        .iter()
        .any(|p| p.as_ref().trim().to_lowercase() == trimmed.to_lowercase());
    if is_placeholder {
        UNTITLED.to_string()
    } else {
        name.to_string()
    }
}
