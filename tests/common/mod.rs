//! Shared fixtures for integration tests.
//!
//! Measurement files in these tests are JSON-encoded `DecodedFile`s read by
//! [`FixtureReader`], so each test controls exactly what the reader emits.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use daq_ingest::builder::{RecordBuilder, RecordLayout};
use daq_ingest::config::RetryConfig;
use daq_ingest::data::processor::ChannelPolicy;
use daq_ingest::decoder::{
    DecodedChannel, DecodedFile, DecodedGroup, MeasurementFileReader,
};
use daq_ingest::error::{DecodeError, SinkError};
use daq_ingest::ingest::{IngestWorker, ManualClock, WorkerSettings};
use daq_ingest::measurement::Properties;
use daq_ingest::sink::{FileIdentifier, RecordSink};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Reads a `DecodedFile` serialized as JSON.
///
/// Samples may also be the strings `"inf"`, `"-inf"` or `"nan"`, which JSON
/// numbers cannot express. Empty buffers are incomplete; anything else that
/// does not parse (including `null` samples) is malformed.
#[derive(Debug, Default)]
pub struct FixtureReader;

#[derive(Deserialize)]
#[serde(untagged)]
enum FixtureSample {
    Number(f64),
    Special(String),
}

impl FixtureSample {
    fn value(self) -> Result<f64, DecodeError> {
        match self {
            FixtureSample::Number(v) => Ok(v),
            FixtureSample::Special(s) => match s.as_str() {
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                "nan" => Ok(f64::NAN),
                other => Err(DecodeError::Malformed(format!("bad sample '{other}'"))),
            },
        }
    }
}

#[derive(Deserialize)]
struct FixtureChannel {
    name: String,
    samples: Vec<FixtureSample>,
    #[serde(default)]
    properties: Properties,
}

#[derive(Deserialize)]
struct FixtureGroup {
    name: String,
    channels: Vec<FixtureChannel>,
}

#[derive(Deserialize)]
struct FixtureFile {
    groups: Vec<FixtureGroup>,
}

impl MeasurementFileReader for FixtureReader {
    fn name(&self) -> &str {
        "fixture"
    }

    fn read(&self, bytes: &[u8]) -> Result<DecodedFile, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Incomplete("empty buffer".into()));
        }
        let file: FixtureFile =
            serde_json::from_slice(bytes).map_err(|e| DecodeError::Malformed(e.to_string()))?;

        let mut groups = Vec::with_capacity(file.groups.len());
        for group in file.groups {
            let mut channels = Vec::with_capacity(group.channels.len());
            for channel in group.channels {
                let samples = channel
                    .samples
                    .into_iter()
                    .map(FixtureSample::value)
                    .collect::<Result<Vec<_>, _>>()?;
                channels.push(DecodedChannel {
                    name: channel.name,
                    samples,
                    properties: channel.properties,
                });
            }
            groups.push(DecodedGroup {
                name: group.name,
                channels,
            });
        }
        Ok(DecodedFile { groups })
    }
}

/// Sink that keeps every payload in memory and can be told to fail.
#[derive(Default)]
pub struct RecordingSink {
    records: Mutex<Vec<(String, Vec<u8>)>>,
    failing: AtomicBool,
}

impl RecordingSink {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn file_names(&self) -> Vec<String> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .map(|(_, payload)| payload.clone())
            .collect()
    }
}

#[async_trait]
impl RecordSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn persist(&self, file: &FileIdentifier, payload: &[u8]) -> Result<(), SinkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::Database("sink offline".into()));
        }
        self.records
            .lock()
            .unwrap()
            .push((file.file_name.clone(), payload.to_vec()));
        Ok(())
    }
}

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
}

pub fn at(d: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
    day(d).and_hms_opt(h, m, s).unwrap()
}

pub fn settings(root: &Path) -> WorkerSettings {
    WorkerSettings {
        root_dir: root.to_path_buf(),
        extension: "tdms".into(),
        day_format: "%Y-%m-%d".into(),
        poll_interval: Duration::from_millis(10),
        settle_time: Duration::ZERO,
        retention_days: 2,
        catch_up_previous_day: true,
    }
}

pub fn round_builder() -> RecordBuilder {
    RecordBuilder::new(
        Arc::new(FixtureReader),
        ChannelPolicy::Round { decimals: 3 },
        RecordLayout::Groups,
    )
    .with_placeholders(vec!["제목 없음".into()])
}

/// Worker over `root` with the fixture reader, round policy, and a recording sink.
pub fn worker(
    root: &Path,
    clock: Arc<ManualClock>,
) -> (IngestWorker, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let worker = IngestWorker::new(
        settings(root),
        &RetryConfig::default(),
        round_builder(),
        sink.clone(),
    )
    .with_clock(clock);
    (worker, sink)
}

pub fn channel(name: &str, samples: Vec<f64>) -> DecodedChannel {
    DecodedChannel {
        name: name.into(),
        samples,
        properties: Properties::new(),
    }
}

pub fn file_with(group: &str, channels: Vec<DecodedChannel>) -> DecodedFile {
    DecodedFile {
        groups: vec![DecodedGroup {
            name: group.into(),
            channels,
        }],
    }
}

/// Writes `decoded` as a measurement file under `<root>/<day>/<name>`.
pub fn write_measurement(root: &Path, day: NaiveDate, name: &str, decoded: &DecodedFile) -> PathBuf {
    let dir = root.join(day.format("%Y-%m-%d").to_string());
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, serde_json::to_vec(decoded).unwrap()).unwrap();
    path
}

/// Writes raw fixture JSON under `<root>/<day>/<name>`.
pub fn write_raw_measurement(root: &Path, day: NaiveDate, name: &str, json: &str) -> PathBuf {
    let dir = root.join(day.format("%Y-%m-%d").to_string());
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, json).unwrap();
    path
}

/// A small valid measurement file.
pub fn sample_file() -> DecodedFile {
    file_with("", vec![channel("Temp", vec![0.0, 1.0, 2.0, 3.0])])
}
