//! Mock measurement reader
//!
//! Produces a deterministic synthetic file from any non-empty buffer so the
//! worker can be exercised end to end without real acquisition files. The
//! buffer length sets the sample count (capped at [`MAX_SAMPLES`]).
//!
//! The decoded file has one untitled group with two channels:
//! - `Sine`: 50 Hz sine wave at 1024 S/s
//! - `Ramp`: linear ramp from 0 to 1

use super::{DecodedChannel, DecodedFile, DecodedGroup, MeasurementFileReader};
use crate::error::DecodeError;
use crate::measurement::Properties;
use std::f64::consts::PI;

/// Registry name of the mock reader.
pub const MOCK_READER_NAME: &str = "mock";

/// Upper bound on generated samples per channel.
pub const MAX_SAMPLES: usize = 4096;

const SAMPLE_RATE_HZ: f64 = 1024.0;
const SINE_FREQUENCY_HZ: f64 = 50.0;

/// Reader that derives synthetic channels from the buffer length. Dry runs only.
#[derive(Debug, Default, Clone)]
pub struct MockReader;

impl MockReader {
    /// Creates the reader.
    pub fn new() -> Self {
        Self
    }

    fn channel(name: &str, samples: Vec<f64>, unit: &str) -> DecodedChannel {
        let mut properties = Properties::new();
        properties.insert("unit_string".into(), unit.into());
        properties.insert("wf_increment".into(), (1.0 / SAMPLE_RATE_HZ).into());
        properties.insert("wf_samples".into(), (samples.len() as i64).into());
        DecodedChannel {
            name: name.to_string(),
            samples,
            properties,
        }
    }
}

impl MeasurementFileReader for MockReader {
    fn name(&self) -> &str {
        MOCK_READER_NAME
    }

    fn read(&self, bytes: &[u8]) -> Result<DecodedFile, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Incomplete("empty buffer".to_string()));
        }

        let n = bytes.len().min(MAX_SAMPLES);
        let sine = (0..n)
            .map(|i| (2.0 * PI * SINE_FREQUENCY_HZ * i as f64 / SAMPLE_RATE_HZ).sin())
            .collect();
        let ramp = (0..n)
            .map(|i| if n > 1 { i as f64 / (n - 1) as f64 } else { 0.0 })
            .collect();

        Ok(DecodedFile {
            groups: vec![DecodedGroup {
                name: String::new(),
                channels: vec![Self::channel("Sine", sine, "V"), Self::channel("Ramp", ramp, "V")],
            }],
        })
    }
}
