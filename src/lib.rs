//! # daq_ingest
//!
//! A long-running worker that watches date-partitioned directories for newly
//! arrived measurement files, converts each file's group/channel data into
//! JSON (optionally through a windowed spectral transform), and persists the
//! result exactly once per day.
//!
//! ## Crate Structure
//!
//! - **`config`**: layered TOML + environment configuration. See `config::IngestConfig`.
//! - **`logging`**: `tracing-subscriber` setup.
//! - **`error`**: `IngestError` and the per-stage error enums.
//! - **`measurement`**: groups, channels, property values, and the emitted record.
//! - **`decoder`**: the `MeasurementFileReader` contract and reader registry.
//! - **`data`**: the per-channel numeric policies, including the Hann-windowed FFT.
//! - **`builder`**: decoded file -> normalized, transformed record.
//! - **`serializer`**: record -> indented JSON.
//! - **`sink`**: sidecar JSON files and (feature `sink_sqlite`) SQLite rows.
//! - **`ingest`**: the reconciliation loop with per-day dedup state.

pub mod builder;
pub mod config;
pub mod data;
pub mod decoder;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod measurement;
pub mod serializer;
pub mod sink;

pub use error::{IngestError, IngestResult};
