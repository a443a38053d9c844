//! Configuration for the ingestion worker using Figment
//!
//! Configuration is layered, later sources overriding earlier ones:
//! 1. Built-in defaults (every field has one, so an absent file is fine)
//! 2. A TOML file (default `config/ingest.toml`)
//! 3. Environment variables prefixed with `DAQ_INGEST_`, nested keys split on `__`
//!
//! # Example
//! ```no_run
//! use daq_ingest::config::IngestConfig;
//!
//! let config = IngestConfig::load()?;
//! config.validate()?;
//! println!("Watching: {}", config.watch.root_dir.display());
//! # Ok::<(), daq_ingest::error::IngestError>(())
//! ```

use crate::builder::RecordLayout;
use crate::data::fft::Normalization;
use crate::data::processor::PolicyKind;
use crate::decoder::mock::MOCK_READER_NAME;
use crate::error::{IngestError, IngestResult};
use crate::logging::OutputFormat;
use crate::sink::SinkKind;
use crate::ingest::discovery;
use chrono::NaiveDate;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/ingest.toml";

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "DAQ_INGEST_";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Application settings
    pub application: ApplicationConfig,
    /// Directory watching and day partitioning
    pub watch: WatchConfig,
    /// Measurement reader selection
    pub decoder: DecoderConfig,
    /// Per-channel numeric policy and record layout
    pub transform: TransformConfig,
    /// Failure retry policy
    pub retry: RetryConfig,
    /// Persistence target
    pub sink: SinkConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format
    pub log_format: OutputFormat,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "daq-ingest".to_string(),
            log_level: "info".to_string(),
            log_format: OutputFormat::Pretty,
        }
    }
}

/// Where measurement files arrive and how often to look for them
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Root directory holding one subdirectory per calendar day
    pub root_dir: PathBuf,
    /// Measurement file extension, without the leading dot
    pub extension: String,
    /// chrono format string used for day directory names and dedup keys
    pub day_format: String,
    /// Pause between reconciliation cycles
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    /// Files modified more recently than this are left for a later cycle
    #[serde(with = "humantime_serde")]
    pub settle_time: Duration,
    /// Number of day partitions kept in the processed-file state
    pub retention_days: usize,
    /// Sweep the previous day's directory once after the day changes
    pub catch_up_previous_day: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("data/measurements"),
            extension: "tdms".to_string(),
            day_format: "%Y-%m-%d".to_string(),
            poll_interval: Duration::from_secs(30),
            settle_time: Duration::from_secs(2),
            retention_days: 2,
            catch_up_previous_day: true,
        }
    }
}

/// Measurement reader selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Name registered in the `ReaderRegistry`. Must be set explicitly.
    pub reader: String,
    /// Allows the synthetic `mock` reader.
    pub dry_run: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            reader: String::new(),
            dry_run: false,
        }
    }
}

impl DecoderConfig {
    /// True when records will be built from synthetic samples.
    pub fn is_synthetic(&self) -> bool {
        self.reader == MOCK_READER_NAME
    }
}

/// Per-channel numeric policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    /// Which policy is applied to every channel
    pub policy: PolicyKind,
    /// Decimal digits kept by the `round` policy
    pub decimals: u32,
    /// Scaling applied to the forward transform by the `spectrum` policy
    pub normalization: Normalization,
    /// Shape of the emitted record
    pub layout: RecordLayout,
    /// Group names the reader emits for untitled groups
    pub untitled_placeholders: Vec<String>,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            policy: PolicyKind::Spectrum,
            decimals: 3,
            normalization: Normalization::Symmetric,
            layout: RecordLayout::Groups,
            untitled_placeholders: vec!["제목 없음".to_string(), "Untitled".to_string()],
        }
    }
}

/// Backoff for files whose processing failed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts before a transiently failing file is quarantined for the day
    pub max_attempts: u32,
    /// Delay before the first retry; doubles per attempt
    #[serde(with = "humantime_serde")]
    pub base_backoff: Duration,
    /// Upper bound on the retry delay
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_secs(30),
            max_backoff: Duration::from_secs(30 * 60),
        }
    }
}

/// Persistence target
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// json, sqlite, or both
    pub kind: SinkKind,
    /// Connection string for the sqlite sink
    pub database_url: String,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            kind: SinkKind::Json,
            database_url: "sqlite://ingest.db".to_string(),
        }
    }
}

impl IngestConfig {
    /// Load configuration from `config/ingest.toml` and environment variables
    ///
    /// Environment variables override the file with prefix `DAQ_INGEST_`.
    /// Example: `DAQ_INGEST_WATCH__ROOT_DIR=/srv/measurements`
    pub fn load() -> IngestResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    pub fn load_from<P: AsRef<Path>>(path: P) -> IngestResult<Self> {
        let config = Figment::from(Serialized::defaults(IngestConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> IngestResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(IngestError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.watch.extension.trim_start_matches('.').is_empty() {
            return Err(IngestError::Configuration(
                "watch.extension must not be empty".to_string(),
            ));
        }

        let sample_day = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap_or_default();
        if self.watch.day_format.is_empty()
            || discovery::day_key(sample_day, &self.watch.day_format).is_err()
        {
            return Err(IngestError::Configuration(format!(
                "Invalid watch.day_format '{}'",
                self.watch.day_format
            )));
        }

        if self.watch.poll_interval.is_zero() {
            return Err(IngestError::Configuration(
                "watch.poll_interval must be greater than zero".to_string(),
            ));
        }

        if self.watch.retention_days == 0 {
            return Err(IngestError::Configuration(
                "watch.retention_days must be at least 1".to_string(),
            ));
        }

        if self.transform.decimals > 15 {
            return Err(IngestError::Configuration(format!(
                "Invalid transform.decimals {}. Must be 0-15",
                self.transform.decimals
            )));
        }

        if self.retry.max_attempts == 0 {
            return Err(IngestError::Configuration(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }

        if self.sink.kind.needs_database() && !cfg!(feature = "sink_sqlite") {
            return Err(IngestError::FeatureNotEnabled("sink_sqlite".to_string()));
        }

        if self.decoder.reader.trim().is_empty() {
            return Err(IngestError::Configuration(
                "decoder.reader is not set; name a registered measurement reader".to_string(),
            ));
        }

        if self.decoder.is_synthetic() && !self.decoder.dry_run {
            return Err(IngestError::Configuration(format!(
                "decoder.reader '{MOCK_READER_NAME}' emits synthetic samples; set decoder.dry_run = true to use it"
            )));
        }

        Ok(())
    }

    /// Extension normalized for comparison: lowercase, no leading dot.
    pub fn normalized_extension(&self) -> String {
        self.watch.extension.trim_start_matches('.').to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    /// Defaults plus the synthetic reader, which is all validation still needs.
    fn dry_run_config() -> IngestConfig {
        let mut config = IngestConfig::default();
        config.decoder.reader = MOCK_READER_NAME.to_string();
        config.decoder.dry_run = true;
        config
    }

    #[test]
    fn defaults_are_valid_once_a_reader_is_chosen() {
        let config = dry_run_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.watch.poll_interval, Duration::from_secs(30));
        assert_eq!(config.transform.decimals, 3);
        assert_eq!(config.normalized_extension(), "tdms");
    }

    #[test]
    fn file_and_env_layers_override_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "ingest.toml",
                r#"
                [watch]
                root_dir = "/srv/fm"
                poll_interval = "5s"

                [transform]
                policy = "round"
                layout = "first_channel"
                "#,
            )?;
            jail.set_env("DAQ_INGEST_RETRY__MAX_ATTEMPTS", "9");
            jail.set_env("DAQ_INGEST_DECODER__DRY_RUN", "true");

            let config = IngestConfig::load_from("ingest.toml")
                .map_err(|e| figment::Error::from(e.to_string()))?;
            assert_eq!(config.watch.root_dir, PathBuf::from("/srv/fm"));
            assert_eq!(config.watch.poll_interval, Duration::from_secs(5));
            assert_eq!(config.transform.policy, PolicyKind::Round);
            assert_eq!(config.transform.layout, RecordLayout::FirstChannel);
            assert_eq!(config.retry.max_attempts, 9);
            assert!(config.decoder.dry_run);
            // untouched sections keep their defaults
            assert_eq!(config.watch.extension, "tdms");
            Ok(())
        });
    }

    #[test]
    fn missing_file_yields_defaults() {
        Jail::expect_with(|_jail| {
            let config = IngestConfig::load_from("does-not-exist.toml")
                .map_err(|e| figment::Error::from(e.to_string()))?;
            assert_eq!(config.application.name, "daq-ingest");
            Ok(())
        });
    }

    #[test]
    fn default_reader_must_be_chosen() {
        let config = IngestConfig::default();
        assert!(config.decoder.reader.is_empty());
        match config.validate() {
            Err(IngestError::Configuration(msg)) => assert!(msg.contains("decoder.reader")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn mock_reader_requires_dry_run() {
        let mut config = dry_run_config();
        config.decoder.dry_run = false;
        match config.validate() {
            Err(IngestError::Configuration(msg)) => assert!(msg.contains("dry_run")),
            other => panic!("unexpected {other:?}"),
        }

        config.decoder.reader = "tdms".to_string();
        assert!(config.validate().is_ok());
        assert!(!config.decoder.is_synthetic());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = dry_run_config();
        config.application.log_level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_retention_is_rejected() {
        let mut config = dry_run_config();
        config.watch.retention_days = 0;
        assert!(matches!(
            config.validate(),
            Err(IngestError::Configuration(_))
        ));
    }

    #[test]
    fn bad_day_format_is_rejected() {
        let mut config = dry_run_config();
        config.watch.day_format = "%Y-%Q".to_string();
        assert!(config.validate().is_err());

        // Parses, but a date has no hour to render.
        config.watch.day_format = "%Y-%m-%d_%H".to_string();
        assert!(matches!(
            config.validate(),
            Err(IngestError::Configuration(_))
        ));
    }

    #[test]
    fn dotted_extension_is_normalized() {
        let mut config = dry_run_config();
        config.watch.extension = ".TDMS".to_string();
        assert!(config.validate().is_ok());
        assert_eq!(config.normalized_extension(), "tdms");
    }

    #[cfg(not(feature = "sink_sqlite"))]
    #[test]
    fn sqlite_sink_requires_feature() {
        let mut config = dry_run_config();
        config.sink.kind = SinkKind::Sqlite;
        assert!(matches!(
            config.validate(),
            Err(IngestError::FeatureNotEnabled(_))
        ));
    }
}
