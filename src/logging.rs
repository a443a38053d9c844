//! Structured logging setup
//!
//! Installs a `tracing-subscriber` registry for the worker. `RUST_LOG` wins
//! when set; otherwise the `[application]` level applies to this crate and
//! noisy dependencies are held at `warn`.
//!
//! Span fields (`day` on `ingest_cycle`, `path` on `ingest_file`) are carried
//! into every line emitted while a cycle or file is in progress, so the JSON
//! format is enough to reconstruct what happened to one file.
//!
//! # Example
//! ```no_run
//! use daq_ingest::{config::IngestConfig, logging};
//! use tracing::info;
//!
//! let config = IngestConfig::load()?;
//! logging::init_from_config(&config)?;
//! info!(root = %config.watch.root_dir.display(), "worker starting");
//! # Ok::<(), daq_ingest::error::IngestError>(())
//! ```

use crate::config::IngestConfig;
use crate::error::{IngestError, IngestResult};
use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Dependencies whose `info` output is not useful to operators.
const QUIET_TARGETS: [&str; 1] = ["sqlx"];

/// Output format for log lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Multi-line, colored (interactive use)
    #[default]
    Pretty,
    /// One line per event, no colors
    Compact,
    /// Newline-delimited JSON for log shippers
    Json,
}

/// Subscriber options derived from configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Level used when `RUST_LOG` is not set
    pub level: Level,
    /// Line format.
    pub format: OutputFormat,
    /// Emit a line with timings when `ingest_cycle` and `ingest_file` spans close
    pub span_timings: bool,
    /// Colored output; only the pretty format honors it.
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: OutputFormat::Pretty,
            span_timings: false,
            ansi: true,
        }
    }
}

impl LoggingConfig {
    /// Options from the `[application]` section.
    pub fn from_ingest_config(config: &IngestConfig) -> IngestResult<Self> {
        Ok(Self {
            level: parse_log_level(&config.application.log_level)?,
            format: config.application.log_format,
            span_timings: config.application.log_level.eq_ignore_ascii_case("debug")
                || config.application.log_level.eq_ignore_ascii_case("trace"),
            ..Default::default()
        })
    }

    /// `EnvFilter` directives used when `RUST_LOG` is absent.
    pub fn default_directives(&self) -> String {
        let level = self.level.as_str().to_lowercase();
        let mut directives = vec![level];
        directives.extend(QUIET_TARGETS.iter().map(|target| format!("{target}=warn")));
        directives.join(",")
    }
}

/// Initialize logging from the worker configuration
pub fn init_from_config(config: &IngestConfig) -> IngestResult<()> {
    init(LoggingConfig::from_ingest_config(config)?)
}

/// Installs the global subscriber.
///
/// A subscriber that is already installed (tests, embedding applications)
/// is left in place.
pub fn init(config: LoggingConfig) -> IngestResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_directives()));

    let span_events = if config.span_timings {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let layer = match config.format {
        OutputFormat::Pretty => fmt::layer()
            .pretty()
            .with_span_events(span_events)
            .with_ansi(config.ansi)
            .with_filter(env_filter)
            .boxed(),
        OutputFormat::Compact => fmt::layer()
            .compact()
            .with_span_events(span_events)
            .with_ansi(false)
            .with_filter(env_filter)
            .boxed(),
        OutputFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_span_events(span_events)
            .with_filter(env_filter)
            .boxed(),
    };

    if tracing_subscriber::registry().with(layer).try_init().is_err() {
        tracing::debug!("global subscriber already installed; keeping it");
    }
    Ok(())
}

/// Parses `trace`..`error`, ignoring case.
fn parse_log_level(level: &str) -> IngestResult<Level> {
    level.parse::<Level>().map_err(|_| {
        IngestError::Configuration(format!(
            "Invalid log level '{level}'. Must be one of: trace, debug, info, warn, error"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("trace").unwrap(), Level::TRACE);
        assert_eq!(parse_log_level("WARN").unwrap(), Level::WARN);
        assert_eq!(parse_log_level("Debug").unwrap(), Level::DEBUG);
        assert!(matches!(
            parse_log_level("loud"),
            Err(IngestError::Configuration(_))
        ));
    }

    #[test]
    fn logging_config_follows_application_section() {
        let mut config = IngestConfig::default();
        config.application.log_level = "debug".to_string();
        config.application.log_format = OutputFormat::Json;

        let logging = LoggingConfig::from_ingest_config(&config).unwrap();
        assert_eq!(logging.level, Level::DEBUG);
        assert_eq!(logging.format, OutputFormat::Json);
        assert!(logging.span_timings);
    }

    #[test]
    fn default_directives_quiet_dependencies() {
        let logging = LoggingConfig {
            level: Level::WARN,
            ..Default::default()
        };
        assert_eq!(logging.default_directives(), "warn,sqlx=warn");
    }

    #[test]
    fn init_twice_is_harmless() {
        assert!(init(LoggingConfig::default()).is_ok());
        assert!(init(LoggingConfig::default()).is_ok());
    }
}
