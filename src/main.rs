//! CLI Entry Point for daq-ingest
//!
//! # Usage
//!
//! Start the worker (Ctrl+C to stop):
//! ```bash
//! daq-ingest run --config config/ingest.toml
//! ```
//!
//! Run a single reconciliation cycle:
//! ```bash
//! daq-ingest once
//! ```
//!
//! Convert one file and print the JSON:
//! ```bash
//! daq-ingest convert data/measurements/2024-03-01/run_01.tdms
//! ```

// Global allocator (Microsoft Rust Guidelines: M-MIMALLOC-APPS)
#[cfg(not(test))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use daq_ingest::builder::RecordBuilder;
use daq_ingest::config::{IngestConfig, DEFAULT_CONFIG_PATH};
use daq_ingest::decoder::ReaderRegistry;
use daq_ingest::ingest::IngestWorker;
use daq_ingest::logging;
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "daq-ingest")]
#[command(about = "Converts date-partitioned measurement files to JSON", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the current day's directory until stopped
    Run,

    /// Run one reconciliation cycle and exit
    Once,

    /// Decode, transform, and print one file as JSON (no sink, no state)
    Convert {
        /// Measurement file to convert
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = IngestConfig::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    config.validate()?;
    logging::init_from_config(&config)?;

    let readers = ReaderRegistry::new();

    match cli.command {
        Commands::Run => run(&config, &readers).await,
        Commands::Once => once(&config, &readers).await,
        Commands::Convert { file } => convert(&config, &readers, &file).await,
    }
}

async fn run(config: &IngestConfig, readers: &ReaderRegistry) -> Result<()> {
    let mut worker = IngestWorker::from_config(config, readers).await?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown requested"),
            Err(e) => warn!(error = %e, "failed to listen for Ctrl+C; stopping"),
        }
        let _ = shutdown_tx.send(true);
    });

    worker.run(shutdown_rx).await;
    Ok(())
}

async fn once(config: &IngestConfig, readers: &ReaderRegistry) -> Result<()> {
    let mut worker = IngestWorker::from_config(config, readers).await?;
    let report = worker.run_cycle(None).await?;
    info!(
        day = ?report.day,
        candidates = report.candidates,
        processed = report.processed,
        skipped = report.skipped,
        failed = report.failed,
        quarantined = report.quarantined,
        "cycle finished"
    );
    Ok(())
}

async fn convert(config: &IngestConfig, readers: &ReaderRegistry, file: &Path) -> Result<()> {
    if config.decoder.is_synthetic() {
        warn!(reader = %config.decoder.reader, "dry run: output contains synthetic samples");
    }
    let reader = readers.create(&config.decoder.reader)?;
    let builder = RecordBuilder::from_config(reader, &config.transform);
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;

    match tokio::task::spawn_blocking(move || builder.convert(&bytes)).await?? {
        Some(json) => println!("{json}"),
        None => warn!(file = %file.display(), "file holds no channel data"),
    }
    Ok(())
}
