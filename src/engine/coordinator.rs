//! Scan coordinator - wires source, scheduler and sinks for one run
//!
//! This module handles:
//! - Building the HTTP prober, retry policy and scheduler from configuration
//! - Opening the URL source and building the sink chain
//! - Translating Ctrl-C into the run's cancellation signal
//! - Writing the optional markdown report

use crate::config::Config;
use crate::engine::scheduler::{RunSummary, Scheduler};
use crate::input::UrlSource;
use crate::output::{build_sink, generate_markdown_summary};
use crate::ScanError;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Scan coordinator for one run
pub struct Coordinator {
    config: Config,
    scheduler: Scheduler,
    config_hash: Option<String>,
}

impl Coordinator {
    /// Creates a new coordinator
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `config_hash` - Hash of the configuration file, recorded in the report
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(ScanError)` - The configuration or HTTP client is unusable
    pub fn new(config: Config, config_hash: Option<String>) -> Result<Self, ScanError> {
        let scheduler = Scheduler::from_config(&config)?;
        Ok(Self {
            config,
            scheduler,
            config_hash,
        })
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.scheduler.cancellation_token()
    }

    /// Runs the scan
    ///
    /// `input` may be `-` for stdin; without `output` results go to stdout.
    pub async fn run(&self, input: &Path, output: Option<&Path>) -> Result<RunSummary, ScanError> {
        let source = UrlSource::open(input, self.config.input.clone())
            .and_then(|source| source.into_stream(self.config.engine.concurrency))
            .map_err(ScanError::Source)?;

        let mut sink = match output {
            Some(path) => build_sink(BufWriter::new(File::create(path)?), &self.config.output),
            None => build_sink(io::stdout(), &self.config.output),
        };

        tracing::info!(
            "Reading URLs from {}",
            if input == Path::new("-") {
                "stdin".to_string()
            } else {
                input.display().to_string()
            }
        );

        let interrupt = self.install_interrupt_handler();
        let outcome = self.scheduler.run(source, sink.as_mut()).await;
        interrupt.abort();

        let summary = outcome?;

        if let Some(path) = &self.config.output.summary_path {
            tracing::info!("Writing run report to {}", path);
            generate_markdown_summary(&summary, self.config_hash.as_deref(), Path::new(path))?;
        }

        Ok(summary)
    }

    /// Cancels the run on the first Ctrl-C
    fn install_interrupt_handler(&self) -> tokio::task::JoinHandle<()> {
        let token = self.cancellation_token();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, finishing in-flight probes");
                token.cancel();
            }
        })
    }
}

/// Runs a complete scan
///
/// This is the main entry point for a scan. It will:
/// 1. Build the HTTP client, retry policy and scheduler
/// 2. Stream URLs from `input` through the admission window
/// 3. Write every result to `output` (stdout when `None`)
/// 4. Write the markdown report if `output.summary-path` is set
///
/// # Returns
///
/// * `Ok(RunSummary)` - The scan finished or was cancelled
/// * `Err(ScanError)` - Configuration, source or sink failure
pub async fn run_scan(
    config: Config,
    input: &Path,
    output: Option<&Path>,
    config_hash: Option<String>,
) -> Result<RunSummary, ScanError> {
    let coordinator = Coordinator::new(config, config_hash)?;
    coordinator.run(input, output).await
}
