//! livehttpx main entry point
//!
//! This is the command-line interface for the livehttpx URL liveness prober.

use anyhow::Context;
use clap::Parser;
use livehttpx::config::{
    load_config_with_hash, validate, Config, OutputFormat, ProbeMethod,
};
use livehttpx::engine::run_scan;
use livehttpx::output::print_statistics;
use livehttpx::url::DefaultScheme;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// livehttpx: fast, bounded-concurrency HTTP liveness prober
///
/// Reads one URL per line and prints `<status> - <url>` for each, or a
/// failure token (TIMEOUT, ERROR, REDIRECTS, INVALID, CANCELLED).
#[derive(Parser, Debug)]
#[command(name = "livehttpx")]
#[command(version)]
#[command(about = "Probe a list of URLs for liveness", long_about = None)]
struct Cli {
    /// File with one URL per line (`-` for stdin)
    #[arg(value_name = "INPUT", default_value = "-")]
    input: PathBuf,

    /// Write results to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Maximum number of URLs probed at once
    #[arg(short = 'C', long)]
    concurrency: Option<usize>,

    /// Request method
    #[arg(short, long, value_enum)]
    method: Option<ProbeMethod>,

    /// Per-attempt timeout in milliseconds
    #[arg(short, long, value_name = "MS")]
    timeout: Option<u64>,

    /// Maximum attempts per URL, including the first
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Base delay of the exponential retry backoff in milliseconds
    #[arg(long, value_name = "MS")]
    backoff_base_ms: Option<u64>,

    /// Maximum redirects followed per attempt (0 disables following)
    #[arg(long)]
    redirect_limit: Option<usize>,

    /// Cancel the whole run after this many seconds
    #[arg(long, value_name = "SECS")]
    run_timeout_secs: Option<u64>,

    /// Output format
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Write results in input order instead of completion order
    #[arg(long)]
    ordered: bool,

    /// Write a markdown run report to this file
    #[arg(long, value_name = "FILE")]
    summary: Option<PathBuf>,

    /// Prefix bare host lines with this scheme (`both` tries http, then https)
    #[arg(long, value_enum)]
    default_scheme: Option<DefaultScheme>,

    /// Drop repeated URLs
    #[arg(long)]
    dedupe: bool,

    /// Validate configuration and show the effective settings without probing
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    /// Applies command-line overrides on top of the file configuration
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(concurrency) = self.concurrency {
            config.engine.concurrency = concurrency;
        }
        if let Some(secs) = self.run_timeout_secs {
            config.engine.run_timeout_secs = Some(secs);
        }
        if let Some(method) = self.method {
            config.probe.method = method;
        }
        if let Some(timeout) = self.timeout {
            config.probe.timeout_ms = timeout;
        }
        if let Some(limit) = self.redirect_limit {
            config.probe.redirect_limit = limit;
        }
        if let Some(attempts) = self.max_attempts {
            config.retry.max_attempts = attempts;
        }
        if let Some(base) = self.backoff_base_ms {
            config.retry.backoff_base_ms = base;
            config.retry.backoff_max_ms = config.retry.backoff_max_ms.max(base);
        }
        if let Some(format) = self.format {
            config.output.format = format;
        }
        if self.ordered {
            config.output.ordered = true;
        }
        if let Some(summary) = &self.summary {
            config.output.summary_path = Some(summary.display().to_string());
        }
        if let Some(scheme) = self.default_scheme {
            config.input.default_scheme = Some(scheme);
        }
        if self.dedupe {
            config.input.dedupe = true;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load configuration, then layer the command line on top
    let (mut config, config_hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load configuration from {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (config, Some(hash))
        }
        None => (Config::default(), None),
    };

    cli.apply_overrides(&mut config);
    validate(&config).context("invalid configuration")?;

    if cli.dry_run {
        handle_dry_run(&cli, &config);
        return Ok(());
    }

    let summary = run_scan(config, &cli.input, cli.output.as_deref(), config_hash)
        .await
        .context("scan failed")?;

    if !cli.quiet {
        print_statistics(&summary.stats);
    }

    if summary.cancelled {
        tracing::warn!("Scan {}; unfinished URLs are reported as CANCELLED", summary.status());
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// Logs go to stderr; stdout carries results.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("livehttpx=info,warn"),
            1 => EnvFilter::new("livehttpx=debug,info"),
            2 => EnvFilter::new("livehttpx=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(cli: &Cli, config: &Config) {
    println!("=== livehttpx Dry Run ===\n");

    println!("Input: {}", cli.input.display());
    match config.input.default_scheme {
        Some(DefaultScheme::Both) => println!("  Bare hosts: http, then https when unreachable"),
        Some(scheme) => println!("  Bare hosts: {}", scheme.as_str()),
        None => {}
    }
    match &cli.output {
        Some(path) => println!("Output: {}", path.display()),
        None => println!("Output: stdout"),
    }

    println!("\nEngine:");
    println!("  Concurrency: {}", config.engine.concurrency);
    match config.engine.run_timeout_secs {
        Some(secs) => println!("  Run timeout: {}s", secs),
        None => println!("  Run timeout: none"),
    }
    println!("  Cancel grace: {}ms", config.engine.cancel_grace_ms);

    println!("\nProbe:");
    println!("  Method: {:?}", config.probe.method);
    println!("  HEAD fallback: {}", config.probe.head_fallback);
    println!("  Timeout per attempt: {}ms", config.probe.timeout_ms);
    println!("  Redirect limit: {}", config.probe.redirect_limit);
    if config.probe.user_agents.is_empty() {
        println!("  User agent: {}", config.probe.user_agent);
    } else {
        println!("  User agents (rotated): {}", config.probe.user_agents.join(", "));
    }
    println!("  Verify TLS: {}", config.probe.verify_tls);
    if let Some(proxy) = &config.probe.proxy {
        println!("  Proxy: {}", proxy);
    }
    for (name, value) in &config.probe.headers {
        println!("  Header: {}: {}", name, value);
    }

    println!("\nRetry:");
    println!("  Max attempts: {}", config.retry.max_attempts);
    let retry_on: Vec<&str> = config.retry.retry_on.iter().map(|k| k.token()).collect();
    println!("  Retry on: {}", retry_on.join(", "));
    println!(
        "  Backoff: {}ms base, {}ms max",
        config.retry.backoff_base_ms, config.retry.backoff_max_ms
    );

    println!("\nOutput:");
    println!("  Format: {:?}", config.output.format);
    println!("  Ordered: {}", config.output.ordered);
    println!("  Report failures: {}", config.output.report_failures);
    if !config.output.match_codes.is_empty() {
        println!("  Match codes: {:?}", config.output.match_codes);
    }
    if !config.output.exclude_codes.is_empty() {
        println!("  Exclude codes: {:?}", config.output.exclude_codes);
    }
    if let Some(path) = &config.output.summary_path {
        println!("  Summary: {}", path);
    }

    println!("\n✓ Configuration is valid");
}
