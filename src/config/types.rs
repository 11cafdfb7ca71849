use crate::engine::OutcomeKind;
use crate::url::DefaultScheme;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Main configuration structure for livehttpx
///
/// Every section is optional; `Config::default()` is a valid configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    pub engine: EngineConfig,
    pub probe: ProbeConfig,
    pub retry: RetryConfig,
    pub input: InputConfig,
    pub output: OutputConfig,
}

/// Concurrency scheduler configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EngineConfig {
    /// Maximum number of tasks with an attempt in flight
    pub concurrency: usize,

    /// Whole-run deadline in seconds; acts like an interrupt when it elapses
    pub run_timeout_secs: Option<u64>,

    /// How long an in-flight attempt may keep running after cancellation (milliseconds)
    pub cancel_grace_ms: u64,

    /// Number of completed results between progress log lines (0 disables)
    pub progress_interval: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: 50,
            run_timeout_secs: None,
            cancel_grace_ms: 1000,
            progress_interval: 1000,
        }
    }
}

impl EngineConfig {
    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_millis(self.cancel_grace_ms)
    }
}

/// HTTP request method used for probing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
pub enum ProbeMethod {
    #[serde(rename = "HEAD", alias = "head")]
    #[value(name = "HEAD", alias = "head")]
    Head,
    #[serde(rename = "GET", alias = "get")]
    #[value(name = "GET", alias = "get")]
    Get,
}

impl ProbeMethod {
    pub fn as_reqwest(&self) -> reqwest::Method {
        match self {
            Self::Head => reqwest::Method::HEAD,
            Self::Get => reqwest::Method::GET,
        }
    }
}

/// Probe executor (HTTP transport) configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ProbeConfig {
    /// Request method
    pub method: ProbeMethod,

    /// Re-issue a HEAD answered with 405/501 as GET within the same attempt
    pub head_fallback: bool,

    /// Per-attempt timeout (milliseconds)
    pub timeout_ms: u64,

    /// Maximum redirects followed per attempt (0 disables following)
    pub redirect_limit: usize,

    /// User-Agent header value
    pub user_agent: String,

    /// User-Agent values rotated across requests; overrides `user-agent` when set
    pub user_agents: Vec<String>,

    /// Verify TLS certificates
    pub verify_tls: bool,

    /// Proxy URL applied to all requests
    pub proxy: Option<String>,

    /// Extra request headers
    pub headers: BTreeMap<String, String>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            method: ProbeMethod::Head,
            head_fallback: true,
            timeout_ms: 5000,
            redirect_limit: 10,
            user_agent: format!("livehttpx/{}", env!("CARGO_PKG_VERSION")),
            user_agents: Vec::new(),
            verify_tls: true,
            proxy: None,
            headers: BTreeMap::new(),
        }
    }
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RetryConfig {
    /// Maximum attempts per task, including the first
    pub max_attempts: u32,

    /// Outcome kinds that trigger another attempt
    pub retry_on: Vec<OutcomeKind>,

    /// Base delay of the exponential backoff (milliseconds)
    pub backoff_base_ms: u64,

    /// Upper bound of a single backoff delay (milliseconds)
    pub backoff_max_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            retry_on: vec![OutcomeKind::Timeout, OutcomeKind::ConnectionError],
            backoff_base_ms: 500,
            backoff_max_ms: 10_000,
        }
    }
}

/// URL source configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct InputConfig {
    /// Scheme prefixed to bare host lines
    ///
    /// `both` probes `http://` first and moves to `https://` when the host
    /// is unreachable over plain http.
    pub default_scheme: Option<DefaultScheme>,

    /// Treat lines starting with `#` as comments
    pub skip_comments: bool,

    /// Drop repeated URLs before they become tasks
    pub dedupe: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            default_scheme: None,
            skip_comments: true,
            dedupe: false,
        }
    }
}

/// Result line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// `<classification> - <url>` lines
    #[default]
    Text,
    /// One JSON object per line
    Jsonl,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    pub format: OutputFormat,

    /// Restore input order before writing
    pub ordered: bool,

    /// Write non-success results (timeouts, errors, invalid URLs)
    pub report_failures: bool,

    /// Only report these status codes (empty reports all)
    pub match_codes: Vec<u16>,

    /// Never report these status codes
    pub exclude_codes: Vec<u16>,

    /// Path of the markdown run report
    pub summary_path: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            ordered: false,
            report_failures: true,
            match_codes: Vec::new(),
            exclude_codes: Vec::new(),
            summary_path: None,
        }
    }
}
