//! HTTP probe executor
//!
//! This module performs exactly one HTTP request try for a URL, including:
//! - Building the shared, pooled HTTP client from configuration
//! - HEAD requests with an in-attempt GET fallback
//! - Redirect limiting (delegated to the transport)
//! - Error classification into coarse outcomes
//!
//! URL validation and the per-attempt deadline are enforced by the pipeline
//! before and around [`ProbeExecutor::probe`], so an executor only ever sees a
//! syntactically valid `http`/`https` URL.

use crate::config::{ProbeConfig, ProbeMethod};
use crate::engine::model::Outcome;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{redirect::Policy, Client, Proxy, StatusCode};
use std::error::Error as StdError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use url::Url;

/// Performs a single probe attempt and classifies its result
///
/// Implementations must release any connection they open on every exit path;
/// the pipeline may drop the returned future at any await point (timeout or
/// cancellation).
#[async_trait]
pub trait ProbeExecutor: Send + Sync {
    async fn probe(&self, url: &Url) -> Outcome;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The probe configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use livehttpx::config::ProbeConfig;
/// use livehttpx::engine::build_http_client;
///
/// let client = build_http_client(&ProbeConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &ProbeConfig) -> Result<Client, reqwest::Error> {
    let redirect = if config.redirect_limit == 0 {
        Policy::none()
    } else {
        Policy::limited(config.redirect_limit)
    };

    let mut builder = Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.timeout())
        .connect_timeout(config.timeout())
        .redirect(redirect)
        .danger_accept_invalid_certs(!config.verify_tls)
        .default_headers(default_headers(config))
        .gzip(true)
        .brotli(true);

    if let Some(proxy) = &config.proxy {
        builder = builder.proxy(Proxy::all(proxy.as_str())?);
    }

    builder.build()
}

/// Converts configured headers, skipping entries validation would reject
fn default_headers(config: &ProbeConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in &config.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => tracing::warn!("Skipping invalid header {}", name),
        }
    }
    headers
}

/// Probe executor backed by a pooled `reqwest` client
///
/// With a User-Agent pool, each request takes the next entry round-robin;
/// clones share the rotation.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: Client,
    method: ProbeMethod,
    head_fallback: bool,
    user_agents: Arc<[HeaderValue]>,
    next_agent: Arc<AtomicUsize>,
}

impl HttpProber {
    pub fn new(client: Client, method: ProbeMethod, head_fallback: bool) -> Self {
        Self {
            client,
            method,
            head_fallback,
            user_agents: Arc::from(Vec::new()),
            next_agent: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Rotates the given User-Agent values across requests
    pub fn with_user_agents<I>(mut self, agents: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let agents: Vec<HeaderValue> = agents
            .into_iter()
            .filter_map(|agent| match HeaderValue::from_str(agent.as_ref()) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!("Skipping invalid user agent {:?}", agent.as_ref());
                    None
                }
            })
            .collect();
        self.user_agents = Arc::from(agents);
        self
    }

    pub fn from_config(config: &ProbeConfig) -> Result<Self, reqwest::Error> {
        let client = build_http_client(config)?;
        Ok(Self::new(client, config.method, config.head_fallback)
            .with_user_agents(&config.user_agents))
    }

    fn next_user_agent(&self) -> Option<HeaderValue> {
        if self.user_agents.is_empty() {
            return None;
        }
        let n = self.next_agent.fetch_add(1, Ordering::Relaxed);
        Some(self.user_agents[n % self.user_agents.len()].clone())
    }

    async fn send(&self, method: ProbeMethod, url: &Url) -> Result<StatusCode, reqwest::Error> {
        let mut request = self.client.request(method.as_reqwest(), url.clone());
        if let Some(agent) = self.next_user_agent() {
            request = request.header(USER_AGENT, agent);
        }

        // Dropping the response releases the connection; the body is never read
        let response = request.send().await?;
        Ok(response.status())
    }
}

#[async_trait]
impl ProbeExecutor for HttpProber {
    async fn probe(&self, url: &Url) -> Outcome {
        let status = match self.send(self.method, url).await {
            Ok(status)
                if self.method == ProbeMethod::Head
                    && self.head_fallback
                    && rejects_head(status) =>
            {
                tracing::trace!("HEAD rejected with {} for {}, retrying as GET", status, url);
                self.send(ProbeMethod::Get, url).await
            }
            other => other,
        };

        match status {
            Ok(status) => Outcome::Success {
                status_code: status.as_u16(),
            },
            Err(e) => classify_error(&e),
        }
    }
}

/// Returns true for statuses that mean "this server does not do HEAD"
fn rejects_head(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED
    )
}

/// Classifies a transport error into an outcome
///
/// | Condition | Outcome |
/// |-----------|---------|
/// | Deadline elapsed | Timeout |
/// | Redirect limit exceeded | TooManyRedirects |
/// | Request could not be built | InvalidUrl |
/// | Anything else (DNS, refused, reset, TLS) | ConnectionError |
pub fn classify_error(error: &reqwest::Error) -> Outcome {
    if error.is_timeout() {
        Outcome::Timeout
    } else if error.is_redirect() {
        Outcome::TooManyRedirects
    } else if error.is_builder() {
        Outcome::InvalidUrl
    } else {
        Outcome::ConnectionError {
            detail: root_cause(error),
        }
    }
}

/// Returns the innermost error message of a chain
fn root_cause(error: &(dyn StdError + 'static)) -> String {
    let mut current = error;
    while let Some(source) = current.source() {
        current = source;
    }
    current.to_string()
}
