use crate::config::types::{Config, EngineConfig, OutputConfig, ProbeConfig, RetryConfig};
use crate::engine::OutcomeKind;
use crate::ConfigError;
use reqwest::header::{HeaderName, HeaderValue};
use url::Url;

/// Upper bound on the admission window
pub const MAX_CONCURRENCY: usize = 10_000;

/// Upper bound on attempts per task
pub const MAX_ATTEMPTS: u32 = 20;

/// Upper bound on followed redirects
pub const MAX_REDIRECT_LIMIT: usize = 50;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_engine_config(&config.engine)?;
    validate_probe_config(&config.probe)?;
    validate_retry_config(&config.retry)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates scheduler configuration
fn validate_engine_config(config: &EngineConfig) -> Result<(), ConfigError> {
    validate_concurrency(config.concurrency)?;

    if config.run_timeout_secs == Some(0) {
        return Err(ConfigError::Validation(
            "run_timeout_secs must be > 0 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates the concurrency ceiling
///
/// Shared with the scheduler constructor so a zero ceiling is rejected even
/// when the scheduler is built without a `Config`.
pub fn validate_concurrency(concurrency: usize) -> Result<(), ConfigError> {
    if concurrency < 1 || concurrency > MAX_CONCURRENCY {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and {}, got {}",
            MAX_CONCURRENCY, concurrency
        )));
    }
    Ok(())
}

/// Validates probe executor configuration
fn validate_probe_config(config: &ProbeConfig) -> Result<(), ConfigError> {
    if config.timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "timeout_ms must be > 0".to_string(),
        ));
    }

    if config.redirect_limit > MAX_REDIRECT_LIMIT {
        return Err(ConfigError::Validation(format!(
            "redirect_limit must be <= {}, got {}",
            MAX_REDIRECT_LIMIT, config.redirect_limit
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    for agent in &config.user_agents {
        if agent.trim().is_empty() || HeaderValue::from_str(agent).is_err() {
            return Err(ConfigError::Validation(format!(
                "Invalid entry in user_agents: {:?}",
                agent
            )));
        }
    }

    if let Some(proxy) = &config.proxy {
        Url::parse(proxy)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid proxy '{}': {}", proxy, e)))?;
    }

    for (name, value) in &config.headers {
        HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
            ConfigError::Validation(format!("Invalid header name '{}'", name))
        })?;
        HeaderValue::from_str(value).map_err(|_| {
            ConfigError::Validation(format!("Invalid value for header '{}'", name))
        })?;
    }

    Ok(())
}

/// Validates retry policy configuration
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 || config.max_attempts > MAX_ATTEMPTS {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be between 1 and {}, got {}",
            MAX_ATTEMPTS, config.max_attempts
        )));
    }

    if config.backoff_max_ms < config.backoff_base_ms {
        return Err(ConfigError::Validation(format!(
            "backoff_max_ms ({}) must be >= backoff_base_ms ({})",
            config.backoff_max_ms, config.backoff_base_ms
        )));
    }

    for kind in &config.retry_on {
        if matches!(kind, OutcomeKind::InvalidUrl | OutcomeKind::Cancelled) {
            return Err(ConfigError::Validation(format!(
                "retry_on cannot contain '{}'",
                kind
            )));
        }
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    for code in config.match_codes.iter().chain(config.exclude_codes.iter()) {
        if !(100..=599).contains(code) {
            return Err(ConfigError::Validation(format!(
                "status code filters must be between 100 and 599, got {}",
                code
            )));
        }
    }

    if let Some(path) = &config.summary_path {
        if path.is_empty() {
            return Err(ConfigError::Validation(
                "summary_path cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}
