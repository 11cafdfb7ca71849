//! URL handling module for livehttpx
//!
//! This module provides input line normalization, bare-host detection and the
//! syntactic validation every task passes before any network call is made.

mod host;
mod normalize;

use crate::UrlError;
use url::Url;

// Re-export main functions
pub use host::{is_ip_address, is_valid_hostname, split_host};
pub use normalize::{expand_line, DefaultScheme};

/// Validates a task URL before it is probed
///
/// A URL is probeable when it parses, uses the `http` or `https` scheme and
/// carries a non-empty host. Anything else is classified as an invalid URL
/// without touching the network.
///
/// # Arguments
///
/// * `raw` - The task URL string
///
/// # Returns
///
/// * `Ok(Url)` - The parsed URL, ready to hand to a probe executor
/// * `Err(UrlError)` - Why the URL was rejected
///
/// # Examples
///
/// ```
/// use livehttpx::url::validate_probe_url;
///
/// assert!(validate_probe_url("https://example.com").is_ok());
/// assert!(validate_probe_url("not-a-url").is_err());
/// assert!(validate_probe_url("ftp://example.com").is_err());
/// ```
pub fn validate_probe_url(raw: &str) -> Result<Url, UrlError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(UrlError::Empty);
    }

    let url = Url::parse(raw).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(UrlError::MissingHost),
    }
}
