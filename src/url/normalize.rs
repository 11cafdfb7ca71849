use super::host::{is_ip_address, is_valid_hostname, split_host};
use serde::Deserialize;

/// Scheme prefixed to bare host lines
///
/// `Both` probes `http://` first and falls back to `https://` when the plain
/// scheme cannot be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DefaultScheme {
    Http,
    Https,
    Both,
}

impl DefaultScheme {
    /// Returns the scheme tried first, without separator
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http | Self::Both => "http",
            Self::Https => "https",
        }
    }

    /// Returns the scheme tried when the first one is unreachable
    pub fn fallback(&self) -> Option<&'static str> {
        match self {
            Self::Both => Some("https"),
            Self::Http | Self::Https => None,
        }
    }
}

/// Normalizes one input line into a task URL and its fallback, if any
///
/// # Normalization Steps
///
/// 1. Trim surrounding whitespace
/// 2. Lines that already carry a scheme (`://`) are returned as-is
/// 3. Without a default scheme, the trimmed line is returned unchanged
/// 4. A leading `*.` wildcard is dropped (subdomain list exports use it)
/// 5. If the remaining host is a valid hostname or IP literal, the default
///    scheme is prefixed; otherwise the trimmed line is kept so validation
///    classifies it as invalid
///
/// Only bare host lines get a fallback, and only with [`DefaultScheme::Both`].
///
/// # Examples
///
/// ```
/// use livehttpx::url::{expand_line, DefaultScheme};
///
/// assert_eq!(
///     expand_line("  api.example.com/health ", Some(DefaultScheme::Https)),
///     ("https://api.example.com/health".to_string(), None)
/// );
/// assert_eq!(
///     expand_line("example.com", Some(DefaultScheme::Both)),
///     ("http://example.com".to_string(), Some("https://example.com".to_string()))
/// );
/// assert_eq!(expand_line("not-a-url", Some(DefaultScheme::Https)).0, "not-a-url");
/// assert_eq!(expand_line("example.com", None).0, "example.com");
/// ```
pub fn expand_line(line: &str, default_scheme: Option<DefaultScheme>) -> (String, Option<String>) {
    let trimmed = line.trim();

    if trimmed.contains("://") {
        return (trimmed.to_string(), None);
    }

    let scheme = match default_scheme {
        Some(scheme) => scheme,
        None => return (trimmed.to_string(), None),
    };

    let bare = trimmed.strip_prefix("*.").unwrap_or(trimmed);
    let host = split_host(bare);

    if is_valid_hostname(host) || is_ip_address(host) || bare.starts_with('[') {
        let primary = format!("{}://{}", scheme.as_str(), bare);
        let fallback = scheme
            .fallback()
            .map(|fallback| format!("{}://{}", fallback, bare));
        (primary, fallback)
    } else {
        (trimmed.to_string(), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize_line(line: &str, default_scheme: Option<DefaultScheme>) -> String {
        expand_line(line, default_scheme).0
    }

    #[test]
    fn test_keeps_full_urls() {
        assert_eq!(
            normalize_line("https://example.com/a", Some(DefaultScheme::Http)),
            "https://example.com/a"
        );
        assert_eq!(
            normalize_line("ftp://example.com", Some(DefaultScheme::Https)),
            "ftp://example.com"
        );
    }

    #[test]
    fn test_no_default_scheme_only_trims() {
        assert_eq!(normalize_line("  example.com\t", None), "example.com");
        assert_eq!(normalize_line("", None), "");
    }

    #[test]
    fn test_prefixes_bare_hosts() {
        assert_eq!(
            normalize_line("example.com", Some(DefaultScheme::Https)),
            "https://example.com"
        );
        assert_eq!(
            normalize_line("10.0.0.1:8080", Some(DefaultScheme::Http)),
            "http://10.0.0.1:8080"
        );
        assert_eq!(
            normalize_line("[::1]:8080", Some(DefaultScheme::Http)),
            "http://[::1]:8080"
        );
    }

    #[test]
    fn test_strips_wildcard() {
        assert_eq!(
            normalize_line("*.example.com", Some(DefaultScheme::Https)),
            "https://example.com"
        );
    }

    #[test]
    fn test_leaves_garbage_alone() {
        assert_eq!(
            normalize_line("not-a-url", Some(DefaultScheme::Https)),
            "not-a-url"
        );
        assert_eq!(normalize_line("   ", Some(DefaultScheme::Https)), "");
    }

    #[test]
    fn test_both_schemes() {
        assert_eq!(
            expand_line("api.example.com/health", Some(DefaultScheme::Both)),
            (
                "http://api.example.com/health".to_string(),
                Some("https://api.example.com/health".to_string())
            )
        );
        assert_eq!(
            expand_line("https://example.com", Some(DefaultScheme::Both)),
            ("https://example.com".to_string(), None)
        );
        assert_eq!(
            expand_line("not-a-url", Some(DefaultScheme::Both)),
            ("not-a-url".to_string(), None)
        );
        assert_eq!(
            expand_line("example.com", Some(DefaultScheme::Https)),
            ("https://example.com".to_string(), None)
        );
    }
}
