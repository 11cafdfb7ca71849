use std::net::IpAddr;

/// Returns the host portion of a scheme-less input line
///
/// Strips any path, query or port so `api.example.com:8443/health` yields
/// `api.example.com`. Bracketed IPv6 literals keep their address only.
///
/// # Examples
///
/// ```
/// use livehttpx::url::split_host;
///
/// assert_eq!(split_host("example.com/path"), "example.com");
/// assert_eq!(split_host("example.com:8080"), "example.com");
/// assert_eq!(split_host("[::1]:8080/x"), "::1");
/// ```
pub fn split_host(line: &str) -> &str {
    let authority = line
        .split(|c| c == '/' || c == '?' || c == '#')
        .next()
        .unwrap_or("");

    if let Some(rest) = authority.strip_prefix('[') {
        return rest.split(']').next().unwrap_or("");
    }

    authority.split(':').next().unwrap_or("")
}

/// Checks whether a string is a literal IPv4 or IPv6 address
pub fn is_ip_address(host: &str) -> bool {
    host.parse::<IpAddr>().is_ok()
}

/// Checks whether a string is a syntactically valid DNS hostname
///
/// Requires at least two labels, each 1-63 characters of ASCII alphanumerics
/// or hyphens that neither start nor end with a hyphen, and an alphabetic
/// top-level label of at least two characters.
pub fn is_valid_hostname(host: &str) -> bool {
    let host = host.strip_suffix('.').unwrap_or(host);
    if host.is_empty() || host.len() > 253 {
        return false;
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 {
        return false;
    }

    for label in &labels {
        if label.is_empty() || label.len() > 63 {
            return false;
        }
        if label.starts_with('-') || label.ends_with('-') {
            return false;
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return false;
        }
    }

    // Labels is non-empty (checked above)
    let tld = labels[labels.len() - 1];
    tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic())
}
