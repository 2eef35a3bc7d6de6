//! Host pattern matching for mirror endpoints.
//!
//! A pattern is matched against an image reference's registry host. Supported
//! forms: exact `host[:port]`, and a single leading wildcard segment
//! (`*.example.com`) matching any subdomain of the remainder but not the
//! remainder itself. A pattern without a port matches any port on that host.

/// Pattern syntax errors, reported when the mirror resolver is built.
#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("empty pattern")]
    Empty,

    #[error("pattern \"{0}\" has more than one wildcard")]
    MultipleWildcards(String),

    #[error("pattern \"{0}\": wildcard must be a leading \"*.\" segment")]
    WildcardPosition(String),

    #[error("pattern \"{0}\": nothing follows the wildcard segment")]
    EmptyRemainder(String),
}

/// Check that a pattern is syntactically valid.
pub fn validate(pattern: &str) -> Result<(), PatternError> {
    if pattern.is_empty() {
        return Err(PatternError::Empty);
    }
    let wildcards = pattern.matches('*').count();
    if wildcards > 1 {
        return Err(PatternError::MultipleWildcards(pattern.to_string()));
    }
    if wildcards == 1 {
        if !pattern.starts_with("*.") {
            return Err(PatternError::WildcardPosition(pattern.to_string()));
        }
        if pattern.len() == 2 {
            return Err(PatternError::EmptyRemainder(pattern.to_string()));
        }
    }
    Ok(())
}

/// Whether `host` matches `pattern`. Total: malformed input never panics,
/// it just fails to match.
///
/// The host portion is compared case-insensitively; a path suffix in the
/// pattern (after the first `/`) is compared case-sensitively and exactly.
pub fn matches(pattern: &str, host: &str) -> bool {
    if pattern.is_empty() || host.is_empty() {
        return false;
    }

    let (pattern_authority, pattern_path) = split_path(pattern);
    let (host_authority, host_path) = split_path(host);

    // Path segments, if the pattern has any, must match exactly.
    if pattern_path.is_some() && pattern_path != host_path {
        return false;
    }

    let (pattern_host, pattern_port) = split_port(pattern_authority);
    let (host_host, host_port) = split_port(host_authority);

    // A port in the pattern pins the port; no port matches any port.
    if let Some(port) = pattern_port {
        if host_port != Some(port) {
            return false;
        }
    }

    let pattern_host = pattern_host.to_ascii_lowercase();
    let host_host = host_host.to_ascii_lowercase();

    if let Some(remainder) = pattern_host.strip_prefix("*.") {
        // Any subdomain of the remainder, never the remainder itself.
        match host_host.split_once('.') {
            Some((label, rest)) => !label.is_empty() && rest == remainder,
            None => false,
        }
    } else {
        pattern_host == host_host
    }
}

/// Number of literal (non-wildcard) characters in the pattern. A pattern
/// with more literal characters is considered more specific.
pub fn specificity(pattern: &str) -> usize {
    pattern.chars().filter(|c| *c != '*').count()
}

/// Whether the pattern contains a wildcard segment.
pub fn is_wildcard(pattern: &str) -> bool {
    pattern.starts_with("*.")
}

/// Split `host[:port][/path]` into the authority and an optional path.
fn split_path(s: &str) -> (&str, Option<&str>) {
    match s.split_once('/') {
        Some((authority, path)) => (authority, Some(path)),
        None => (s, None),
    }
}

/// Split `host[:port]` into host and optional port. The suffix after the
/// last colon is only treated as a port when it is all digits.
fn split_port(authority: &str) -> (&str, Option<&str>) {
    match authority.rsplit_once(':') {
        Some((host, port))
            if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) =>
        {
            (host, Some(port))
        }
        _ => (authority, None),
    }
}
