//! Normalizes connectivity errors into short, stable categories for reports
//! and alert text.

use std::io;

pub const CONNECTION_TIMEOUT: &str = "connection timeout";
pub const NAME_LOOKUP_FAILED: &str = "name lookup failed";
pub const CONNECTION_RESET: &str = "connection reset";
pub const CONNECTION_REFUSED: &str = "connection refused";
pub const TOO_MANY_PEERS: &str = "too many peers? (EOF)";
pub const TOO_SLOW: &str = "too slow to respond";

/// Maps an error message onto a category by matching its tail. Messages that
/// match nothing are returned unchanged.
pub fn normalize_message(message: &str) -> String {
    let lower = message.to_lowercase();
    let tail = match lower.rfind(" (os error") {
        Some(idx) => &lower[..idx],
        None => lower.as_str(),
    };
    let tail = tail.trim_end_matches(|c: char| c == '.' || c.is_whitespace());

    let category = if tail.ends_with("timeout")
        || tail.ends_with("timed out")
        || tail.contains("operation timed out")
    {
        Some(CONNECTION_TIMEOUT)
    } else if tail.ends_with("no such host")
        || lower.contains("failed to lookup address")
        || lower.contains("name or service not known")
        || lower.contains("dns error")
    {
        Some(NAME_LOOKUP_FAILED)
    } else if tail.ends_with("connection reset by peer") || lower.contains("connection reset") {
        Some(CONNECTION_RESET)
    } else if tail.ends_with("connection refused") {
        Some(CONNECTION_REFUSED)
    } else {
        None
    };

    category.map(str::to_string).unwrap_or_else(|| message.to_string())
}

/// Classifies an I/O error by kind first, falling back to its message.
pub fn normalize_io(err: &io::Error) -> String {
    match err.kind() {
        io::ErrorKind::TimedOut => CONNECTION_TIMEOUT.to_string(),
        io::ErrorKind::ConnectionReset => CONNECTION_RESET.to_string(),
        io::ErrorKind::ConnectionRefused => CONNECTION_REFUSED.to_string(),
        io::ErrorKind::UnexpectedEof => TOO_MANY_PEERS.to_string(),
        _ => normalize_message(&err.to_string()),
    }
}

/// Classifies a reqwest error. The full source chain is rendered because the
/// interesting part (DNS, refused, reset) is usually at the bottom of it.
pub fn normalize_reqwest(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        return CONNECTION_TIMEOUT.to_string();
    }

    let mut rendered = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        if let Some(io_err) = inner.downcast_ref::<io::Error>() {
            let category = normalize_io(io_err);
            if category != io_err.to_string() {
                return category;
            }
        }
        rendered = format!("{}: {}", rendered, inner);
        source = inner.source();
    }

    normalize_message(&rendered)
}
