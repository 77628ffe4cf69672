//! Duration parsing utilities.
//!
//! This module provides parsing for human-readable duration strings
//! like "500ms", "30s", "15m", "12h", "30d".

use std::time::Duration;

/// Parse a duration string like "30s", "15m", "12h", "30d".
///
/// Supported formats:
/// - `"Nms"` - N milliseconds (e.g., "500ms")
/// - `"Ns"` - N seconds (e.g., "30s")
/// - `"Nm"` - N minutes (e.g., "5m")
/// - `"Nh"` - N hours (e.g., "12h")
/// - `"Nd"` - N days (e.g., "30d")
/// - `"N"` - N seconds (no suffix, assumes seconds)
///
/// Returns `None` if the string cannot be parsed.
///
/// # Examples
///
/// ```
/// use port_selector::config::parse_duration_string;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration_string("5s"), Some(Duration::from_secs(5)));
/// assert_eq!(parse_duration_string("1m"), Some(Duration::from_secs(60)));
/// assert_eq!(parse_duration_string("2h"), Some(Duration::from_secs(7200)));
/// assert_eq!(parse_duration_string("30d"), Some(Duration::from_secs(30 * 86400)));
/// ```
pub fn parse_duration_string(s: &str) -> Option<Duration> {
    let s = s.trim();

    if s.is_empty() {
        return None;
    }

    if let Some(n) = s.strip_suffix("ms") {
        n.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(n) = s.strip_suffix('s') {
        n.parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(n) = s.strip_suffix('m') {
        scaled(n, 60)
    } else if let Some(n) = s.strip_suffix('h') {
        scaled(n, 3600)
    } else if let Some(n) = s.strip_suffix('d') {
        scaled(n, 86400)
    } else {
        // Default to seconds if no suffix
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

fn scaled(n: &str, unit_secs: u64) -> Option<Duration> {
    n.parse::<u64>()
        .ok()
        .and_then(|v| v.checked_mul(unit_secs))
        .map(Duration::from_secs)
}
