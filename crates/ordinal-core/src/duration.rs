//! Human-readable duration strings ("500ms", "5s", "2m", "1h").

use std::time::Duration;

/// Parse a duration string like "5s", "500ms", "2m" or "1h".
///
/// A bare number is taken as seconds. Returns `None` for anything else,
/// including values too large to represent.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        return ms.trim().parse::<u64>().ok().map(Duration::from_millis);
    }
    if let Some(secs) = s.strip_suffix('s') {
        return secs.trim().parse::<u64>().ok().map(Duration::from_secs);
    }
    if let Some(mins) = s.strip_suffix('m') {
        return mins
            .trim()
            .parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs);
    }
    if let Some(hours) = s.strip_suffix('h') {
        return hours
            .trim()
            .parse::<u64>()
            .ok()
            .and_then(|h| h.checked_mul(3600))
            .map(Duration::from_secs);
    }
    s.parse::<u64>().ok().map(Duration::from_secs)
}
