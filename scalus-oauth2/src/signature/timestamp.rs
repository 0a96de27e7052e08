//! Replay window for signed callbacks

/// Name of the callback parameter carrying the signing time (Unix seconds)
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Whether a callback timestamp falls outside the replay window
///
/// A missing or non-numeric timestamp counts as expired. A timestamp exactly
/// `max_age_secs` old is still accepted.
#[must_use]
pub fn is_expired(timestamp: Option<&str>, now: i64, max_age_secs: i64) -> bool {
    timestamp
        .and_then(|raw| raw.parse::<i64>().ok())
        .is_none_or(|signed_at| now.saturating_sub(signed_at) > max_age_secs)
}
