use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch, the unit `time_obtained` is stored in.
pub fn epoch_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// Out-of-range values from the request body saturate rather than overflow.
pub fn is_token_expired(time_obtained: i64, expires_in: i64, now: i64) -> bool {
    now > time_obtained.saturating_add(expires_in.saturating_mul(1000))
}
