/// Returns the current Unix timestamp in milliseconds.
pub fn current_unix_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

/// Returns the current Unix timestamp in seconds.
pub fn current_unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Returns true when `event_unix` is older than `max_age_seconds`.
///
/// A zero event timestamp means the event carried no usable timestamp and is
/// never treated as stale.
pub fn is_stale_unix(event_unix: u64, now_unix: u64, max_age_seconds: u64) -> bool {
    if event_unix == 0 {
        return false;
    }
    now_unix.saturating_sub(event_unix) > max_age_seconds
}
