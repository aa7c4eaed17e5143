use std::time::Duration;

pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
}

pub(crate) fn retry_delay(
    base_delay_ms: u64,
    attempt: usize,
    retry_after_seconds: Option<u64>,
) -> Duration {
    if let Some(retry_after_seconds) = retry_after_seconds {
        return Duration::from_secs(retry_after_seconds);
    }
    let exponent = attempt.saturating_sub(1).min(6) as u32;
    Duration::from_millis(base_delay_ms.max(1).saturating_mul(2_u64.pow(exponent)))
}

pub(crate) fn is_retryable_slack_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

pub(crate) fn is_retryable_transport_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request() || error.is_body()
}

pub(crate) fn truncate_for_error(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let mut truncated: String = value.chars().take(max_chars).collect();
    truncated.push_str("...");
    truncated
}
