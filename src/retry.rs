//! Retry classification and exponential backoff.

use std::time::Duration;

/// Backoff ceiling for the request engine.
pub const MAX_ENGINE_BACKOFF: Duration = Duration::from_millis(8_000);

/// Statuses worth retrying besides the generic 5xx range.
const RETRYABLE_STATUSES: [u16; 7] = [408, 409, 429, 502, 503, 504, 524];

/// Whether a response status is transient.
///
/// Retryable: request timeout, conflict, rate limit and every server error.
pub fn is_retryable_status(status: u16) -> bool {
    RETRYABLE_STATUSES.contains(&status) || status >= 500
}

/// Whether the engine should retry a failed attempt.
pub fn should_retry(status: Option<u16>, retries: u32, max_retries: u32) -> bool {
    if retries >= max_retries {
        return false;
    }
    status.is_some_and(is_retryable_status)
}

/// `min(2^retries * 1000ms, cap)`.
pub fn backoff_delay(retries: u32, cap: Duration) -> Duration {
    let delay = 1_000u64.saturating_mul(2u64.saturating_pow(retries));
    Duration::from_millis(delay).min(cap)
}
