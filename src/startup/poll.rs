use std::time::Duration;

const ENABLE_LOGS: bool = true;

use crate::log_debug;

/// Checks `check` immediately, then up to `max_attempts` more times with `interval`
/// sleeps in between. Returns the first value produced, or `None` once attempts run out.
///
/// Used to wait on values that third-party SDKs fill in from their own callbacks.
pub async fn poll_until<T, F>(interval: Duration, max_attempts: u32, mut check: F) -> Option<T>
where
    F: FnMut() -> Option<T>,
{
    if let Some(value) = check() {
        return Some(value);
    }

    for attempt in 1..=max_attempts {
        tokio::time::sleep(interval).await;
        if let Some(value) = check() {
            log_debug!("poll satisfied on attempt {attempt}/{max_attempts}");
            return Some(value);
        }
    }

    log_debug!(
        "poll gave up after {max_attempts} attempts ({}ms)",
        interval.as_millis() * u128::from(max_attempts)
    );
    None
}
