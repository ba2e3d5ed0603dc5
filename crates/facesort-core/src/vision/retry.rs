//! Retry policy for vision backend calls.
//!
//! Unlike a typical backoff curve, the specification calls for a flat linear
//! delay between attempts rather than an exponential one — event-day vision
//! calls are rate-limited on a short, predictable window, so doubling the
//! wait on every attempt only adds latency without improving odds.

use crate::error::VisionError;
use std::future::Future;
use std::time::Duration;

/// Determine whether a vision error is worth retrying.
///
/// Retryable: timeouts, rate limits (429), server errors (5xx), and
/// transport-level failures with no status code (DNS, connection reset).
/// Never retried: auth, quota, and malformed-request errors, since retrying
/// would just repeat the same failure.
pub fn is_retryable(error: &VisionError) -> bool {
    match error {
        VisionError::Timeout { .. } => true,
        VisionError::Http { status_code, .. } => match status_code {
            Some(code) => *code == 429 || (500..=599).contains(code),
            None => true,
        },
        VisionError::Auth(_) | VisionError::Quota(_) | VisionError::InvalidArgument(_) => false,
        VisionError::Parse(_) => false,
    }
}

/// Linear backoff: the same delay before every retry.
pub fn backoff_duration(delay_secs: u64) -> Duration {
    Duration::from_secs(delay_secs)
}

/// Run `f` up to `attempts + 1` times (1 initial try plus `attempts` retries),
/// sleeping `delay_secs` between non-fatal failures.
pub async fn with_retry<T, F, Fut>(
    attempts: u32,
    delay_secs: u64,
    mut f: F,
) -> Result<T, VisionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, VisionError>>,
{
    let mut last_error = None;
    for attempt in 0..=attempts {
        if attempt > 0 {
            tokio::time::sleep(backoff_duration(delay_secs)).await;
        }
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                let retryable = is_retryable(&e);
                last_error = Some(e);
                if !retryable {
                    break;
                }
            }
        }
    }
    Err(last_error.expect("at least one attempt always runs"))
}
