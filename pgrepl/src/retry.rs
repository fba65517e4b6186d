use std::future::Future;
use std::time::Duration;

use pgrepl_config::shared::RetryConfig;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{ErrorKind, ProviderError, ProviderResult};
use crate::provider_error;

/// Failure of a single attempt, tagged with whether another attempt may succeed.
#[derive(Debug)]
pub enum RetryError {
    /// The attempt failed in a way that may resolve by itself, e.g. a slot still in use.
    Retryable(ProviderError),
    /// The attempt failed in a way no retry will fix.
    Permanent(ProviderError),
}

/// Runs `operation` until it succeeds, fails permanently, or `timeout` elapses.
///
/// Retries are spaced with exponential backoff following `config`, never sleeping past
/// the deadline. When the deadline passes, the returned error aggregates a
/// [`ErrorKind::Timeout`] error with the last failure. A `timeout` too large to be
/// represented as a deadline retries without one.
pub async fn retry_until<T, F, Fut>(
    timeout: Duration,
    config: &RetryConfig,
    mut operation: F,
) -> ProviderResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RetryError>>,
{
    let deadline = Instant::now().checked_add(timeout);
    let max_delay = Duration::from_millis(config.max_delay_ms);
    let mut delay = Duration::from_millis(config.initial_delay_ms).min(max_delay);
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        let err = match operation().await {
            Ok(value) => {
                debug!(attempt, "operation succeeded");

                return Ok(value);
            }
            Err(RetryError::Permanent(err)) => return Err(err),
            Err(RetryError::Retryable(err)) => err,
        };

        let now = Instant::now();
        if deadline.is_some_and(|deadline| now >= deadline) {
            let timeout_err = provider_error!(
                ErrorKind::Timeout,
                "Operation did not succeed before the timeout",
                format!("gave up after {attempt} attempts in {timeout:?}")
            );

            return Err(ProviderError::many(vec![timeout_err, err]));
        }

        let sleep_for = match deadline {
            Some(deadline) => delay.min(deadline - now),
            None => delay,
        };
        warn!(attempt, ?sleep_for, error = %err, "operation failed, retrying");
        tokio::time::sleep(sleep_for).await;

        delay = next_delay(delay, config.backoff_factor, max_delay);
    }
}

/// Applies `backoff_factor` to `delay`, saturating at `max_delay`.
fn next_delay(delay: Duration, backoff_factor: f32, max_delay: Duration) -> Duration {
    Duration::try_from_secs_f32(delay.as_secs_f32() * backoff_factor)
        .map_or(max_delay, |next| next.min(max_delay))
}
