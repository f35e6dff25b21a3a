use std::future::Future;

use crate::config::RetryPolicy;
use crate::error::ExternalError;

/// Run `op` up to `policy.attempts` times, sleeping between attempts.
///
/// The delay starts at `policy.initial_delay` and doubles after each failure.
/// Only transient errors are retried; anything else is returned at once.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, ExternalError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ExternalError>>,
{
    let attempts = policy.attempts.max(1);
    let mut delay = policy.initial_delay;

    for attempt in 1..=attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < attempts => {
                tracing::info!(
                    call = label,
                    attempt,
                    backoff_ms = delay.as_millis() as u64,
                    error = %e,
                    "retrying after transient error"
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(e) => return Err(e),
        }
    }

    Err(ExternalError::Transport(format!(
        "{}: retries exhausted",
        label
    )))
}
