//! `src/backend/retry.rs`
//!
//! Retry loop for transient backend failures.

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{
    config::RetryPolicy,
    error::{CoreError, CoreResult},
};

/// Run `op` until it succeeds, fails permanently, or the policy runs out.
///
/// Only [`CoreError::is_transient`] failures are retried. When retries were
/// attempted and all failed the result is [`CoreError::RetriesExhausted`].
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    location: &str,
    cancel: &CancellationToken,
    mut op: F,
) -> CoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CoreResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt: u32 = 1;

    loop {
        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }

        match op().await {
            Ok(value) => return Ok(value),

            Err(err) if err.is_transient() && attempt < max_attempts => {
                attempt += 1;
                let delay = policy.backoff_for(attempt);

                warn!(
                    marker = "BACKEND_RETRY",
                    operation_type = "retry",
                    location = location,
                    attempt = attempt,
                    delay_ms = delay.as_millis(),
                    error = %err,
                    "Transient backend failure, retrying"
                );

                tokio::select! {
                    () = cancel.cancelled() => return Err(CoreError::Cancelled),
                    () = tokio::time::sleep(delay) => {}
                }
            }

            Err(err) if err.is_transient() && attempt > 1 => {
                return Err(CoreError::RetriesExhausted {
                    location: location.into(),
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            Err(err) => return Err(err),
        }
    }
}
