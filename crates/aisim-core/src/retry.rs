use std::future::Future;
use std::time::Duration;

use crate::error::Result;

/// Run `op`, retrying transient failures up to `max_retries` more times.
///
/// The wait before retry `n` (0-based) is `base_delay_ms * 2^n`. Errors that
/// are not transient come back on the first failure.
pub async fn with_retry<F, Fut, T>(max_retries: usize, base_delay_ms: u64, op: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut retries = 0usize;
    loop {
        let err = match op().await {
            Ok(val) => return Ok(val),
            Err(e) => e,
        };
        if retries >= max_retries || !err.is_transient() {
            return Err(err);
        }
        let delay = backoff_delay(base_delay_ms, retries);
        tracing::warn!(
            retry = retries + 1,
            max_retries,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "transient model error, retrying"
        );
        tokio::time::sleep(delay).await;
        retries += 1;
    }
}

fn backoff_delay(base_delay_ms: u64, retry: usize) -> Duration {
    let factor = 1u64.checked_shl(retry as u32).unwrap_or(u64::MAX);
    Duration::from_millis(base_delay_ms.saturating_mul(factor))
}
