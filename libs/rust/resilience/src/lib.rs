//! Retry for transport-level failures.
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Attempts after the first one.
    pub max_retries: usize,
    /// Pause before each retry.
    pub delay: Duration,
}

impl Default for RetryConfig { fn default() -> Self { Self::fixed(3, Duration::from_millis(50)) } }

impl RetryConfig {
    pub fn fixed(max_retries: usize, delay: Duration) -> Self { Self { max_retries, delay } }
}

/// Run `op` until it succeeds, `should_retry` rejects the error, or
/// `max_retries` extra attempts are spent. `op` receives the attempt index.
pub async fn retry_async<F, Fut, T, E, P>(cfg: &RetryConfig, mut op: F, should_retry: P) -> Result<T, E>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(v) => return Ok(v),
            Err(e) if attempt >= cfg.max_retries || !should_retry(&e) => return Err(e),
            Err(e) => {
                warn!(attempt, error=%e, delay_ms=cfg.delay.as_millis() as u64, "retrying_after_transport_error");
                tokio::time::sleep(cfg.delay).await;
            }
        }
        attempt += 1;
    }
}
