//! Bounded polling for eventually consistent reads.
//!
//! Some NerdGraph mutations return before the new object is visible to list
//! queries. [`poll_until`] keeps calling an operation until it succeeds, fails
//! permanently, or the timeout elapses.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::error::ProviderError;

/// Delay between polling attempts.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Classification of a failed polling attempt.
#[derive(Debug)]
pub enum RetryError {
    /// The condition is not met yet; try again.
    Retryable(ProviderError),
    /// Give up immediately.
    NonRetryable(ProviderError),
}

impl RetryError {
    /// Retryable error with a plain message.
    pub fn retryable(msg: impl Into<String>) -> Self {
        Self::Retryable(ProviderError::NotFound(msg.into()))
    }
}

/// Call `op` until it returns `Ok`, a non-retryable error, or `timeout` elapses.
///
/// On timeout the last retryable error is reported as
/// [`ProviderError::DeadlineExceeded`].
pub async fn poll_until<T, F, Fut>(
    timeout: Duration,
    interval: Duration,
    mut op: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RetryError>>,
{
    let deadline = Instant::now() + timeout;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(RetryError::NonRetryable(err)) => return Err(err),
            Err(RetryError::Retryable(err)) => {
                let now = Instant::now();
                if now + interval > deadline {
                    return Err(ProviderError::DeadlineExceeded(format!(
                        "timeout after {:?} ({} attempts): {}",
                        timeout,
                        attempt,
                        err.message()
                    )));
                }
                debug!(attempt, error = %err, "condition not met yet, retrying");
                sleep(interval).await;
            },
        }
    }
}
