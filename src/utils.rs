use std::collections::HashSet;
use std::future::Future;

use tokio::time::{sleep, Duration};
use tracing::warn;

use crate::dynamodb::error::{Error, Result};

/// Store error codes that indicate a transient overload.
pub const PROVISIONED_THROUGHPUT_EXCEEDED: &str = "ProvisionedThroughputExceededException";
pub const THROTTLING: &str = "ThrottlingException";

/// How a failed store call is retried.
///
/// The delay before retry `n` (counting from zero) is
/// `base_delay * backoff_exponent^n`, with no jitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub backoff_exponent: u32,
    pub retryable_error_codes: HashSet<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            backoff_exponent: 2,
            retryable_error_codes: HashSet::from([
                PROVISIONED_THROUGHPUT_EXCEEDED.to_string(),
                THROTTLING.to_string(),
            ]),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_exponent.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor)
    }

    pub fn is_retryable(&self, err: &Error) -> bool {
        match err {
            Error::Store(store) => store
                .code()
                .is_some_and(|code| self.retryable_error_codes.contains(code)),
            _ => false,
        }
    }
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// the policy's retries are used up.
///
/// Non-retryable errors are returned as they are, without sleeping. When a
/// retryable error persists past `max_retries`, the last store error is
/// wrapped in [`Error::RetryExhausted`].
pub async fn retry_with_backoff<T, Fut, F>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if !policy.is_retryable(&e) => return Err(e),
            Err(Error::Store(e)) if attempt >= policy.max_retries => {
                return Err(Error::RetryExhausted {
                    attempts: attempt + 1,
                    source: e,
                })
            }
            Err(e) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    "Operation failed: {}. Retrying in {:?} (attempt {}/{})",
                    e,
                    delay,
                    attempt + 1,
                    policy.max_retries
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
