//! Retry policy shared by the Motion and Slack clients.
//!
//! Transient failures consume a fixed attempt budget with exponential
//! backoff. Rate limiting waits out the cool-down and retries without
//! consuming the budget.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::error::ApiError;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total calls allowed for transient failures, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each subsequent retry.
    pub base_delay: Duration,
    /// Cool-down after a rate-limit response without a Retry-After header.
    pub throttle_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            throttle_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Backoff before the given retry (1-based): base, 2x base, 4x base...
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(retry.saturating_sub(1))
    }
}

/// Run `call` under the policy until it succeeds, fails hard, or exhausts
/// the attempt budget.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut call: F,
) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut failures = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(ApiError::Throttled { retry_after }) => {
                let wait = retry_after
                    .map(Duration::from_secs)
                    .unwrap_or(policy.throttle_delay);
                tracing::warn!(
                    "{}: rate limited, waiting {}s before retrying...",
                    operation,
                    wait.as_secs()
                );
                sleep(wait).await;
            }
            Err(err) if err.is_transient() => {
                failures += 1;
                if failures >= policy.max_attempts {
                    tracing::error!(
                        "{} failed (attempt {}/{}): {}",
                        operation,
                        failures,
                        policy.max_attempts,
                        err
                    );
                    return Err(err);
                }
                let delay = policy.backoff_delay(failures);
                tracing::warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {:?}",
                    operation,
                    failures,
                    policy.max_attempts,
                    err,
                    delay
                );
                sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
