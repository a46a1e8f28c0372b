//! Timeout and bounded retry for remote capability calls.
//!
//! Every attempt is bounded by a timeout. Failures that are retryable
//! (provider errors, including timeouts) are retried with exponential
//! backoff until the attempt budget is spent; anything else returns
//! immediately.

use askroute_core::config::{RetrySettings, TimeoutSettings};
use askroute_core::{AppError, AppResult};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry budget and per-attempt time limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,

    /// Backoff after the first failure; doubled for each further attempt
    pub initial_backoff: Duration,

    /// Upper bound for a single attempt
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Build the policy used for provider calls from configuration.
    pub fn from_settings(retry: &RetrySettings, timeouts: &TimeoutSettings) -> Self {
        Self {
            max_attempts: retry.max_attempts.max(1),
            initial_backoff: Duration::from_millis(retry.initial_backoff_ms),
            timeout: timeouts.provider(),
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn single_attempt(timeout: Duration) -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            timeout,
        }
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2_u32.saturating_pow(attempt.saturating_sub(1)))
    }

    /// Run `op` under this policy.
    ///
    /// `operation` names the call in logs and in the timeout error message.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let outcome = match tokio::time::timeout(self.timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(AppError::Provider(format!(
                    "{} timed out after {:.1}s",
                    operation,
                    self.timeout.as_secs_f64()
                ))),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let backoff = self.backoff_for(attempt);
                    warn!(
                        "{} failed (attempt {}/{}), retrying in {}ms: {}",
                        operation,
                        attempt,
                        max_attempts,
                        backoff.as_millis(),
                        e
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use askroute_core::ErrorKind;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            timeout: Duration::from_millis(200),
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = fast_policy(3)
            .run("generate", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(AppError::Provider("connection reset".into()))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_budget() {
        let calls = AtomicU32::new(0);
        let result: AppResult<()> = fast_policy(2)
            .run("embed", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AppError::Provider("503".into()))
            })
            .await;

        assert_eq!(result.unwrap_err().kind(), ErrorKind::Provider);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_validation_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: AppResult<()> = fast_policy(5)
            .run("classify", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AppError::Validation("bad label".into()))
            })
            .await;

        assert_eq!(result.unwrap_err().kind(), ErrorKind::Validation);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_provider_error() {
        let policy = RetryPolicy {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            timeout: Duration::from_millis(10),
        };
        let result: AppResult<()> = policy
            .run("generate", || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Provider);
        assert!(err.to_string().contains("generate timed out"));
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(100),
            timeout: Duration::from_secs(1),
        };
        assert_eq!(policy.backoff_for(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(400));
    }
}
