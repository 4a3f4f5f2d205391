//! Bridge dial retry with exponential backoff.
//!
//! Only the initial socket dial is retried. Message sends are never retried
//! here; the caller decides.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Backoff schedule for a retried operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 = try once)
    pub max_retries: u32,
    /// Delay before the first retry; doubles on every retry
    pub base_delay: Duration,
    /// Upper bound for a single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based): base * 2^attempt, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Retry an async operation with exponential backoff.
///
/// # Arguments
///
/// * `policy` - Retry budget and delays
/// * `operation` - The async operation to retry (e.g., a socket dial)
/// * `is_retryable` - Function to determine if error is transient and retryable
///
/// # Returns
///
/// Result of the operation, or the last error after all retries exhausted.
pub async fn retry_with_backoff<F, Fut, T, E>(
    policy: RetryPolicy,
    mut operation: F,
    is_retryable: fn(&E) -> bool,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(err) => {
                if !is_retryable(&err) || attempt >= policy.max_retries {
                    return Err(err);
                }

                let backoff = policy.backoff(attempt);
                warn!(
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "attempt failed, retrying"
                );

                sleep(backoff).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::whatsapp::traits::TransportError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn retryable(err: &TransportError) -> bool {
        err.is_retryable()
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_succeeds_immediately() {
        let result = retry_with_backoff(
            RetryPolicy::default(),
            || async { Ok::<_, TransportError>(42) },
            retryable,
        )
        .await;

        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_succeeds_after_failures() {
        let attempt = Arc::new(AtomicU32::new(0));
        let attempt_clone = attempt.clone();

        let result = retry_with_backoff(
            RetryPolicy::default(),
            move || {
                let attempt = attempt_clone.clone();
                async move {
                    let count = attempt.fetch_add(1, Ordering::SeqCst);
                    if count < 2 {
                        Err(TransportError::Network("connection refused".to_string()))
                    } else {
                        Ok(42)
                    }
                }
            },
            retryable,
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempt.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_non_retryable_error_fails_immediately() {
        let attempt = Arc::new(AtomicU32::new(0));
        let attempt_clone = attempt.clone();

        let result = retry_with_backoff(
            RetryPolicy::default(),
            move || {
                let attempt = attempt_clone.clone();
                async move {
                    attempt.fetch_add(1, Ordering::SeqCst);
                    Err::<i32, _>(TransportError::Protocol("bad handshake".to_string()))
                }
            },
            retryable,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(attempt.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhausts_budget() {
        let attempt = Arc::new(AtomicU32::new(0));
        let attempt_clone = attempt.clone();
        let policy = RetryPolicy {
            max_retries: 2,
            ..RetryPolicy::default()
        };

        let result = retry_with_backoff(
            policy,
            move || {
                let attempt = attempt_clone.clone();
                async move {
                    attempt.fetch_add(1, Ordering::SeqCst);
                    Err::<i32, _>(TransportError::Network("unreachable".to_string()))
                }
            },
            retryable,
        )
        .await;

        assert!(matches!(result, Err(TransportError::Network(_))));
        assert_eq!(attempt.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_backoff_calculation() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_millis(250));
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_secs(1));
        assert_eq!(policy.backoff(10), Duration::from_secs(5)); // Capped
        assert_eq!(policy.backoff(40), Duration::from_secs(5));
    }
}
