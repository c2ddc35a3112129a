//! Bounded retry for remote calls.
//!
//! Delays grow linearly (`base * attempt`) rather than exponentially so the
//! worst-case latency of a single call stays predictable.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backon::{BackoffBuilder, Retryable};

/// Default number of additional attempts after the first failure.
pub const DEFAULT_MAX_RETRIES: usize = 3;

/// Default base delay; the n-th retry waits `n * base`.
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 1_000;

/// Configuration for retry operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: usize,
    /// Base delay multiplied by the attempt number.
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base: Duration::from_millis(DEFAULT_BACKOFF_BASE_MS),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_retries: usize, backoff_base: Duration) -> Self {
        Self {
            max_retries,
            backoff_base,
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    #[must_use]
    pub fn into_backoff(self) -> LinearBuilder {
        LinearBuilder {
            base: self.backoff_base,
            max_times: self.max_retries,
        }
    }
}

/// Builder for [`LinearBackoff`].
#[derive(Debug, Clone, Copy)]
pub struct LinearBuilder {
    base: Duration,
    max_times: usize,
}

impl BackoffBuilder for LinearBuilder {
    type Backoff = LinearBackoff;

    fn build(self) -> Self::Backoff {
        LinearBackoff {
            base: self.base,
            max_times: self.max_times,
            attempt: 0,
        }
    }
}

/// Yields `base`, `2 * base`, ... for at most `max_times` retries.
#[derive(Debug, Clone)]
pub struct LinearBackoff {
    base: Duration,
    max_times: usize,
    attempt: usize,
}

impl Iterator for LinearBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.attempt >= self.max_times {
            return None;
        }
        self.attempt += 1;
        let factor = u32::try_from(self.attempt).unwrap_or(u32::MAX);
        Some(self.base.saturating_mul(factor))
    }
}

/// Execute an operation, retrying failures accepted by `is_retryable`.
///
/// The operation runs once, then up to `policy.max_retries` more times.
/// Once retries are exhausted (or an error is rejected by `is_retryable`)
/// the last error is returned. Passing `|_| true` retries every failure.
///
/// # Example
///
/// ```ignore
/// use repofolio::retry::{RetryPolicy, with_retry};
///
/// let body = with_retry(
///     || async { client.request("/users/bob").await },
///     &RetryPolicy::default(),
///     "/users/bob",
///     GitHubError::is_retryable,
/// )
/// .await?;
/// ```
pub async fn with_retry<T, E, F, Fut, W>(
    mut operation: F,
    policy: &RetryPolicy,
    label: &str,
    is_retryable: W,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    W: FnMut(&E) -> bool,
{
    let attempt = AtomicU32::new(0);

    let retry_op = || {
        attempt.fetch_add(1, Ordering::SeqCst);
        operation()
    };

    retry_op
        .retry(policy.into_backoff())
        .notify(|err: &E, dur: Duration| {
            tracing::debug!(
                target = label,
                attempt = attempt.load(Ordering::SeqCst),
                retry_in_ms = dur.as_millis() as u64,
                "Retrying after error: {}",
                err
            );
        })
        .when(is_retryable)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Debug, Clone)]
    struct TestError {
        message: &'static str,
        transient: bool,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.message)
        }
    }

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(
            policy.backoff_base,
            Duration::from_millis(DEFAULT_BACKOFF_BASE_MS)
        );
    }

    #[test]
    fn test_linear_backoff_grows_by_base() {
        let delays: Vec<Duration> = RetryPolicy::new(3, Duration::from_millis(250))
            .into_backoff()
            .build()
            .collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(250),
                Duration::from_millis(500),
                Duration::from_millis(750),
            ]
        );
    }

    #[test]
    fn test_no_retry_policy_yields_no_delays() {
        assert_eq!(RetryPolicy::none().into_backoff().build().count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn fails_twice_then_succeeds_with_three_calls() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_capture = Arc::clone(&calls);

        let operation = move || {
            let calls_capture = Arc::clone(&calls_capture);
            async move {
                let n = calls_capture.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(TestError {
                        message: "flaky",
                        transient: true,
                    })
                } else {
                    Ok(42u32)
                }
            }
        };

        let result = with_retry(
            operation,
            &RetryPolicy::new(3, Duration::from_secs(1)),
            "test",
            |_: &TestError| true,
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_return_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_capture = Arc::clone(&calls);

        let operation = move || {
            let calls_capture = Arc::clone(&calls_capture);
            async move {
                calls_capture.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(TestError {
                    message: "still down",
                    transient: true,
                })
            }
        };

        let err = with_retry(
            operation,
            &RetryPolicy::new(2, Duration::from_millis(10)),
            "test",
            |e: &TestError| e.transient,
        )
        .await
        .expect_err("expected error");

        assert_eq!(err.to_string(), "still down");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_rejected_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_capture = Arc::clone(&calls);

        let operation = move || {
            let calls_capture = Arc::clone(&calls_capture);
            async move {
                calls_capture.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(TestError {
                    message: "not found",
                    transient: false,
                })
            }
        };

        let err = with_retry(
            operation,
            &RetryPolicy::default(),
            "test",
            |e: &TestError| e.transient,
        )
        .await
        .expect_err("expected error");

        assert_eq!(err.to_string(), "not found");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn success_is_never_retried() {
        let calls = AtomicU32::new(0);
        let result = with_retry(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, TestError>("done") }
            },
            &RetryPolicy::default(),
            "test",
            |_: &TestError| true,
        )
        .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
