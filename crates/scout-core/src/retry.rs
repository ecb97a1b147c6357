//! Bounded retry with a fixed backoff.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::Error;

/// Retries any failure up to `max_attempts` in total, sleeping `backoff`
/// between attempts. The last error is returned when every attempt fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff: Duration::from_millis(700),
        }
    }
}

impl RetryPolicy {
    pub fn fixed(max_attempts: usize, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, Error>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt >= max_attempts => return Err(err),
                Err(err) => {
                    warn!(
                        %label,
                        attempt,
                        max_attempts,
                        retryable = err.is_retryable(),
                        error = %err,
                        "Call failed, retrying"
                    );
                    tokio::time::sleep(self.backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_succeeds_after_one_failure() {
        let calls = AtomicUsize::new(0);
        let policy = RetryPolicy::fixed(2, Duration::ZERO);
        let result = policy
            .run("test", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 1 {
                        Err(Error::network("reset"))
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_returns_last_error_without_third_attempt() {
        let calls = AtomicUsize::new(0);
        let policy = RetryPolicy::fixed(2, Duration::ZERO);
        let result: Result<(), Error> = policy
            .run("test", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(Error::api(500, format!("failure {}", attempt))) }
            })
            .await;
        let err = result.unwrap_err();
        assert!(err.to_string().contains("failure 2"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_is_waited() {
        let policy = RetryPolicy::default();
        let start = tokio::time::Instant::now();
        let _: Result<(), Error> = policy
            .run("test", |_| async { Err(Error::network("down")) })
            .await;
        assert!(start.elapsed() >= Duration::from_millis(700));
    }

    #[test]
    fn test_zero_attempts_clamped() {
        assert_eq!(RetryPolicy::fixed(0, Duration::ZERO).max_attempts, 1);
    }
}
