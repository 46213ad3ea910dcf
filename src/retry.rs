//! Bounded retry with backoff for externally-fallible operations

use std::time::Duration;

use crate::error::Result;

/// Backoff schedule between attempts
#[derive(Debug, Clone, Copy)]
pub enum Backoff {
    /// Same delay after every failed attempt
    Fixed(Duration),
    /// `2^attempt` seconds (1s, 2s, 4s, ...)
    Exponential,
}

/// Retry policy: a bounded number of attempts with a backoff schedule.
///
/// `max_attempts` counts attempts, not retries: with `max_attempts = 3` an
/// operation that fails twice and then succeeds is a success; one that fails
/// three times propagates the last error.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
}

impl RetryPolicy {
    /// Fixed-delay policy (store/index setup)
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Backoff::Fixed(delay),
        }
    }

    /// Exponential-backoff policy (per-file ingestion, provider calls)
    pub fn exponential(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Backoff::Exponential,
        }
    }

    /// Delay to sleep after a failed attempt (0-indexed)
    fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential => Duration::from_secs(2u64.pow(attempt)),
        }
    }

    /// Run `operation` until it succeeds or the attempt bound is exhausted.
    ///
    /// Failures before the last attempt are logged with the attempt number;
    /// the last error is returned once the bound is hit.
    pub async fn run<F, Fut, T>(&self, what: &str, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut last_error = None;

        for attempt in 0..self.max_attempts {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if attempt + 1 < self.max_attempts {
                        let delay = self.delay_for(attempt);
                        tracing::warn!(
                            "{} failed (attempt {}/{}): {}, retrying in {:?}",
                            what,
                            attempt + 1,
                            self.max_attempts,
                            e,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                    } else {
                        tracing::error!(
                            "{} failed (attempt {}/{}): {}, giving up",
                            what,
                            attempt + 1,
                            self.max_attempts,
                            e
                        );
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.expect("retry loop ran at least once"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Operation that fails `failures` times, then succeeds.
    fn flaky(failures: u32) -> impl Fn() -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<u32>> + Send>> {
        let calls = std::sync::Arc::new(AtomicU32::new(0));
        move || {
            let calls = calls.clone();
            Box::pin(async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < failures {
                    Err(Error::Internal(format!("boom {}", n)))
                } else {
                    Ok(n + 1)
                }
            })
        }
    }

    #[tokio::test]
    async fn test_succeeds_on_last_attempt() {
        let policy = RetryPolicy::fixed(3, Duration::from_millis(1));
        // Fails max_attempts - 1 times, succeeds on the final attempt
        let result = policy.run("setup", flaky(2)).await.unwrap();
        assert_eq!(result, 3);
    }

    #[tokio::test]
    async fn test_propagates_after_bound() {
        let policy = RetryPolicy::fixed(3, Duration::from_millis(1));
        let result = policy.run("setup", flaky(3)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_first_attempt_success_does_not_sleep() {
        let policy = RetryPolicy::exponential(3);
        let result = policy.run("op", flaky(0)).await.unwrap();
        assert_eq!(result, 1);
    }

    #[test]
    fn test_exponential_delays() {
        let policy = RetryPolicy::exponential(4);
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
    }
}
