//! Bounded exponential backoff for transient external failures.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use mande_core::{defaults, Result};

/// Retry policy applied to calls against external services.
///
/// Only errors for which [`mande_core::Error::is_transient`] is true are
/// retried; validation and other errors return immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: defaults::RETRY_MAX,
            initial_backoff: Duration::from_millis(defaults::RETRY_INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_millis(defaults::RETRY_MAX_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    /// Load from `MANDE_RETRY_MAX`, keeping the default delays.
    pub fn from_env() -> Self {
        let max_retries = std::env::var("MANDE_RETRY_MAX")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(defaults::RETRY_MAX);
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based): initial · 2^(retry-1), capped.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(16);
        let delay = self.initial_backoff.saturating_mul(1u32 << exp);
        delay.min(self.max_backoff)
    }

    /// Run `op` until it succeeds, fails permanently, or retries run out.
    pub async fn run<T, F, Fut>(&self, op_name: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retry = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && retry < self.max_retries => {
                    retry += 1;
                    let delay = self.backoff(retry);
                    warn!(
                        op = op_name,
                        attempt = retry,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    if e.is_transient() {
                        debug!(op = op_name, retries = retry, "Retries exhausted");
                    }
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mande_core::Error;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
        }
    }

    #[test]
    fn test_default_backoff_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff(3), Duration::from_millis(2000));
        assert_eq!(policy.backoff(6), Duration::from_millis(8000));
        assert_eq!(policy.backoff(40), Duration::from_millis(8000));
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let out = fast_policy(3)
            .run("test", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(Error::Transient("connection reset".into()))
                } else {
                    Ok(n)
                }
            })
            .await
            .unwrap();
        assert_eq!(out, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let res: Result<()> = fast_policy(3)
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::Transient("timeout".into()))
            })
            .await;
        assert!(matches!(res, Err(Error::Transient(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_validation_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let res: Result<()> = fast_policy(3)
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::InvalidInput("empty prompt".into()))
            })
            .await;
        assert!(matches!(res, Err(Error::InvalidInput(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
