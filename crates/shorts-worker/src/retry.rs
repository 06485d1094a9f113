//! Retry with exponential backoff and jitter.
//!
//! Used for transport operations against remote storage and the URL
//! downloader: 3 attempts beyond the first, delays 2s/4s/8s with ±25%
//! jitter, capped at 30s.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial attempt).
    pub max_retries: u32,
    /// Base delay for exponential backoff (doubles each attempt).
    pub base_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Jitter fraction applied to each delay (±).
    pub jitter: f64,
    /// Operation name for logging.
    pub operation_name: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            jitter: 0.25,
            operation_name: "operation".to_string(),
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with the given operation name.
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            ..Default::default()
        }
    }

    /// Set the base delay for exponential backoff.
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Set the maximum number of retries.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Delay before retry `attempt` (1-based), jittered and capped.
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        let capped = exp.min(self.max_delay);
        let factor = 1.0 + self.jitter * (2.0 * rand::random::<f64>() - 1.0);
        capped.mul_f64(factor.max(0.0)).min(self.max_delay)
    }
}

/// Execute an async operation with retry on retryable errors.
///
/// `is_retryable` decides per error whether another attempt is worthwhile;
/// a non-retryable error is returned immediately.
pub async fn retry_async<F, Fut, T, E, P>(
    config: &RetryConfig,
    operation: F,
    is_retryable: P,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < config.max_retries && is_retryable(&e) => {
                attempt += 1;
                let delay = config.delay_for_attempt(attempt);
                debug!(
                    "{} attempt {} failed, retrying in {:?}: {}",
                    config.operation_name, attempt, delay, e
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                if attempt > 0 {
                    warn!(
                        "{} failed after {} attempts: {}",
                        config.operation_name,
                        attempt + 1,
                        e
                    );
                }
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delay_stays_within_jitter_band() {
        let config = RetryConfig::new("test");
        for _ in 0..50 {
            let d = config.delay_for_attempt(1).as_secs_f64();
            assert!((1.5..=2.5).contains(&d), "delay {} outside ±25% of 2s", d);
            let d = config.delay_for_attempt(2).as_secs_f64();
            assert!((3.0..=5.0).contains(&d), "delay {} outside ±25% of 4s", d);
        }
    }

    #[test]
    fn delay_caps_at_max() {
        let config = RetryConfig::new("test");
        for _ in 0..50 {
            assert!(config.delay_for_attempt(10) <= Duration::from_secs(30));
        }
    }

    #[tokio::test]
    async fn succeeds_without_retry() {
        let config = RetryConfig::new("test");
        let calls = AtomicU32::new(0);

        let result: Result<i32, String> = retry_async(
            &config,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(42) }
            },
            |_| true,
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_errors() {
        let mut config = RetryConfig::new("test");
        config.base_delay = Duration::from_millis(1);
        let calls = AtomicU32::new(0);

        let result: Result<i32, String> = retry_async(
            &config,
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("transient".to_string())
                    } else {
                        Ok(7)
                    }
                }
            },
            |_| true,
        )
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_fails_fast() {
        let config = RetryConfig::new("test");
        let calls = AtomicU32::new(0);

        let result: Result<i32, String> = retry_async(
            &config,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("fatal".to_string()) }
            },
            |_| false,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let mut config = RetryConfig::new("test");
        config.base_delay = Duration::from_millis(1);
        let calls = AtomicU32::new(0);

        let result: Result<i32, String> = retry_async(
            &config,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("always".to_string()) }
            },
            |_| true,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
