//! # Retry Strategy
//!
//! Retries a failing async operation with exponential backoff and optional
//! jitter. Which failures deserve another attempt is decided by the error type
//! through [`RetryableError`].
//!
//! Each attempt's future is dropped before the backoff sleep starts, so an
//! abandoned in-flight call never overlaps the next attempt.

use crate::constants::retry::JITTER_MIN_FACTOR;
use crate::events::{tracing_observer, ResilienceEvent, SharedObserver};
use crate::resilience::RetryConfig;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Classifies whether a failure is transient
pub trait RetryableError: std::fmt::Display {
    fn is_retryable(&self) -> bool;
}

/// Bounded exponential-backoff retry
#[derive(Debug, Clone)]
pub struct RetryStrategy {
    config: RetryConfig,
    observer: SharedObserver,
}

impl RetryStrategy {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            observer: tracing_observer(),
        }
    }

    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Whether `error` should be retried (independent of attempts left)
    pub fn should_retry<E: RetryableError>(&self, error: &E) -> bool {
        error.is_retryable()
    }

    /// Delay before retrying after `attempt` (1-based) failed, before jitter
    ///
    /// `min(base_delay * multiplier^(attempt-1), max_delay)`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let factor = self.config.backoff_multiplier.powi(exponent);
        let uncapped = self.config.base_delay.as_secs_f64() * factor;

        if !uncapped.is_finite() || uncapped >= self.config.max_delay.as_secs_f64() {
            self.config.max_delay
        } else {
            Duration::from_secs_f64(uncapped)
        }
    }

    /// Backoff delay with jitter applied when enabled
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let delay = self.delay_for_attempt(attempt);
        if self.config.jitter {
            let factor = JITTER_MIN_FACTOR + fastrand::f64() * (1.0 - JITTER_MIN_FACTOR);
            delay.mul_f64(factor)
        } else {
            delay
        }
    }

    /// Run `operation` until it succeeds, fails permanently, or attempts run out
    ///
    /// The last error is returned unchanged.
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryableError,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let error = match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt = attempt, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if !self.should_retry(&error) {
                debug!(attempt = attempt, error = %error, "Non-retryable failure");
                return Err(error);
            }

            if attempt >= max_attempts {
                self.observer.on_event(&ResilienceEvent::RetriesExhausted {
                    attempts: attempt,
                    error: error.to_string(),
                });
                return Err(error);
            }

            let delay = self.jittered_delay(attempt);
            self.observer.on_event(&ResilienceEvent::RetryScheduled {
                attempt,
                delay,
                error: error.to_string(),
            });

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::events::RecordingObserver;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn strategy(max_attempts: u32, jitter: bool) -> RetryStrategy {
        RetryStrategy::new(RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1_000),
            backoff_multiplier: 2.0,
            jitter,
        })
    }

    #[test]
    fn test_exponential_delay_is_capped() {
        let retry = strategy(10, false);
        assert_eq!(retry.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(retry.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(retry.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(retry.delay_for_attempt(4), Duration::from_millis(800));
        assert_eq!(retry.delay_for_attempt(5), Duration::from_millis(1_000));
        assert_eq!(retry.delay_for_attempt(60), Duration::from_millis(1_000));
    }

    #[test]
    fn test_jitter_stays_within_half_to_full_delay() {
        let retry = strategy(10, true);
        for attempt in 1..=6 {
            let base = retry.delay_for_attempt(attempt);
            for _ in 0..50 {
                let jittered = retry.jittered_delay(attempt);
                assert!(jittered <= base);
                assert!(jittered >= base.mul_f64(0.5));
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_errors_until_success() {
        let observer = RecordingObserver::shared();
        let retry = strategy(3, false).with_observer(observer.clone());
        let calls = AtomicU32::new(0);

        let result = retry
            .execute(|| async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(ApiError::http_status(503, "unavailable"))
                } else {
                    Ok("payload")
                }
            })
            .await;

        assert_eq!(result, Ok("payload"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            observer.count(|e| matches!(e, ResilienceEvent::RetryScheduled { .. })),
            2
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_fails_immediately() {
        let retry = strategy(5, false);
        let calls = AtomicU32::new(0);

        let result: Result<(), ApiError> = retry
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ApiError::http_status(404, "not found"))
            })
            .await;

        assert_eq!(result, Err(ApiError::http_status(404, "not found")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_error() {
        let observer = RecordingObserver::shared();
        let retry = strategy(3, false).with_observer(observer.clone());
        let calls = AtomicU32::new(0);

        let result: Result<(), ApiError> = retry
            .execute(|| async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Err(ApiError::network(format!("attempt {n}")))
            })
            .await;

        assert_eq!(result, Err(ApiError::network("attempt 3")));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            observer.count(|e| matches!(e, ResilienceEvent::RetriesExhausted { attempts: 3, .. })),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_waits_between_attempts() {
        let retry = strategy(3, false);
        let start = tokio::time::Instant::now();

        let _: Result<(), ApiError> = retry
            .execute(|| async { Err(ApiError::timeout("fetch", Duration::from_secs(1))) })
            .await;

        // 100ms after attempt 1, 200ms after attempt 2
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(300));
        assert!(elapsed < Duration::from_millis(350));
    }
}
