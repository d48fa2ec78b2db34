//! # Resilience Configuration
//!
//! Runtime parameter structs for the circuit breaker and the retry strategy.
//! File-based configuration lives in [`crate::config`] and converts into these
//! via `to_resilience_config()`.

use crate::constants::{circuit_breaker as cb_defaults, retry as retry_defaults};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a single circuit breaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Failures inside `window_size` that open the circuit
    pub failure_threshold: u32,

    /// Consecutive half-open successes that close the circuit
    pub success_threshold: u32,

    /// Time to wait in open state before allowing a probe request
    pub timeout: Duration,

    /// Sliding window in which failures are counted
    pub window_size: Duration,
}

impl CircuitBreakerConfig {
    /// Preset for the remote GraphQL endpoint
    pub fn for_graphql_api() -> Self {
        Self::default()
    }

    /// Aggressive preset for tests: opens fast, recovers fast
    pub fn for_test() -> Self {
        Self {
            failure_threshold: 2,
            success_threshold: 1,
            timeout: Duration::from_millis(100),
            window_size: Duration::from_secs(10),
        }
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.failure_threshold == 0 {
            return Err("failure_threshold must be greater than 0".to_string());
        }

        if self.failure_threshold > 100 {
            return Err("failure_threshold should not exceed 100".to_string());
        }

        if self.success_threshold == 0 {
            return Err("success_threshold must be greater than 0".to_string());
        }

        if self.success_threshold > 50 {
            return Err("success_threshold should not exceed 50".to_string());
        }

        if self.timeout.is_zero() {
            return Err("timeout must be greater than 0".to_string());
        }

        if self.window_size.is_zero() {
            return Err("window_size must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: cb_defaults::DEFAULT_FAILURE_THRESHOLD,
            success_threshold: cb_defaults::DEFAULT_SUCCESS_THRESHOLD,
            timeout: Duration::from_secs(cb_defaults::DEFAULT_TIMEOUT_SECONDS),
            window_size: Duration::from_secs(cb_defaults::DEFAULT_WINDOW_SECONDS),
        }
    }
}

/// Configuration for exponential-backoff retries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,

    /// Delay before the first retry
    pub base_delay: Duration,

    /// Upper bound applied before jitter
    pub max_delay: Duration,

    pub backoff_multiplier: f64,

    /// Scale each delay by a random factor in `[0.5, 1.0]`
    pub jitter: bool,
}

impl RetryConfig {
    /// Preset for tests: no jitter, millisecond delays
    pub fn for_test() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    /// Single attempt, never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".to_string());
        }

        if self.max_attempts > 20 {
            return Err("max_attempts should not exceed 20".to_string());
        }

        if self.backoff_multiplier < 1.0 || !self.backoff_multiplier.is_finite() {
            return Err("backoff_multiplier must be a finite value >= 1.0".to_string());
        }

        if self.max_delay < self.base_delay {
            return Err("max_delay must not be smaller than base_delay".to_string());
        }

        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: retry_defaults::DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(retry_defaults::DEFAULT_BASE_DELAY_MS),
            max_delay: Duration::from_millis(retry_defaults::DEFAULT_MAX_DELAY_MS),
            backoff_multiplier: retry_defaults::DEFAULT_BACKOFF_MULTIPLIER,
            jitter: true,
        }
    }
}
