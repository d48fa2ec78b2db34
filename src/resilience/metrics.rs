//! # Resilience Metrics
//!
//! Snapshots exposed for observability: the circuit breaker status, rolling
//! request counters with a smoothed latency, and the derived health verdict
//! with operator recommendations.

use crate::constants::health::{
    DEGRADED_LATENCY_MS, DEGRADED_SUCCESS_RATE_PERCENT, LATENCY_SMOOTHING_FACTOR,
    SLOW_RESPONSE_MS,
};
use crate::resilience::CircuitState;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Circuit breaker observability snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerStatus {
    pub component: String,

    pub state: CircuitState,

    /// Failures inside the current window
    pub failure_count: u32,

    /// Consecutive successes in the current half-open probation
    pub success_count: u32,

    /// Recent failures per window second, times 100
    pub failure_rate: f64,

    pub total_calls: u64,
    pub total_successes: u64,
    pub total_failures: u64,

    /// Calls refused while open
    pub rejected_calls: u64,
}

impl CircuitBreakerStatus {
    /// Get human-readable state description
    pub fn state_description(&self) -> &'static str {
        match self.state {
            CircuitState::Closed => "Healthy - Normal operation",
            CircuitState::Open => "Failing - Rejecting all calls",
            CircuitState::HalfOpen => "Recovering - Testing system health",
        }
    }
}

/// Rolling request counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,

    /// Exponential moving average (alpha = 0.1), not an arithmetic mean
    pub average_response_time_ms: f64,
}

impl RequestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, success: bool, elapsed: Duration) {
        self.total_requests += 1;
        if success {
            self.successful_requests += 1;
        } else {
            self.failed_requests += 1;
        }

        let sample_ms = elapsed.as_secs_f64() * 1_000.0;
        self.average_response_time_ms = if self.total_requests == 1 {
            sample_ms
        } else {
            self.average_response_time_ms * (1.0 - LATENCY_SMOOTHING_FACTOR)
                + sample_ms * LATENCY_SMOOTHING_FACTOR
        };
    }

    /// Success percentage; 100 when nothing has been requested yet
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 100.0;
        }
        self.successful_requests as f64 / self.total_requests as f64 * 100.0
    }

    pub fn failure_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.failed_requests as f64 / self.total_requests as f64 * 100.0
    }

    /// Format metrics for logging
    pub fn format_summary(&self) -> String {
        format!(
            "Requests: {} | Success: {:.1}% | Failures: {} | Avg Latency: {:.0}ms",
            self.total_requests,
            self.success_rate(),
            self.failed_requests,
            self.average_response_time_ms
        )
    }
}

/// Limits used to derive the health verdict and recommendations
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthThresholds {
    /// Below this success rate (percent) the pipeline is degraded
    pub degraded_success_rate_percent: f64,

    /// Above this average latency the pipeline is degraded
    pub degraded_latency_ms: f64,

    pub slow_response_ms: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            degraded_success_rate_percent: DEGRADED_SUCCESS_RATE_PERCENT,
            degraded_latency_ms: DEGRADED_LATENCY_MS,
            slow_response_ms: SLOW_RESPONSE_MS,
        }
    }
}

/// Derived health verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Open circuit is unhealthy; low success rate or high latency is degraded
    pub fn evaluate(
        breaker_state: CircuitState,
        requests: &RequestMetrics,
        thresholds: &HealthThresholds,
    ) -> Self {
        if breaker_state == CircuitState::Open {
            return HealthStatus::Unhealthy;
        }

        if requests.success_rate() < thresholds.degraded_success_rate_percent
            || requests.average_response_time_ms > thresholds.degraded_latency_ms
        {
            return HealthStatus::Degraded;
        }

        HealthStatus::Healthy
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Full resilience snapshot returned by `ResilienceManager::metrics()`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResilienceMetrics {
    pub requests: RequestMetrics,
    pub circuit_breaker: CircuitBreakerStatus,
    pub health_status: HealthStatus,
    pub recommendations: Vec<String>,
}

impl ResilienceMetrics {
    pub fn format_summary(&self) -> String {
        format!(
            "Health: {} | Circuit: {} | {}",
            self.health_status,
            self.circuit_breaker.state_description(),
            self.requests.format_summary()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moving_average_weights_recent_samples() {
        let mut metrics = RequestMetrics::new();
        metrics.record(true, Duration::from_millis(100));
        assert!((metrics.average_response_time_ms - 100.0).abs() < 1e-9);

        metrics.record(true, Duration::from_millis(1_100));
        // 100 * 0.9 + 1100 * 0.1
        assert!((metrics.average_response_time_ms - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_success_rate_and_counters() {
        let mut metrics = RequestMetrics::new();
        assert_eq!(metrics.success_rate(), 100.0);

        for _ in 0..9 {
            metrics.record(true, Duration::from_millis(10));
        }
        metrics.record(false, Duration::from_millis(10));

        assert_eq!(metrics.total_requests, 10);
        assert_eq!(metrics.failed_requests, 1);
        assert!((metrics.success_rate() - 90.0).abs() < 1e-9);
        assert!((metrics.failure_rate() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_health_evaluation() {
        let thresholds = HealthThresholds::default();
        let mut metrics = RequestMetrics::new();
        metrics.record(true, Duration::from_millis(50));
        assert_eq!(
            HealthStatus::evaluate(CircuitState::Closed, &metrics, &thresholds),
            HealthStatus::Healthy
        );
        assert_eq!(
            HealthStatus::evaluate(CircuitState::Open, &metrics, &thresholds),
            HealthStatus::Unhealthy
        );

        metrics.record(false, Duration::from_millis(50));
        assert_eq!(
            HealthStatus::evaluate(CircuitState::HalfOpen, &metrics, &thresholds),
            HealthStatus::Degraded
        );

        let mut slow = RequestMetrics::new();
        slow.record(true, Duration::from_secs(11));
        assert_eq!(
            HealthStatus::evaluate(CircuitState::Closed, &slow, &thresholds),
            HealthStatus::Degraded
        );
    }
}
