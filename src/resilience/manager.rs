//! # Resilience Manager
//!
//! Composes the circuit breaker and the retry strategy around an arbitrary
//! async operation and keeps rolling request metrics.
//!
//! The breaker wraps the *whole* retry sequence: while it is open no attempt is
//! made at all, and a burst of retries counts as one success or failure in the
//! breaker's window.

use crate::clock::{system_clock, SharedClock};
use crate::config::CompanionConfig;
use crate::events::{tracing_observer, SharedObserver};
use crate::resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState, HealthStatus,
    HealthThresholds, RequestMetrics, ResilienceMetrics, RetryConfig, RetryStrategy, RetryableError,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, info_span, Instrument};

/// Request priority, recorded for observability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

/// Per-call options for [`ResilienceManager::execute`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteOptions {
    pub operation: String,
    pub priority: Priority,
}

impl ExecuteOptions {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            priority: Priority::Normal,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self::new("unnamed")
    }
}

/// Circuit breaker + retry composition with metrics
#[derive(Debug)]
pub struct ResilienceManager {
    circuit_breaker: CircuitBreaker,
    retry: RetryStrategy,
    requests: Mutex<RequestMetrics>,
    thresholds: HealthThresholds,
    clock: SharedClock,
}

static DEFAULT_MANAGER: OnceLock<Arc<ResilienceManager>> = OnceLock::new();

impl ResilienceManager {
    pub fn new(
        name: impl Into<String>,
        circuit_breaker: CircuitBreakerConfig,
        retry: RetryConfig,
    ) -> Self {
        Self::builder(name)
            .circuit_breaker(circuit_breaker)
            .retry(retry)
            .build()
    }

    pub fn builder(name: impl Into<String>) -> ResilienceManagerBuilder {
        ResilienceManagerBuilder::new(name)
    }

    /// Build from the loaded configuration tree
    pub fn from_config(config: &CompanionConfig) -> ResilienceManagerBuilder {
        Self::builder(config.api.component_name.clone())
            .circuit_breaker(config.circuit_breaker.to_resilience_config())
            .retry(config.retry.to_resilience_config())
            .health_thresholds(config.resilience.to_health_thresholds())
    }

    /// Process-wide convenience instance with default settings
    ///
    /// Library code should take an injected manager; this exists for callers
    /// that want a shared instance without wiring one through.
    pub fn default_instance() -> Arc<ResilienceManager> {
        Arc::clone(DEFAULT_MANAGER.get_or_init(|| {
            Arc::new(Self::new(
                "graphql_api",
                CircuitBreakerConfig::default(),
                RetryConfig::default(),
            ))
        }))
    }

    /// Run `operation` through circuit breaker and retry
    ///
    /// `operation` is invoked once per attempt. Circuit-open rejections are
    /// counted as failed requests.
    pub async fn execute<F, Fut, T, E>(
        &self,
        options: ExecuteOptions,
        operation: F,
    ) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryableError,
    {
        let span = info_span!(
            "resilient_execute",
            operation = %options.operation,
            priority = ?options.priority
        );

        async {
            let start = self.clock.now();
            let result = self
                .circuit_breaker
                .call(|| self.retry.execute(operation))
                .await;
            let elapsed = self.clock.now().saturating_duration_since(start);

            self.requests.lock().record(result.is_ok(), elapsed);

            match &result {
                Ok(_) => debug!(elapsed_ms = elapsed.as_millis(), "Resilient operation succeeded"),
                Err(error) => debug!(
                    elapsed_ms = elapsed.as_millis(),
                    circuit_open = error.is_circuit_open(),
                    "Resilient operation failed"
                ),
            }

            result
        }
        .instrument(span)
        .await
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    pub fn retry_strategy(&self) -> &RetryStrategy {
        &self.retry
    }

    pub fn request_metrics(&self) -> RequestMetrics {
        self.requests.lock().clone()
    }

    pub fn health_status(&self) -> HealthStatus {
        let requests = self.requests.lock().clone();
        HealthStatus::evaluate(self.circuit_breaker.state(), &requests, &self.thresholds)
    }

    /// Full snapshot: counters, breaker status, health and recommendations
    pub fn metrics(&self) -> ResilienceMetrics {
        let requests = self.request_metrics();
        let circuit_breaker = self.circuit_breaker.status();
        let health_status =
            HealthStatus::evaluate(circuit_breaker.state, &requests, &self.thresholds);
        let recommendations = self.recommendations(circuit_breaker.state, &requests);

        ResilienceMetrics {
            requests,
            circuit_breaker,
            health_status,
            recommendations,
        }
    }

    fn recommendations(&self, state: CircuitState, requests: &RequestMetrics) -> Vec<String> {
        let mut recommendations = Vec::new();

        match state {
            CircuitState::Open => recommendations.push(
                "Circuit breaker is open - the API is failing, cached data is being served until it recovers"
                    .to_string(),
            ),
            CircuitState::HalfOpen => recommendations.push(
                "Circuit breaker is testing recovery - monitor the next requests".to_string(),
            ),
            CircuitState::Closed => {}
        }

        if requests.total_requests > 0
            && requests.success_rate() < self.thresholds.degraded_success_rate_percent
        {
            recommendations.push(format!(
                "High failure rate detected ({:.1}% success) - check network connectivity and API status",
                requests.success_rate()
            ));
        }

        if requests.average_response_time_ms > self.thresholds.slow_response_ms {
            recommendations.push(format!(
                "Slow response times detected ({:.0}ms average) - consider longer cache TTLs",
                requests.average_response_time_ms
            ));
        }

        recommendations
    }

    /// Reset breaker and local metrics
    pub fn reset(&self) {
        self.circuit_breaker.reset();
        *self.requests.lock() = RequestMetrics::new();
        info!(
            component = %self.circuit_breaker.name(),
            "Resilience manager reset"
        );
    }
}

/// Builder wiring clock and observer through both wrapped components
#[derive(Debug)]
pub struct ResilienceManagerBuilder {
    name: String,
    circuit_breaker: CircuitBreakerConfig,
    retry: RetryConfig,
    thresholds: HealthThresholds,
    clock: SharedClock,
    observer: SharedObserver,
}

impl ResilienceManagerBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            circuit_breaker: CircuitBreakerConfig::default(),
            retry: RetryConfig::default(),
            thresholds: HealthThresholds::default(),
            clock: system_clock(),
            observer: tracing_observer(),
        }
    }

    pub fn circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = config;
        self
    }

    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    pub fn health_thresholds(mut self, thresholds: HealthThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    pub fn build(self) -> ResilienceManager {
        let circuit_breaker = CircuitBreaker::new(self.name, self.circuit_breaker)
            .with_clock(Arc::clone(&self.clock))
            .with_observer(Arc::clone(&self.observer));
        let retry = RetryStrategy::new(self.retry).with_observer(self.observer);

        ResilienceManager {
            circuit_breaker,
            retry,
            requests: Mutex::new(RequestMetrics::new()),
            thresholds: self.thresholds,
            clock: self.clock,
        }
    }
}
