//! # Circuit Breaker Implementation
//!
//! Provides fault isolation for the remote endpoint. Three states:
//! Closed (normal operation), Open (failing fast), and Half-Open (testing recovery).
//!
//! Failures are counted inside a sliding time window rather than as a
//! consecutive streak: only failures younger than `window_size` count toward
//! `failure_threshold`, and a success while Closed clears the window.
//!
//! The breaker's bookkeeping is synchronous. The state lock is never held
//! across the wrapped operation's `.await`.

use crate::clock::{system_clock, SharedClock};
use crate::events::{tracing_observer, ResilienceEvent, SharedObserver};
use crate::resilience::{CircuitBreakerConfig, CircuitBreakerStatus};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Circuit breaker states representing the current operational mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CircuitState {
    /// Normal operation - all calls are allowed through
    Closed,
    /// Failure mode - all calls fail fast without executing
    Open,
    /// Testing recovery - calls pass through until success or first failure
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Errors that can occur during circuit breaker operation
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// Circuit is open, rejecting all calls
    #[error("Circuit breaker is open for {component}")]
    CircuitOpen { component: String },

    /// Operation failed and was recorded
    #[error("Operation failed: {0}")]
    OperationFailed(E),
}

impl<E> CircuitBreakerError<E> {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CircuitBreakerError::CircuitOpen { .. })
    }
}

/// Mutable breaker bookkeeping
#[derive(Debug)]
struct BreakerState {
    state: CircuitState,

    /// Failure timestamps inside the current window, oldest first
    failure_timestamps: VecDeque<Instant>,

    consecutive_half_open_successes: u32,

    last_failure_at: Option<Instant>,

    total_calls: u64,
    success_count: u64,
    failure_count: u64,
    rejected_count: u64,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_timestamps: VecDeque::new(),
            consecutive_half_open_successes: 0,
            last_failure_at: None,
            total_calls: 0,
            success_count: 0,
            failure_count: 0,
            rejected_count: 0,
        }
    }

    /// Drop failures that fell out of the window
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(oldest) = self.failure_timestamps.front() {
            if now.saturating_duration_since(*oldest) > window {
                self.failure_timestamps.pop_front();
            } else {
                break;
            }
        }
    }
}

type Transition = (CircuitState, CircuitState);

/// Sliding-window circuit breaker
#[derive(Debug)]
pub struct CircuitBreaker {
    /// Component name for logging and metrics
    name: String,

    config: CircuitBreakerConfig,

    inner: Mutex<BreakerState>,

    clock: SharedClock,

    observer: SharedObserver,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given name and configuration
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name = name.into();
        info!(
            component = %name,
            failure_threshold = config.failure_threshold,
            success_threshold = config.success_threshold,
            timeout_seconds = config.timeout.as_secs(),
            window_seconds = config.window_size.as_secs(),
            "Circuit breaker initialized"
        );

        Self {
            name,
            config,
            inner: Mutex::new(BreakerState::new()),
            clock: system_clock(),
            observer: tracing_observer(),
        }
    }

    /// Use an injected clock (tests drive time through `ManualClock`)
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Get current circuit state
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Execute an operation with circuit breaker protection
    ///
    /// While Open, the operation is not invoked at all unless the open timeout
    /// has elapsed, in which case the breaker moves to Half-Open and lets this
    /// call through as a probe.
    pub async fn call<F, T, E, Fut>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.should_allow_call() {
            self.observer.on_event(&ResilienceEvent::CircuitRejected {
                component: self.name.clone(),
            });
            return Err(CircuitBreakerError::CircuitOpen {
                component: self.name.clone(),
            });
        }

        let start_time = self.clock.now();
        let result = operation().await;
        let duration = self.clock.now().saturating_duration_since(start_time);

        match &result {
            Ok(_) => self.record_success(duration),
            Err(_) => self.record_failure(duration),
        }

        result.map_err(CircuitBreakerError::OperationFailed)
    }

    /// Pre-flight check; performs the Open -> Half-Open transition when due
    pub fn should_allow(&self) -> bool {
        self.should_allow_call()
    }

    fn should_allow_call(&self) -> bool {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        let (allowed, transition) = match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => (true, None),
            CircuitState::Open => {
                let timeout_elapsed = match inner.last_failure_at {
                    Some(last_failure) => {
                        now.saturating_duration_since(last_failure) >= self.config.timeout
                    }
                    None => {
                        // Forced open without a recorded failure: allow a probe
                        warn!(component = %self.name, "Circuit open but no failure timestamp recorded");
                        true
                    }
                };

                if timeout_elapsed {
                    inner.state = CircuitState::HalfOpen;
                    inner.consecutive_half_open_successes = 0;
                    (true, Some((CircuitState::Open, CircuitState::HalfOpen)))
                } else {
                    inner.rejected_count += 1;
                    (false, None)
                }
            }
        };
        drop(inner);

        if let Some(transition) = transition {
            info!(
                component = %self.name,
                success_threshold = self.config.success_threshold,
                "Circuit breaker half-open (testing recovery)"
            );
            self.emit_transition(transition);
        }

        allowed
    }

    fn record_success(&self, duration: Duration) {
        let transition = {
            let mut inner = self.inner.lock();
            inner.total_calls += 1;
            inner.success_count += 1;

            match inner.state {
                CircuitState::Closed => {
                    // Failures do not accumulate across unrelated successes
                    inner.failure_timestamps.clear();
                    None
                }
                CircuitState::HalfOpen => {
                    inner.consecutive_half_open_successes += 1;
                    if inner.consecutive_half_open_successes >= self.config.success_threshold {
                        Self::close(&mut inner);
                        Some((CircuitState::HalfOpen, CircuitState::Closed))
                    } else {
                        None
                    }
                }
                CircuitState::Open => {
                    warn!(component = %self.name, "Success recorded while circuit is open");
                    None
                }
            }
        };

        debug!(
            component = %self.name,
            duration_ms = duration.as_millis(),
            "Operation succeeded"
        );

        if let Some(transition) = transition {
            info!(component = %self.name, "Circuit breaker closed (recovered)");
            self.emit_transition(transition);
        }
    }

    fn record_failure(&self, duration: Duration) {
        let now = self.clock.now();
        let (transition, recent_failures) = {
            let mut inner = self.inner.lock();
            inner.total_calls += 1;
            inner.failure_count += 1;
            inner.last_failure_at = Some(now);
            inner.failure_timestamps.push_back(now);
            inner.prune(now, self.config.window_size);

            let transition = match inner.state {
                CircuitState::Closed => {
                    if inner.failure_timestamps.len() >= self.config.failure_threshold as usize {
                        Self::open(&mut inner);
                        Some((CircuitState::Closed, CircuitState::Open))
                    } else {
                        None
                    }
                }
                CircuitState::HalfOpen => {
                    // Any failure during probation reopens immediately
                    Self::open(&mut inner);
                    Some((CircuitState::HalfOpen, CircuitState::Open))
                }
                CircuitState::Open => None,
            };
            (transition, inner.failure_timestamps.len())
        };

        debug!(
            component = %self.name,
            duration_ms = duration.as_millis(),
            recent_failures = recent_failures,
            "Operation failed"
        );

        if let Some(transition) = transition {
            error!(
                component = %self.name,
                recent_failures = recent_failures,
                failure_threshold = self.config.failure_threshold,
                timeout_seconds = self.config.timeout.as_secs(),
                "Circuit breaker opened (failing fast)"
            );
            self.emit_transition(transition);
        }
    }

    fn open(inner: &mut BreakerState) {
        inner.state = CircuitState::Open;
        inner.consecutive_half_open_successes = 0;
    }

    fn close(inner: &mut BreakerState) {
        inner.state = CircuitState::Closed;
        inner.failure_timestamps.clear();
        inner.consecutive_half_open_successes = 0;
    }

    fn emit_transition(&self, (from, to): Transition) {
        self.observer.on_event(&ResilienceEvent::CircuitStateChanged {
            component: self.name.clone(),
            from,
            to,
        });
    }

    /// Force circuit to open state (for emergency situations)
    pub fn force_open(&self) {
        warn!(component = %self.name, "Circuit breaker forced open");
        let now = self.clock.now();
        let from = {
            let mut inner = self.inner.lock();
            let from = inner.state;
            Self::open(&mut inner);
            inner.last_failure_at = Some(now);
            from
        };
        if from != CircuitState::Open {
            self.emit_transition((from, CircuitState::Open));
        }
    }

    /// Force circuit to closed state, keeping lifetime counters
    pub fn force_closed(&self) {
        warn!(component = %self.name, "Circuit breaker forced closed");
        let from = {
            let mut inner = self.inner.lock();
            let from = inner.state;
            Self::close(&mut inner);
            from
        };
        if from != CircuitState::Closed {
            self.emit_transition((from, CircuitState::Closed));
        }
    }

    /// Force Closed with every counter zeroed (manual recovery and tests)
    pub fn reset(&self) {
        let from = {
            let mut inner = self.inner.lock();
            let from = inner.state;
            *inner = BreakerState::new();
            from
        };
        info!(component = %self.name, "Circuit breaker reset");
        if from != CircuitState::Closed {
            self.emit_transition((from, CircuitState::Closed));
        }
    }

    /// Observability snapshot
    ///
    /// `failure_rate` is recent failures per window second, times 100. It is a
    /// rate-per-unit-time heuristic, not a percentage of requests.
    pub fn status(&self) -> CircuitBreakerStatus {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        inner.prune(now, self.config.window_size);

        let recent_failures = inner.failure_timestamps.len();
        let window_seconds = self.config.window_size.as_secs_f64();
        let failure_rate = if window_seconds > 0.0 {
            recent_failures as f64 / window_seconds * 100.0
        } else {
            0.0
        };

        CircuitBreakerStatus {
            component: self.name.clone(),
            state: inner.state,
            failure_count: recent_failures as u32,
            success_count: inner.consecutive_half_open_successes,
            failure_rate,
            total_calls: inner.total_calls,
            total_successes: inner.success_count,
            total_failures: inner.failure_count,
            rejected_calls: inner.rejected_count,
        }
    }

    /// Closed with less than 10% lifetime failures
    pub fn is_healthy(&self) -> bool {
        let inner = self.inner.lock();
        if inner.state != CircuitState::Closed {
            return false;
        }

        if inner.total_calls < 10 {
            // Too few calls to determine health
            return true;
        }

        (inner.failure_count as f64 / inner.total_calls as f64) < 0.1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::events::RecordingObserver;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn breaker(config: CircuitBreakerConfig) -> (CircuitBreaker, Arc<ManualClock>) {
        let clock = ManualClock::shared();
        let circuit = CircuitBreaker::new("test", config).with_clock(clock.clone());
        (circuit, clock)
    }

    fn config(failure_threshold: u32, success_threshold: u32) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold,
            success_threshold,
            timeout: Duration::from_secs(60),
            window_size: Duration::from_secs(300),
        }
    }

    async fn fail(circuit: &CircuitBreaker) {
        let _ = circuit.call(|| async { Err::<(), _>("error") }).await;
    }

    async fn succeed(circuit: &CircuitBreaker) {
        let _ = circuit.call(|| async { Ok::<_, &str>(()) }).await;
    }

    #[tokio::test]
    async fn test_circuit_breaker_normal_operation() {
        let (circuit, _) = breaker(config(3, 2));

        assert_eq!(circuit.state(), CircuitState::Closed);

        let result = circuit.call(|| async { Ok::<_, String>("success") }).await;
        assert!(result.is_ok());

        let status = circuit.status();
        assert_eq!(status.total_calls, 1);
        assert_eq!(status.total_successes, 1);
        assert_eq!(status.total_failures, 0);
    }

    #[tokio::test]
    async fn test_opens_after_threshold_and_fails_fast() {
        let (circuit, _) = breaker(config(2, 2));

        fail(&circuit).await;
        assert_eq!(circuit.state(), CircuitState::Closed);

        fail(&circuit).await;
        assert_eq!(circuit.state(), CircuitState::Open);

        let invoked = AtomicU32::new(0);
        let result = circuit
            .call(|| async {
                invoked.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>("should not execute")
            })
            .await;
        assert!(matches!(
            result,
            Err(CircuitBreakerError::CircuitOpen { .. })
        ));
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
        assert_eq!(circuit.status().rejected_calls, 1);
    }

    #[tokio::test]
    async fn test_failures_outside_window_are_not_counted() {
        let (circuit, clock) = breaker(CircuitBreakerConfig {
            failure_threshold: 2,
            window_size: Duration::from_secs(10),
            ..config(2, 1)
        });

        fail(&circuit).await;
        clock.advance(Duration::from_secs(11));
        fail(&circuit).await;

        assert_eq!(circuit.state(), CircuitState::Closed);
        assert_eq!(circuit.status().failure_count, 1);
    }

    #[tokio::test]
    async fn test_success_while_closed_resets_failures() {
        let (circuit, _) = breaker(config(3, 1));

        fail(&circuit).await;
        fail(&circuit).await;
        succeed(&circuit).await;
        fail(&circuit).await;
        fail(&circuit).await;

        assert_eq!(circuit.state(), CircuitState::Closed);
        assert_eq!(circuit.status().failure_count, 2);
    }

    #[tokio::test]
    async fn test_half_open_recovery_requires_success_threshold() {
        let observer = RecordingObserver::shared();
        let (circuit, clock) = breaker(config(1, 3));
        let circuit = circuit.with_observer(observer.clone());

        fail(&circuit).await;
        assert_eq!(circuit.state(), CircuitState::Open);

        clock.advance(Duration::from_secs(59));
        succeed(&circuit).await;
        assert_eq!(circuit.state(), CircuitState::Open);

        clock.advance(Duration::from_secs(1));
        succeed(&circuit).await;
        assert_eq!(circuit.state(), CircuitState::HalfOpen);
        succeed(&circuit).await;
        assert_eq!(circuit.state(), CircuitState::HalfOpen);
        assert_eq!(circuit.status().success_count, 2);
        succeed(&circuit).await;
        assert_eq!(circuit.state(), CircuitState::Closed);

        let transitions: Vec<_> = observer
            .events()
            .into_iter()
            .filter_map(|event| match event {
                ResilienceEvent::CircuitStateChanged { from, to, .. } => Some((from, to)),
                _ => None,
            })
            .collect();
        assert_eq!(
            transitions,
            vec![
                (CircuitState::Closed, CircuitState::Open),
                (CircuitState::Open, CircuitState::HalfOpen),
                (CircuitState::HalfOpen, CircuitState::Closed),
            ]
        );
    }

    #[tokio::test]
    async fn test_single_half_open_failure_reopens() {
        let (circuit, clock) = breaker(config(1, 3));

        fail(&circuit).await;
        clock.advance(Duration::from_secs(60));
        succeed(&circuit).await;
        assert_eq!(circuit.state(), CircuitState::HalfOpen);

        fail(&circuit).await;
        assert_eq!(circuit.state(), CircuitState::Open);

        // The reopen restarts the cooldown from the latest failure
        clock.advance(Duration::from_secs(30));
        assert!(!circuit.should_allow());
    }

    #[tokio::test]
    async fn test_failure_rate_is_per_window_second() {
        let (circuit, _) = breaker(CircuitBreakerConfig {
            window_size: Duration::from_secs(100),
            ..config(10, 1)
        });

        for _ in 0..5 {
            fail(&circuit).await;
        }

        let status = circuit.status();
        assert_eq!(status.failure_count, 5);
        assert!((status.failure_rate - 5.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_reset_and_force_operations() {
        let (circuit, _) = breaker(config(1, 1));

        circuit.force_open();
        assert_eq!(circuit.state(), CircuitState::Open);

        circuit.force_closed();
        assert_eq!(circuit.state(), CircuitState::Closed);

        fail(&circuit).await;
        assert_eq!(circuit.state(), CircuitState::Open);

        circuit.reset();
        let status = circuit.status();
        assert_eq!(status.state, CircuitState::Closed);
        assert_eq!(status.total_calls, 0);
        assert_eq!(status.failure_count, 0);
        assert!(circuit.is_healthy());
    }
}
