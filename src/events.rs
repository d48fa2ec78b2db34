//! # Resilience Events
//!
//! Structured reporting for everything the pipeline absorbs instead of failing:
//! cache activity, breaker transitions, retry decisions and durable-storage
//! problems. Components receive a [`ResilienceObserver`] at construction, so tests
//! can assert on warnings through [`RecordingObserver`] instead of scraping logs.
//! [`TracingObserver`] is the production default and forwards events to `tracing`.

use crate::error::ErrorKind;
use crate::resilience::CircuitState;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Something noteworthy happened inside the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ResilienceEvent {
    CacheHit {
        key: String,
    },
    CacheMiss {
        key: String,
    },
    /// A caller joined an already in-flight fetch instead of starting its own
    RequestDeduplicated {
        key: String,
    },
    EntriesEvicted {
        keys: Vec<String>,
    },
    CacheSwept {
        removed: usize,
    },
    CircuitStateChanged {
        component: String,
        from: CircuitState,
        to: CircuitState,
    },
    CircuitRejected {
        component: String,
    },
    RetryScheduled {
        attempt: u32,
        delay: Duration,
        error: String,
    },
    RetriesExhausted {
        attempts: u32,
        error: String,
    },
    StorageReadFailed {
        key: String,
        error: String,
    },
    StorageWriteFailed {
        key: String,
        error: String,
    },
    /// The live fetch failed and a durable snapshot was served instead
    StaleSnapshotServed {
        key: String,
        saved_at: DateTime<Utc>,
        cause: ErrorKind,
    },
}

impl ResilienceEvent {
    /// Warnings are events a user or operator should hear about
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            ResilienceEvent::CircuitStateChanged {
                to: CircuitState::Open,
                ..
            } | ResilienceEvent::CircuitRejected { .. }
                | ResilienceEvent::RetriesExhausted { .. }
                | ResilienceEvent::StorageReadFailed { .. }
                | ResilienceEvent::StorageWriteFailed { .. }
                | ResilienceEvent::StaleSnapshotServed { .. }
        )
    }
}

/// Receives pipeline events
pub trait ResilienceObserver: Send + Sync + std::fmt::Debug {
    fn on_event(&self, event: &ResilienceEvent);
}

/// Shared observer handle
pub type SharedObserver = Arc<dyn ResilienceObserver>;

/// Observer that writes every event to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ResilienceObserver for TracingObserver {
    fn on_event(&self, event: &ResilienceEvent) {
        match event {
            ResilienceEvent::CacheHit { key } => tracing::trace!(key = %key, "Cache hit"),
            ResilienceEvent::CacheMiss { key } => tracing::trace!(key = %key, "Cache miss"),
            ResilienceEvent::RequestDeduplicated { key } => {
                tracing::debug!(key = %key, "Joined in-flight request")
            }
            ResilienceEvent::EntriesEvicted { keys } => {
                tracing::debug!(evicted = keys.len(), "Evicted cache entries over capacity")
            }
            ResilienceEvent::CacheSwept { removed } => {
                tracing::debug!(removed = removed, "Cache sweep completed")
            }
            ResilienceEvent::CircuitStateChanged {
                component,
                from,
                to,
            } => match to {
                CircuitState::Open => {
                    tracing::warn!(component = %component, from = ?from, to = ?to, "Circuit breaker state transition")
                }
                _ => {
                    tracing::info!(component = %component, from = ?from, to = ?to, "Circuit breaker state transition")
                }
            },
            ResilienceEvent::CircuitRejected { component } => {
                tracing::warn!(component = %component, "Circuit open, request rejected")
            }
            ResilienceEvent::RetryScheduled {
                attempt,
                delay,
                error,
            } => tracing::debug!(
                attempt = attempt,
                delay_ms = delay.as_millis(),
                error = %error,
                "Retrying after transient failure"
            ),
            ResilienceEvent::RetriesExhausted { attempts, error } => {
                tracing::warn!(attempts = attempts, error = %error, "Retries exhausted")
            }
            ResilienceEvent::StorageReadFailed { key, error } => {
                tracing::warn!(key = %key, error = %error, "Durable storage read failed")
            }
            ResilienceEvent::StorageWriteFailed { key, error } => {
                tracing::warn!(key = %key, error = %error, "Durable storage write failed")
            }
            ResilienceEvent::StaleSnapshotServed {
                key,
                saved_at,
                cause,
            } => tracing::warn!(
                key = %key,
                saved_at = %saved_at.to_rfc3339(),
                cause = %cause,
                "Serving stale snapshot after live fetch failure"
            ),
        }
    }
}

/// Observer that keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ResilienceEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn events(&self) -> Vec<ResilienceEvent> {
        self.events.lock().clone()
    }

    pub fn warnings(&self) -> Vec<ResilienceEvent> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.is_warning())
            .cloned()
            .collect()
    }

    /// Count events matching a predicate
    pub fn count(&self, predicate: impl Fn(&ResilienceEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl ResilienceObserver for RecordingObserver {
    fn on_event(&self, event: &ResilienceEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Default observer used when none is injected
pub fn tracing_observer() -> SharedObserver {
    Arc::new(TracingObserver)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_observer_collects_and_filters_warnings() {
        let observer = RecordingObserver::new();
        observer.on_event(&ResilienceEvent::CacheHit { key: "a".into() });
        observer.on_event(&ResilienceEvent::StorageWriteFailed {
            key: "a".into(),
            error: "disk full".into(),
        });
        observer.on_event(&ResilienceEvent::CircuitStateChanged {
            component: "graphql".into(),
            from: CircuitState::HalfOpen,
            to: CircuitState::Closed,
        });

        assert_eq!(observer.events().len(), 3);
        assert_eq!(observer.warnings().len(), 1);
        assert_eq!(
            observer.count(|e| matches!(e, ResilienceEvent::CacheHit { .. })),
            1
        );

        observer.clear();
        assert!(observer.events().is_empty());
    }

    #[test]
    fn test_events_serialize_with_tag() {
        let event = ResilienceEvent::CacheSwept { removed: 4 };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "cache_swept");
        assert_eq!(json["removed"], 4);
    }
}
