#![allow(dead_code)]

pub mod strategies;

use async_trait::async_trait;
use companion_core::api::{QueryExecutor, SharedExecutor};
use companion_core::clock::{ManualClock, SharedClock};
use companion_core::config::CompanionConfig;
use companion_core::data::ResilientDataSource;
use companion_core::error::ApiError;
use companion_core::events::{RecordingObserver, SharedObserver};
use companion_core::storage::{DurableStore, StorageError};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Executor that replays queued responses, then repeats a default one
#[derive(Debug)]
pub struct ScriptedExecutor {
    script: Mutex<VecDeque<Result<Value, ApiError>>>,
    default: Mutex<Result<Value, ApiError>>,
    latency: Duration,
    calls: AtomicUsize,
    queries: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn succeeding(data: Value) -> Arc<Self> {
        Arc::new(Self::with_default(Ok(data)))
    }

    pub fn failing(error: ApiError) -> Arc<Self> {
        Arc::new(Self::with_default(Err(error)))
    }

    pub fn with_default(default: Result<Value, ApiError>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default: Mutex::new(default),
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn push(&self, response: Result<Value, ApiError>) {
        self.script.lock().push_back(response);
    }

    pub fn set_default(&self, response: Result<Value, ApiError>) {
        *self.default.lock() = response;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl QueryExecutor for ScriptedExecutor {
    async fn execute(&self, query: &str) -> Result<Value, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().push(query.to_string());

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let scripted = self.script.lock().pop_front();
        scripted.unwrap_or_else(|| self.default.lock().clone())
    }
}

/// Durable store whose every operation fails
#[derive(Debug, Default)]
pub struct FailingStore;

#[async_trait]
impl DurableStore for FailingStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Err(StorageError::io(key, "device unavailable"))
    }

    async fn set(&self, key: &str, _value: Value) -> Result<(), StorageError> {
        Err(StorageError::io(key, "quota exceeded"))
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        Err(StorageError::io(key, "device unavailable"))
    }

    fn backend_name(&self) -> &'static str {
        "failing"
    }
}

/// Everything a data-source test needs to drive and inspect the pipeline
pub struct Harness {
    pub source: ResilientDataSource,
    pub executor: Arc<ScriptedExecutor>,
    pub clock: Arc<ManualClock>,
    pub observer: Arc<RecordingObserver>,
}

impl Harness {
    pub fn new(executor: Arc<ScriptedExecutor>) -> Self {
        Self::with_config(&CompanionConfig::for_test(), executor)
    }

    pub fn with_config(config: &CompanionConfig, executor: Arc<ScriptedExecutor>) -> Self {
        let clock = ManualClock::shared();
        let observer = RecordingObserver::shared();
        let source = ResilientDataSource::from_config_with(
            config,
            Arc::clone(&executor) as SharedExecutor,
            Arc::clone(&clock) as SharedClock,
            Arc::clone(&observer) as SharedObserver,
        );

        Self {
            source,
            executor,
            clock,
            observer,
        }
    }
}

pub fn tasks_payload(names: &[&str]) -> Value {
    json!({
        "tasks": names
            .iter()
            .map(|name| json!({ "id": name.to_lowercase(), "name": name }))
            .collect::<Vec<_>>()
    })
}

pub fn service_unavailable() -> ApiError {
    ApiError::http_status(503, "Service Unavailable")
}
