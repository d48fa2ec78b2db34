//! # Resilient Data Source
//!
//! The full fetch path for one dataset:
//!
//! 1. fresh TTL cache entry, or join an in-flight fetch for the same key
//! 2. live query through circuit breaker and retry; success is cached and
//!    written to durable storage on a best-effort basis
//! 3. on failure, the last durable snapshot, served with a staleness advisory
//!
//! Stale snapshots are returned to the caller but never inserted into the
//! TTL cache, so the next call tries the live path again.

use super::{DataKind, PlayerContext};
use crate::api::{HttpQueryExecutor, SharedExecutor};
use crate::cache::{CacheSweeper, GetOptions, TtlCache};
use crate::clock::SharedClock;
use crate::config::CompanionConfig;
use crate::error::{ApiError, ErrorKind};
use crate::events::{tracing_observer, ResilienceEvent, SharedObserver};
use crate::resilience::{ExecuteOptions, Priority, ResilienceManager};
use crate::storage::{store_from_config, SnapshotStore};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// How current the returned data is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "freshness", rename_all = "snake_case")]
pub enum Freshness {
    /// From the TTL cache or a live fetch
    Fresh,
    /// From durable storage after the live path failed
    Stale {
        saved_at: DateTime<Utc>,
        advisory: String,
    },
}

/// Data plus its freshness
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchOutcome<T = Value> {
    pub data: T,
    pub freshness: Freshness,
}

impl<T> FetchOutcome<T> {
    pub fn fresh(data: T) -> Self {
        Self {
            data,
            freshness: Freshness::Fresh,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self.freshness, Freshness::Stale { .. })
    }

    pub fn advisory(&self) -> Option<&str> {
        match &self.freshness {
            Freshness::Fresh => None,
            Freshness::Stale { advisory, .. } => Some(advisory),
        }
    }

    fn try_map<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> Result<FetchOutcome<U>, E> {
        Ok(FetchOutcome {
            data: f(self.data)?,
            freshness: self.freshness,
        })
    }
}

/// One dataset request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRequest {
    pub kind: DataKind,
    pub context: PlayerContext,
    pub force_refresh: bool,
    pub priority: Priority,
}

impl DataRequest {
    pub fn new(kind: DataKind) -> Self {
        Self {
            kind,
            context: PlayerContext::default(),
            force_refresh: false,
            priority: Priority::Normal,
        }
    }

    pub fn with_context(mut self, context: PlayerContext) -> Self {
        self.context = context;
        self
    }

    pub fn force_refresh(mut self) -> Self {
        self.force_refresh = true;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn cache_key(&self) -> String {
        self.kind.cache_key(&self.context)
    }
}

/// Cache, resilience and durable fallback composed around a query executor
#[derive(Debug, Clone)]
pub struct ResilientDataSource {
    executor: SharedExecutor,
    manager: Arc<ResilienceManager>,
    cache: TtlCache<Value, ApiError>,
    snapshots: SnapshotStore,
    observer: SharedObserver,
    ttl_overrides: BTreeMap<String, u64>,
    enable_deduplication: bool,
}

impl ResilientDataSource {
    pub fn new(
        executor: SharedExecutor,
        manager: Arc<ResilienceManager>,
        cache: TtlCache<Value, ApiError>,
        snapshots: SnapshotStore,
    ) -> Self {
        Self {
            executor,
            manager,
            cache,
            snapshots,
            observer: tracing_observer(),
            ttl_overrides: BTreeMap::new(),
            enable_deduplication: true,
        }
    }

    /// Wire every component from configuration with an HTTP executor
    pub fn from_config(config: &CompanionConfig) -> Result<Self, ApiError> {
        let executor: SharedExecutor = Arc::new(HttpQueryExecutor::from_config(&config.api)?);
        Ok(Self::from_config_with(
            config,
            executor,
            crate::clock::system_clock(),
            tracing_observer(),
        ))
    }

    /// Wire from configuration with injected executor, clock and observer
    pub fn from_config_with(
        config: &CompanionConfig,
        executor: SharedExecutor,
        clock: SharedClock,
        observer: SharedObserver,
    ) -> Self {
        let manager = ResilienceManager::from_config(config)
            .clock(Arc::clone(&clock))
            .observer(Arc::clone(&observer))
            .build();
        let cache = TtlCache::builder("api_cache", config.cache.to_cache_config())
            .clock(clock)
            .observer(Arc::clone(&observer))
            .build();
        let snapshots =
            SnapshotStore::new(store_from_config(&config.storage)).with_observer(Arc::clone(&observer));

        Self {
            executor,
            manager: Arc::new(manager),
            cache,
            snapshots,
            observer,
            ttl_overrides: config.cache.ttl_overrides_seconds.clone(),
            enable_deduplication: config.cache.enable_deduplication,
        }
    }

    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_ttl_override(mut self, kind: DataKind, ttl: Duration) -> Self {
        self.ttl_overrides
            .insert(kind.name().to_string(), ttl.as_secs().max(1));
        self
    }

    pub fn cache(&self) -> &TtlCache<Value, ApiError> {
        &self.cache
    }

    pub fn manager(&self) -> &ResilienceManager {
        &self.manager
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    /// Start the background expiry sweep for this source's cache
    pub fn start_sweeper(&self) -> CacheSweeper {
        CacheSweeper::start(self.cache.clone(), self.cache.config().cleanup_interval)
    }

    pub fn ttl_for(&self, kind: DataKind) -> Duration {
        self.ttl_overrides
            .get(kind.name())
            .map(|seconds| Duration::from_secs(*seconds))
            .unwrap_or_else(|| kind.default_ttl())
    }

    /// Drop the cached entry for `request`; durable snapshots are kept
    pub fn invalidate(&self, request: &DataRequest) -> bool {
        self.cache.delete(&request.cache_key())
    }

    /// Fresh data, stale data with an advisory, or a single descriptive error
    pub async fn fetch(&self, request: &DataRequest) -> Result<FetchOutcome, ApiError> {
        let key = request.cache_key();
        let options = GetOptions {
            ttl: Some(self.ttl_for(request.kind)),
            force_refresh: request.force_refresh,
            enable_deduplication: self.enable_deduplication,
        };

        let producer = {
            let executor = Arc::clone(&self.executor);
            let manager = Arc::clone(&self.manager);
            let snapshots = self.snapshots.clone();
            let query = request.kind.query(&request.context);
            let execute_options =
                ExecuteOptions::new(request.kind.name()).with_priority(request.priority);
            let key = key.clone();

            move || async move {
                let data = manager
                    .execute(execute_options, || {
                        let executor = Arc::clone(&executor);
                        let query = query.clone();
                        async move { executor.execute(&query).await }
                    })
                    .await
                    .map_err(ApiError::from)?;

                snapshots.save(&key, &data).await;
                Ok(data)
            }
        };

        match self.cache.get(&key, producer, options).await {
            Ok(data) => Ok(FetchOutcome::fresh(data)),
            Err(error) => self.fall_back(&key, error).await,
        }
    }

    /// [`fetch`](Self::fetch) decoded into `T`
    pub async fn fetch_as<T: DeserializeOwned>(
        &self,
        request: &DataRequest,
    ) -> Result<FetchOutcome<T>, ApiError> {
        self.fetch(request)
            .await?
            .try_map(|data| serde_json::from_value(data).map_err(ApiError::from))
    }

    async fn fall_back(&self, key: &str, error: ApiError) -> Result<FetchOutcome, ApiError> {
        warn!(key = %key, error = %error, "Live fetch failed, checking durable snapshot");

        let Some(record) = self.snapshots.load::<Value>(key).await else {
            debug!(key = %key, "No snapshot to fall back on");
            return Err(match error.kind() {
                ErrorKind::Network | ErrorKind::Timeout | ErrorKind::CircuitOpen => {
                    ApiError::Unavailable {
                        key: key.to_string(),
                        source: Box::new(error),
                    }
                }
                _ => error,
            });
        };

        self.observer.on_event(&ResilienceEvent::StaleSnapshotServed {
            key: key.to_string(),
            saved_at: record.saved_at,
            cause: error.kind(),
        });

        let advisory = format!(
            "Showing data saved {} because the live request failed ({})",
            record.saved_at.format("%Y-%m-%d %H:%M UTC"),
            error.kind()
        );

        Ok(FetchOutcome {
            data: record.value,
            freshness: Freshness::Stale {
                saved_at: record.saved_at,
                advisory,
            },
        })
    }
}
