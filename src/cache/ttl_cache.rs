//! # TTL Cache
//!
//! In-memory cache keyed by string with per-entry TTL, request deduplication
//! and capacity eviction.
//!
//! Concurrent `get` calls for the same missing key share one in-flight fetch:
//! the first caller's producer future is wrapped in a [`Shared`] future and
//! parked in the pending map, later callers clone and await it. Completion
//! stores a successful value and then clears the pending slot, so a caller
//! arriving between the two steps sees the fresh entry. Failures are never
//! stored and every joined caller receives the same error.
//!
//! Locks are never held across an await. When both maps are needed the
//! pending map is locked first.

use crate::cache::{CacheEntry, GetOptions, TtlCacheConfig};
use crate::clock::{system_clock, SharedClock};
use crate::events::{tracing_observer, ResilienceEvent, SharedObserver};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

type SharedFetch<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

struct PendingFetch<T, E>
where
    T: Clone,
    E: Clone,
{
    id: u64,
    future: SharedFetch<T, E>,
    started_at: Instant,
}

/// Point-in-time cache counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub pending: usize,
    pub hits: u64,
    pub misses: u64,
    /// Callers that joined an in-flight fetch
    pub deduplicated: u64,
    pub evictions: u64,
    /// Expired entries removed by reads or sweeps
    pub expirations: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            return 0.0;
        }
        self.hits as f64 / lookups as f64 * 100.0
    }
}

#[derive(Debug, Default)]
struct AtomicCacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    deduplicated: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

struct CacheInner<T, E>
where
    T: Clone,
    E: Clone,
{
    name: String,
    config: TtlCacheConfig,
    entries: Mutex<HashMap<String, CacheEntry<T>>>,
    pending: Mutex<HashMap<String, PendingFetch<T, E>>>,
    counters: AtomicCacheCounters,
    next_fetch_id: AtomicU64,
    clock: SharedClock,
    observer: SharedObserver,
}

/// String-keyed TTL cache with deduplicated fetches
///
/// Cloning is cheap and every clone shares the same storage.
pub struct TtlCache<T, E>
where
    T: Clone,
    E: Clone,
{
    inner: Arc<CacheInner<T, E>>,
}

impl<T, E> Clone for TtlCache<T, E>
where
    T: Clone,
    E: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E> std::fmt::Debug for TtlCache<T, E>
where
    T: Clone,
    E: Clone,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("name", &self.inner.name)
            .field("config", &self.inner.config)
            .field("entries", &self.inner.entries.lock().len())
            .field("pending", &self.inner.pending.lock().len())
            .finish()
    }
}

impl<T, E> TtlCache<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, config: TtlCacheConfig) -> Self {
        Self::builder(name, config).build()
    }

    pub fn builder(name: impl Into<String>, config: TtlCacheConfig) -> TtlCacheBuilder<T, E> {
        TtlCacheBuilder {
            name: name.into(),
            config,
            clock: None,
            observer: None,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn config(&self) -> &TtlCacheConfig {
        &self.inner.config
    }

    /// Return the cached value for `key` or produce, store and return it
    ///
    /// The producer is only invoked when there is no fresh entry and no
    /// in-flight fetch to join. It must not call back into this cache before
    /// returning its future.
    pub async fn get<F, Fut>(&self, key: &str, producer: F, options: GetOptions) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let ttl = options.ttl.unwrap_or(self.inner.config.default_ttl);

        if !options.enable_deduplication {
            if !options.force_refresh {
                if let Some(value) = self.inner.lookup(key) {
                    return Ok(value);
                }
            }
            let result = producer().await;
            if let Ok(value) = &result {
                self.inner.store(key, value.clone(), ttl);
            }
            return result;
        }

        let mut deferred = Vec::with_capacity(2);
        let fetch = {
            let mut pending = self.inner.pending.lock();

            if !options.force_refresh {
                let (hit, event) = self.inner.read(key);
                deferred.push(event);
                if let Some(value) = hit {
                    drop(pending);
                    self.inner.emit(&deferred);
                    return Ok(value);
                }
            }

            let now = self.inner.clock.now();
            let joinable = pending.get(key).and_then(|existing| {
                let age = now.saturating_duration_since(existing.started_at);
                if age <= self.inner.config.stale_pending_after {
                    Some(existing.future.clone())
                } else {
                    warn!(
                        cache = %self.inner.name,
                        key = %key,
                        age_ms = age.as_millis() as u64,
                        "Replacing stale pending fetch"
                    );
                    None
                }
            });

            match joinable {
                Some(future) => {
                    self.inner
                        .counters
                        .deduplicated
                        .fetch_add(1, Ordering::Relaxed);
                    deferred.push(ResilienceEvent::RequestDeduplicated {
                        key: key.to_string(),
                    });
                    future
                }
                None => {
                    let id = self.inner.next_fetch_id.fetch_add(1, Ordering::Relaxed);
                    let future = run_fetch(
                        Arc::downgrade(&self.inner),
                        key.to_string(),
                        id,
                        ttl,
                        producer(),
                    )
                    .boxed()
                    .shared();
                    pending.insert(
                        key.to_string(),
                        PendingFetch {
                            id,
                            future: future.clone(),
                            started_at: now,
                        },
                    );
                    future
                }
            }
        };
        self.inner.emit(&deferred);

        fetch.await
    }

    /// Store a value directly, bypassing any in-flight fetch
    pub fn set(&self, key: &str, value: T, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.inner.config.default_ttl);
        self.inner.store(key, value, ttl);
    }

    /// Fresh value without counting a hit or touching recency
    pub fn peek(&self, key: &str) -> Option<T> {
        let now = self.inner.clock.now();
        self.inner
            .entries
            .lock()
            .get(key)
            .filter(|entry| entry.is_valid(now))
            .map(|entry| entry.value.clone())
    }

    /// Whether a fresh entry exists; expired entries are dropped on the way
    pub fn has(&self, key: &str) -> bool {
        let now = self.inner.clock.now();
        let mut entries = self.inner.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.is_valid(now) => true,
            Some(_) => {
                entries.remove(key);
                self.inner
                    .counters
                    .expirations
                    .fetch_add(1, Ordering::Relaxed);
                false
            }
            None => false,
        }
    }

    pub fn delete(&self, key: &str) -> bool {
        self.inner.entries.lock().remove(key).is_some()
    }

    /// Drop every entry and forget in-flight fetches
    ///
    /// A fetch that is already running still completes for its callers and
    /// stores its value.
    pub fn clear(&self) {
        let abandoned = {
            let mut pending = self.inner.pending.lock();
            let count = pending.len();
            pending.clear();
            count
        };
        let removed = {
            let mut entries = self.inner.entries.lock();
            let count = entries.len();
            entries.clear();
            count
        };
        debug!(
            cache = %self.inner.name,
            removed = removed,
            abandoned_pending = abandoned,
            "Cache cleared"
        );
    }

    /// Remove expired entries and stale pending fetches
    pub fn cleanup(&self) -> usize {
        let now = self.inner.clock.now();

        let expired = {
            let mut entries = self.inner.entries.lock();
            let before = entries.len();
            entries.retain(|_, entry| entry.is_valid(now));
            before - entries.len()
        };
        self.inner
            .counters
            .expirations
            .fetch_add(expired as u64, Ordering::Relaxed);

        let stale_after = self.inner.config.stale_pending_after;
        let stale = {
            let mut pending = self.inner.pending.lock();
            let before = pending.len();
            pending.retain(|_, fetch| now.saturating_duration_since(fetch.started_at) <= stale_after);
            before - pending.len()
        };
        if stale > 0 {
            warn!(
                cache = %self.inner.name,
                stale_pending = stale,
                "Dropped stale pending fetches"
            );
        }

        let removed = expired + stale;
        if removed > 0 {
            self.inner
                .observer
                .on_event(&ResilienceEvent::CacheSwept { removed });
        }
        removed
    }

    /// Entry count, expired entries included until they are swept
    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.entries.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Entry metadata for diagnostics
    pub fn entry(&self, key: &str) -> Option<CacheEntry<T>> {
        self.inner.entries.lock().get(key).cloned()
    }

    pub fn stats(&self) -> CacheStats {
        let counters = &self.inner.counters;
        CacheStats {
            entries: self.len(),
            pending: self.pending_count(),
            hits: counters.hits.load(Ordering::Relaxed),
            misses: counters.misses.load(Ordering::Relaxed),
            deduplicated: counters.deduplicated.load(Ordering::Relaxed),
            evictions: counters.evictions.load(Ordering::Relaxed),
            expirations: counters.expirations.load(Ordering::Relaxed),
        }
    }
}

impl<T, E> CacheInner<T, E>
where
    T: Clone,
    E: Clone,
{
    /// Fresh value for `key`, counting the hit; expired entries are removed
    fn lookup(&self, key: &str) -> Option<T> {
        let (hit, event) = self.read(key);
        self.observer.on_event(&event);
        hit
    }

    /// Counted read; the hit or miss event is returned so callers holding
    /// the pending lock can emit it after releasing it
    fn read(&self, key: &str) -> (Option<T>, ResilienceEvent) {
        let now = self.clock.now();
        let hit = {
            let mut entries = self.entries.lock();
            match entries.get_mut(key) {
                Some(entry) if entry.is_valid(now) => {
                    entry.touch(now);
                    Some(entry.value.clone())
                }
                Some(_) => {
                    entries.remove(key);
                    self.counters.expirations.fetch_add(1, Ordering::Relaxed);
                    None
                }
                None => None,
            }
        };

        let key = key.to_string();
        let event = if hit.is_some() {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            ResilienceEvent::CacheHit { key }
        } else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            ResilienceEvent::CacheMiss { key }
        };
        (hit, event)
    }

    fn emit(&self, events: &[ResilienceEvent]) {
        for event in events {
            self.observer.on_event(event);
        }
    }

    fn store(&self, key: &str, value: T, ttl: Duration) {
        let now = self.clock.now();
        let evicted = {
            let mut entries = self.entries.lock();
            entries.insert(key.to_string(), CacheEntry::new(value, ttl, now));

            let excess = entries.len().saturating_sub(self.config.max_entries);
            let victims = self.config.eviction_policy.select_victims(&entries, excess);
            for victim in &victims {
                entries.remove(victim);
            }
            victims
        };

        if !evicted.is_empty() {
            self.counters
                .evictions
                .fetch_add(evicted.len() as u64, Ordering::Relaxed);
            debug!(
                cache = %self.name,
                evicted = evicted.len(),
                policy = ?self.config.eviction_policy,
                "Evicted entries over capacity"
            );
            self.observer
                .on_event(&ResilienceEvent::EntriesEvicted { keys: evicted });
        }
    }

    fn release_pending(&self, key: &str, id: u64) {
        let mut pending = self.pending.lock();
        if pending.get(key).is_some_and(|fetch| fetch.id == id) {
            pending.remove(key);
        }
    }
}

/// Clears the pending slot once the owning fetch settles or is dropped
struct PendingGuard<T, E>
where
    T: Clone,
    E: Clone,
{
    inner: Weak<CacheInner<T, E>>,
    key: String,
    id: u64,
}

impl<T, E> Drop for PendingGuard<T, E>
where
    T: Clone,
    E: Clone,
{
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.release_pending(&self.key, self.id);
        }
    }
}

async fn run_fetch<T, E, Fut>(
    inner: Weak<CacheInner<T, E>>,
    key: String,
    id: u64,
    ttl: Duration,
    fetch: Fut,
) -> Result<T, E>
where
    T: Clone,
    E: Clone,
    Fut: Future<Output = Result<T, E>>,
{
    let _guard = PendingGuard {
        inner: inner.clone(),
        key: key.clone(),
        id,
    };

    let result = fetch.await;
    if let Ok(value) = &result {
        if let Some(inner) = inner.upgrade() {
            inner.store(&key, value.clone(), ttl);
        }
    }
    result
}

/// Builder for [`TtlCache`]
pub struct TtlCacheBuilder<T, E> {
    name: String,
    config: TtlCacheConfig,
    clock: Option<SharedClock>,
    observer: Option<SharedObserver>,
    _marker: PhantomData<fn() -> (T, E)>,
}

impl<T, E> std::fmt::Debug for TtlCacheBuilder<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCacheBuilder")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<T, E> TtlCacheBuilder<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn observer(mut self, observer: SharedObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn build(self) -> TtlCache<T, E> {
        TtlCache {
            inner: Arc::new(CacheInner {
                name: self.name,
                config: self.config,
                entries: Mutex::new(HashMap::new()),
                pending: Mutex::new(HashMap::new()),
                counters: AtomicCacheCounters::default(),
                next_fetch_id: AtomicU64::new(0),
                clock: self.clock.unwrap_or_else(system_clock),
                observer: self.observer.unwrap_or_else(tracing_observer),
            }),
        }
    }
}
