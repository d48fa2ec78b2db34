//! Cache entries and the capacity eviction policy

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// A cached value with its freshness bookkeeping
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub stored_at: Instant,
    pub ttl: Duration,
    /// Successful reads since the entry was stored
    pub hit_count: u64,
    pub last_accessed: Instant,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T, ttl: Duration, now: Instant) -> Self {
        Self {
            value,
            stored_at: now,
            ttl,
            hit_count: 0,
            last_accessed: now,
        }
    }

    /// Valid iff `now - stored_at <= ttl`
    pub fn is_valid(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) <= self.ttl
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.stored_at)
    }

    /// Record a successful read
    pub fn touch(&mut self, now: Instant) {
        self.hit_count += 1;
        self.last_accessed = now;
    }
}

/// Which entries go first when the cache is over capacity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Fewest lifetime hits first, oldest `stored_at` breaking ties
    #[default]
    LeastFrequentlyUsed,
    /// Oldest `last_accessed` first
    LeastRecentlyUsed,
}

impl EvictionPolicy {
    /// Keys to remove so that `entries` shrinks by `excess`
    pub fn select_victims<T>(
        &self,
        entries: &HashMap<String, CacheEntry<T>>,
        excess: usize,
    ) -> Vec<String> {
        if excess == 0 {
            return Vec::new();
        }

        let mut ranked: Vec<(&String, &CacheEntry<T>)> = entries.iter().collect();
        match self {
            EvictionPolicy::LeastFrequentlyUsed => ranked.sort_by(|(ka, a), (kb, b)| {
                (a.hit_count, a.stored_at, *ka).cmp(&(b.hit_count, b.stored_at, *kb))
            }),
            EvictionPolicy::LeastRecentlyUsed => ranked.sort_by(|(ka, a), (kb, b)| {
                (a.last_accessed, *ka).cmp(&(b.last_accessed, *kb))
            }),
        }

        ranked
            .into_iter()
            .take(excess)
            .map(|(key, _)| key.clone())
            .collect()
    }
}
