//! Runtime cache parameters and per-call options

use crate::cache::EvictionPolicy;
use crate::constants::cache as defaults;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Parameters for a [`TtlCache`](crate::cache::TtlCache) instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TtlCacheConfig {
    /// TTL used when a call does not override it
    pub default_ttl: Duration,

    pub max_entries: usize,

    /// Background sweep interval for [`CacheSweeper`](crate::cache::CacheSweeper)
    pub cleanup_interval: Duration,

    /// Pending fetches older than this are treated as leaked
    pub stale_pending_after: Duration,

    pub eviction_policy: EvictionPolicy,
}

impl TtlCacheConfig {
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn with_eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.eviction_policy = policy;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.default_ttl.is_zero() {
            return Err("default_ttl must be greater than 0".to_string());
        }

        if self.max_entries == 0 {
            return Err("max_entries must be greater than 0".to_string());
        }

        if self.cleanup_interval.is_zero() {
            return Err("cleanup_interval must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl Default for TtlCacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(defaults::DEFAULT_TTL_SECONDS),
            max_entries: defaults::DEFAULT_MAX_ENTRIES,
            cleanup_interval: Duration::from_secs(defaults::DEFAULT_CLEANUP_INTERVAL_SECONDS),
            stale_pending_after: Duration::from_secs(defaults::STALE_PENDING_SECONDS),
            eviction_policy: EvictionPolicy::default(),
        }
    }
}

/// Options for a single `TtlCache::get` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetOptions {
    /// Entry-specific TTL; falls back to the instance default
    pub ttl: Option<Duration>,

    /// Skip the freshness check and fetch again
    pub force_refresh: bool,

    /// Join an in-flight fetch for the same key instead of starting another
    pub enable_deduplication: bool,
}

impl GetOptions {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            ..Self::default()
        }
    }

    pub fn force_refresh() -> Self {
        Self {
            force_refresh: true,
            ..Self::default()
        }
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn without_deduplication(mut self) -> Self {
        self.enable_deduplication = false;
        self
    }
}

impl Default for GetOptions {
    fn default() -> Self {
        Self {
            ttl: None,
            force_refresh: false,
            enable_deduplication: true,
        }
    }
}
