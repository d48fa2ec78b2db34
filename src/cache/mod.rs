//! # Cache Module
//!
//! In-memory TTL cache sitting in front of the remote API.
//!
//! - [`TtlCache`]: per-entry TTL, request deduplication, capacity eviction
//! - [`CacheSweeper`]: background expiry with explicit start/stop
//! - [`cache_key`]: deterministic keys from query parameters
//!
//! ```rust
//! use companion_core::cache::{GetOptions, TtlCache, TtlCacheConfig};
//!
//! # tokio_test::block_on(async {
//! let cache: TtlCache<String, String> = TtlCache::new("docs", TtlCacheConfig::default());
//!
//! let value = cache
//!     .get("greeting", || async { Ok("hello".to_string()) }, GetOptions::default())
//!     .await;
//! assert_eq!(value, Ok("hello".to_string()));
//! assert!(cache.has("greeting"));
//! # });
//! ```

pub mod config;
pub mod entry;
pub mod keys;
pub mod sweeper;
pub mod ttl_cache;

pub use config::{GetOptions, TtlCacheConfig};
pub use entry::{CacheEntry, EvictionPolicy};
pub use keys::cache_key;
pub use sweeper::{CacheSweeper, Sweepable};
pub use ttl_cache::{CacheStats, TtlCache, TtlCacheBuilder};
