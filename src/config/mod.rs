//! # Companion Configuration System
//!
//! Serde configuration tree for the data pipeline. Every section has
//! defaults, so a missing file or a partial file is valid; durations are
//! plain integers (`*_ms` / `*_seconds`) in files and are converted into the
//! runtime structs of [`crate::cache`] and [`crate::resilience`] on demand.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use companion_core::config::ConfigLoader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Defaults, then config/companion.toml, then config/companion.{env}.toml,
//! // then COMPANION__SECTION__FIELD environment overrides
//! let config = ConfigLoader::new().load()?;
//!
//! let ttl = config.cache.default_ttl();
//! let breaker = config.circuit_breaker.to_resilience_config();
//! # let _ = (ttl, breaker);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::cache::{EvictionPolicy, TtlCacheConfig};
use crate::constants::{
    api as api_defaults, cache as cache_defaults, circuit_breaker as cb_defaults, health,
    retry as retry_defaults, storage as storage_defaults,
};
use crate::resilience::HealthThresholds;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigLoader;

/// Root configuration structure mirroring `config/companion.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanionConfig {
    /// Environment name (development, test, production)
    pub environment: String,

    pub api: ApiConfig,

    pub cache: CacheConfig,

    pub circuit_breaker: CircuitBreakerConfig,

    pub retry: RetryConfig,

    /// Health thresholds for the resilience manager
    pub resilience: ResilienceConfig,

    pub storage: StorageConfig,
}

/// Remote GraphQL endpoint settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub endpoint: String,

    pub request_timeout_seconds: u64,

    /// Name used for the circuit breaker and in logs
    pub component_name: String,
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.endpoint.trim().is_empty() {
            return Err("api.endpoint must not be empty".to_string());
        }

        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(format!(
                "api.endpoint must be an http(s) URL, got '{}'",
                self.endpoint
            ));
        }

        if self.request_timeout_seconds == 0 {
            return Err("api.request_timeout_seconds must be greater than 0".to_string());
        }

        if self.component_name.trim().is_empty() {
            return Err("api.component_name must not be empty".to_string());
        }

        Ok(())
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: api_defaults::DEFAULT_ENDPOINT.to_string(),
            request_timeout_seconds: api_defaults::DEFAULT_REQUEST_TIMEOUT_SECONDS,
            component_name: "graphql_api".to_string(),
        }
    }
}

/// In-memory cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub default_ttl_seconds: u64,

    pub max_entries: usize,

    pub cleanup_interval_seconds: u64,

    pub stale_pending_seconds: u64,

    pub eviction_policy: EvictionPolicy,

    pub enable_deduplication: bool,

    /// Per data kind TTL overrides, keyed by kind name (`tasks`, `items`, ...)
    pub ttl_overrides_seconds: BTreeMap<String, u64>,
}

impl CacheConfig {
    /// Get TTL as Duration
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_seconds)
    }

    pub fn ttl_override(&self, kind: &str) -> Option<Duration> {
        self.ttl_overrides_seconds
            .get(kind)
            .map(|seconds| Duration::from_secs(*seconds))
    }

    /// Convert to the cache module's runtime format
    pub fn to_cache_config(&self) -> TtlCacheConfig {
        TtlCacheConfig {
            default_ttl: self.default_ttl(),
            max_entries: self.max_entries,
            cleanup_interval: Duration::from_secs(self.cleanup_interval_seconds),
            stale_pending_after: Duration::from_secs(self.stale_pending_seconds),
            eviction_policy: self.eviction_policy,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        self.to_cache_config()
            .validate()
            .map_err(|problem| format!("cache.{problem}"))?;

        if let Some((kind, _)) = self
            .ttl_overrides_seconds
            .iter()
            .find(|(_, seconds)| **seconds == 0)
        {
            return Err(format!(
                "cache.ttl_overrides_seconds.{kind} must be greater than 0"
            ));
        }

        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_seconds: cache_defaults::DEFAULT_TTL_SECONDS,
            max_entries: cache_defaults::DEFAULT_MAX_ENTRIES,
            cleanup_interval_seconds: cache_defaults::DEFAULT_CLEANUP_INTERVAL_SECONDS,
            stale_pending_seconds: cache_defaults::STALE_PENDING_SECONDS,
            eviction_policy: EvictionPolicy::default(),
            enable_deduplication: true,
            ttl_overrides_seconds: BTreeMap::new(),
        }
    }
}

/// Circuit breaker settings as written in configuration files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failures inside the window that open the circuit
    pub failure_threshold: u32,

    /// Consecutive half-open successes that close the circuit
    pub success_threshold: u32,

    /// Time to wait in open state before attempting recovery
    pub timeout_ms: u64,

    /// Sliding failure window
    pub window_ms: u64,
}

impl CircuitBreakerConfig {
    /// Convert to resilience module's format
    pub fn to_resilience_config(&self) -> crate::resilience::CircuitBreakerConfig {
        crate::resilience::CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            success_threshold: self.success_threshold,
            timeout: Duration::from_millis(self.timeout_ms),
            window_size: Duration::from_millis(self.window_ms),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        self.to_resilience_config()
            .validate()
            .map_err(|problem| format!("circuit_breaker.{problem}"))
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: cb_defaults::DEFAULT_FAILURE_THRESHOLD,
            success_threshold: cb_defaults::DEFAULT_SUCCESS_THRESHOLD,
            timeout_ms: cb_defaults::DEFAULT_TIMEOUT_SECONDS * 1_000,
            window_ms: cb_defaults::DEFAULT_WINDOW_SECONDS * 1_000,
        }
    }
}

/// Retry settings as written in configuration files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl RetryConfig {
    /// Convert to resilience module's format
    pub fn to_resilience_config(&self) -> crate::resilience::RetryConfig {
        crate::resilience::RetryConfig {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            backoff_multiplier: self.backoff_multiplier,
            jitter: self.jitter,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        self.to_resilience_config()
            .validate()
            .map_err(|problem| format!("retry.{problem}"))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: retry_defaults::DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: retry_defaults::DEFAULT_BASE_DELAY_MS,
            max_delay_ms: retry_defaults::DEFAULT_MAX_DELAY_MS,
            backoff_multiplier: retry_defaults::DEFAULT_BACKOFF_MULTIPLIER,
            jitter: true,
        }
    }
}

/// Health evaluation thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    pub degraded_success_rate_percent: f64,
    pub degraded_latency_ms: f64,
    pub slow_response_ms: f64,
}

impl ResilienceConfig {
    pub fn to_health_thresholds(&self) -> HealthThresholds {
        HealthThresholds {
            degraded_success_rate_percent: self.degraded_success_rate_percent,
            degraded_latency_ms: self.degraded_latency_ms,
            slow_response_ms: self.slow_response_ms,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=100.0).contains(&self.degraded_success_rate_percent) {
            return Err(format!(
                "resilience.degraded_success_rate_percent must be within 0..=100, got {}",
                self.degraded_success_rate_percent
            ));
        }

        if self.degraded_latency_ms <= 0.0 || self.slow_response_ms <= 0.0 {
            return Err("resilience latency thresholds must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            degraded_success_rate_percent: health::DEGRADED_SUCCESS_RATE_PERCENT,
            degraded_latency_ms: health::DEGRADED_LATENCY_MS,
            slow_response_ms: health::SLOW_RESPONSE_MS,
        }
    }
}

/// Durable snapshot backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Process-local map, lost on exit
    Memory,
    /// One JSON file per key under `storage.directory`
    #[default]
    File,
}

/// Durable storage settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub directory: PathBuf,
}

impl StorageConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.backend == StorageBackend::File && self.directory.as_os_str().is_empty() {
            return Err("storage.directory is required for the file backend".to_string());
        }
        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            directory: PathBuf::from(storage_defaults::DEFAULT_DIRECTORY),
        }
    }
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            api: ApiConfig::default(),
            cache: CacheConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            retry: RetryConfig::default(),
            resilience: ResilienceConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl CompanionConfig {
    /// Create test-optimized configuration with millisecond timings
    pub fn for_test() -> Self {
        Self {
            environment: "test".to_string(),
            api: ApiConfig {
                request_timeout_seconds: 2,
                ..ApiConfig::default()
            },
            cache: CacheConfig {
                default_ttl_seconds: 1, // 1 second for rapid test feedback
                max_entries: 20,
                cleanup_interval_seconds: 1,
                ..CacheConfig::default()
            },
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: 2,
                success_threshold: 1,
                timeout_ms: 100,
                window_ms: 10_000,
            },
            retry: RetryConfig {
                max_attempts: 3,
                base_delay_ms: 10,
                max_delay_ms: 100,
                backoff_multiplier: 2.0,
                jitter: false,
            },
            resilience: ResilienceConfig::default(),
            storage: StorageConfig {
                backend: StorageBackend::Memory,
                ..StorageConfig::default()
            },
        }
    }

    /// Baseline for an environment before files and overrides are applied
    pub fn for_environment(environment: &str) -> Self {
        let base = match environment {
            "test" => Self::for_test(),
            _ => Self::default(),
        };
        Self {
            environment: environment.to_string(),
            ..base
        }
    }

    /// Validate every section, reporting all problems at once
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let problems: Vec<String> = [
            self.api.validate(),
            self.cache.validate(),
            self.circuit_breaker.validate(),
            self.retry.validate(),
            self.resilience.validate(),
            self.storage.validate(),
        ]
        .into_iter()
        .filter_map(Result::err)
        .collect();

        if self.environment.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "environment",
                "",
                "environment name must not be empty",
            ));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigurationError::Invalid { problems })
        }
    }

    pub fn is_test_environment(&self) -> bool {
        self.environment == "test"
    }

    pub fn is_production_environment(&self) -> bool {
        self.environment == "production"
    }
}
