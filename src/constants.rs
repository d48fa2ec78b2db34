//! # System Constants
//!
//! Default tunables for the caching and resilience pipeline. Configuration
//! files override these; the values here are what a freshly constructed
//! component uses when nothing else is supplied.

/// Cache defaults
pub mod cache {
    /// Default entry time-to-live (5 minutes)
    pub const DEFAULT_TTL_SECONDS: u64 = 300;

    /// Default capacity before eviction kicks in
    pub const DEFAULT_MAX_ENTRIES: usize = 100;

    /// Background sweep interval (2 minutes)
    pub const DEFAULT_CLEANUP_INTERVAL_SECONDS: u64 = 120;

    /// Pending requests older than this are assumed leaked and dropped
    pub const STALE_PENDING_SECONDS: u64 = 30;
}

/// Circuit breaker defaults used by the composed resilience manager
pub mod circuit_breaker {
    pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
    pub const DEFAULT_SUCCESS_THRESHOLD: u32 = 3;
    pub const DEFAULT_TIMEOUT_SECONDS: u64 = 60;
    pub const DEFAULT_WINDOW_SECONDS: u64 = 300;
}

/// Retry defaults
pub mod retry {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
    pub const DEFAULT_BASE_DELAY_MS: u64 = 1_000;
    pub const DEFAULT_MAX_DELAY_MS: u64 = 10_000;
    pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

    /// Lower bound of the jitter factor; the upper bound is 1.0
    pub const JITTER_MIN_FACTOR: f64 = 0.5;
}

/// Resilience manager health thresholds
pub mod health {
    /// Exponential moving average smoothing factor for response times
    pub const LATENCY_SMOOTHING_FACTOR: f64 = 0.1;

    /// Below this success rate (percent) the pipeline is degraded
    pub const DEGRADED_SUCCESS_RATE_PERCENT: f64 = 90.0;

    /// Above this average latency the pipeline is degraded
    pub const DEGRADED_LATENCY_MS: f64 = 10_000.0;

    /// Above this average latency a slow-response recommendation is emitted
    pub const SLOW_RESPONSE_MS: f64 = 5_000.0;
}

/// Remote API defaults
pub mod api {
    pub const DEFAULT_ENDPOINT: &str = "https://api.tarkov.dev/graphql";
    pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 15;
    pub const USER_AGENT: &str = concat!("companion-core/", env!("CARGO_PKG_VERSION"));
}

/// Durable storage defaults
pub mod storage {
    /// Prefix applied to every snapshot key written to durable storage
    pub const SNAPSHOT_KEY_PREFIX: &str = "snapshot:";
    pub const DEFAULT_DIRECTORY: &str = "data/snapshots";
}
