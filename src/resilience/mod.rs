//! # Resilience Module
//!
//! Fault tolerance for calls to the remote GraphQL endpoint.
//!
//! ## Architecture
//!
//! - **Circuit Breaker**: sheds load from a failing dependency using a sliding failure window
//! - **Retry Strategy**: exponential backoff with jitter for transient failures
//! - **Resilience Manager**: breaker wrapped around the whole retry sequence, plus metrics
//!
//! ## Usage
//!
//! ```rust,no_run
//! use companion_core::error::ApiError;
//! use companion_core::resilience::{
//!     CircuitBreakerConfig, ExecuteOptions, ResilienceManager, RetryConfig,
//! };
//!
//! # async fn example() -> Result<(), ApiError> {
//! let manager = ResilienceManager::new(
//!     "graphql_api",
//!     CircuitBreakerConfig::default(),
//!     RetryConfig::default(),
//! );
//!
//! let value = manager
//!     .execute(ExecuteOptions::new("tasks"), || async {
//!         Ok::<_, ApiError>("payload")
//!     })
//!     .await?;
//! # let _ = value;
//! # Ok(())
//! # }
//! ```

pub mod circuit_breaker;
pub mod config;
pub mod manager;
pub mod metrics;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerError, CircuitState};
pub use config::{CircuitBreakerConfig, RetryConfig};
pub use manager::{ExecuteOptions, Priority, ResilienceManager, ResilienceManagerBuilder};
pub use metrics::{CircuitBreakerStatus, HealthStatus, HealthThresholds, RequestMetrics, ResilienceMetrics};
pub use retry::{RetryStrategy, RetryableError};
