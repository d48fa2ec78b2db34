#![allow(clippy::doc_markdown)] // Allow technical terms like GraphQL, TTL in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Companion Core
//!
//! Resilient caching and request pipeline behind the game companion app's
//! quest, hideout and item screens.
//!
//! ## Overview
//!
//! Data comes from a public GraphQL API that is sometimes slow, rate limited
//! or down. Requests pass through progressively staler tiers instead of
//! failing outright:
//!
//! 1. **TTL cache** with request deduplication and capacity eviction
//! 2. **Live fetch** wrapped in a circuit breaker and exponential-backoff retry
//! 3. **Durable snapshot** of the last good response, served with an advisory
//!
//! ## Module Organization
//!
//! - [`cache`] - TTL cache, deduplication, eviction, background sweeper, keys
//! - [`resilience`] - Circuit breaker, retry strategy, resilience manager, metrics
//! - [`storage`] - Durable key-value backends and the snapshot adapter
//! - [`api`] - GraphQL query executor
//! - [`data`] - Dataset kinds, player context and the composed data source
//! - [`config`] - Layered configuration loading
//! - [`events`] - Structured event reporting through an injected observer
//! - [`clock`] - Injectable time source
//! - [`error`] - Error taxonomy
//! - [`logging`] - `tracing` subscriber setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use companion_core::config::ConfigLoader;
//! use companion_core::data::{DataKind, DataRequest, PlayerContext, ResilientDataSource};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! companion_core::logging::init_structured_logging();
//!
//! let config = ConfigLoader::new().load()?;
//! let source = ResilientDataSource::from_config(&config)?;
//! let _sweeper = source.start_sweeper();
//!
//! let request = DataRequest::new(DataKind::Tasks)
//!     .with_context(PlayerContext::default().with_level(15));
//! let outcome = source.fetch(&request).await?;
//!
//! if let Some(advisory) = outcome.advisory() {
//!     println!("{advisory}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod constants;
pub mod data;
pub mod error;
pub mod events;
pub mod logging;
pub mod resilience;
pub mod storage;

pub use cache::{GetOptions, TtlCache};
pub use config::{CompanionConfig, ConfigurationError};
pub use data::{DataKind, DataRequest, FetchOutcome, ResilientDataSource};
pub use error::{ApiError, ErrorKind, Result};
pub use events::{ResilienceEvent, ResilienceObserver};
pub use resilience::{CircuitBreaker, ResilienceManager, RetryStrategy};
