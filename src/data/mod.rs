//! # Data Access
//!
//! Typed entry point for the app's datasets. Each [`DataKind`] knows its
//! GraphQL query, its cache lifetime and which [`PlayerContext`] fields shape
//! its cache key; [`ResilientDataSource`] runs the fetch path with cache,
//! resilience and durable fallback.

pub mod context;
pub mod kind;
pub mod source;

pub use context::{Faction, GameMode, PlayerContext};
pub use kind::DataKind;
pub use source::{DataRequest, FetchOutcome, Freshness, ResilientDataSource};
