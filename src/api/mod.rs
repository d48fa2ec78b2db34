//! # Remote API
//!
//! The query executor is the only way the pipeline reaches the GraphQL
//! endpoint. It distinguishes three failure kinds: transport failures
//! (optionally with an HTTP status), GraphQL `errors` in an otherwise valid
//! response, and payloads that cannot be decoded.

pub mod graphql;
pub mod http;

use crate::error::ApiError;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

pub use graphql::{parse_graphql_response, GraphQlError, GraphQlResponse};
pub use http::HttpQueryExecutor;

/// Executes a GraphQL query and returns its `data` member
#[async_trait]
pub trait QueryExecutor: Send + Sync + std::fmt::Debug {
    async fn execute(&self, query: &str) -> Result<Value, ApiError>;
}

/// Shared executor handle
pub type SharedExecutor = Arc<dyn QueryExecutor>;
