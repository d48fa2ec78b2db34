//! reqwest-backed GraphQL executor

use super::{graphql::parse_graphql_response, QueryExecutor};
use crate::config::ApiConfig;
use crate::constants::api::USER_AGENT;
use crate::error::ApiError;
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Posts `{"query": ...}` to the configured endpoint
///
/// The whole exchange (connect, send, read body) runs under one timeout; an
/// expired attempt is dropped, which aborts its connection.
#[derive(Debug, Clone)]
pub struct HttpQueryExecutor {
    client: Client,
    endpoint: Url,
    timeout: Duration,
}

impl HttpQueryExecutor {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, ApiError> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            ApiError::Configuration(format!("Invalid endpoint URL '{endpoint}': {e}"))
        })?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ApiError::Configuration(format!("Failed to create HTTP client: {e}")))?;

        info!(
            endpoint = %endpoint,
            timeout_ms = timeout.as_millis() as u64,
            "Created GraphQL executor"
        );

        Ok(Self {
            client,
            endpoint,
            timeout,
        })
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self, ApiError> {
        Self::new(&config.endpoint, config.request_timeout())
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn post(&self, query: &str) -> Result<Value, ApiError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&json!({ "query": query }))
            .send()
            .await
            .map_err(|e| ApiError::network(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            warn!(status = status.as_u16(), "GraphQL endpoint returned an error status");
            return Err(ApiError::http_status(
                status.as_u16(),
                format!("HTTP {status}: {}", truncate(&body, 200)),
            ));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::network(format!("failed to read response body: {e}")))?;

        debug!(bytes = body.len(), "GraphQL response received");
        parse_graphql_response(&body)
    }
}

#[async_trait]
impl QueryExecutor for HttpQueryExecutor {
    async fn execute(&self, query: &str) -> Result<Value, ApiError> {
        match tokio::time::timeout(self.timeout, self.post(query)).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::timeout("graphql_request", self.timeout)),
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => format!("{}...", &text[..index]),
        None => text.to_string(),
    }
}
