//! # Error Taxonomy
//!
//! Every failure the request pipeline can produce is expressed as an [`ApiError`].
//! The variants map onto the failure kinds the resilience layer reasons about:
//! transport failures, structured GraphQL errors, undecodable payloads, timeouts,
//! durable-storage failures and circuit-breaker rejections.
//!
//! `ApiError` is `Clone` because a deduplicated fetch hands the same outcome to
//! every caller that joined it.

use crate::config::ConfigurationError;
use crate::resilience::{CircuitBreakerError, RetryableError};
use crate::storage::StorageError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// HTTP-like status codes that indicate a transient condition worth retrying.
pub const RETRYABLE_STATUS_CODES: [u16; 5] = [408, 429, 502, 503, 504];

/// Coarse classification of an [`ApiError`], useful for metrics and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    Query,
    Parse,
    Timeout,
    Storage,
    CircuitOpen,
    Unavailable,
    Configuration,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Network => write!(f, "Network"),
            ErrorKind::Query => write!(f, "Query"),
            ErrorKind::Parse => write!(f, "Parse"),
            ErrorKind::Timeout => write!(f, "Timeout"),
            ErrorKind::Storage => write!(f, "Storage"),
            ErrorKind::CircuitOpen => write!(f, "Circuit Open"),
            ErrorKind::Unavailable => write!(f, "Unavailable"),
            ErrorKind::Configuration => write!(f, "Configuration"),
        }
    }
}

/// Errors produced by the data pipeline
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    /// Transport-level failure, optionally carrying the HTTP status code
    #[error("Network error{}: {message}", .status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    Network {
        status: Option<u16>,
        message: String,
    },

    /// The endpoint answered but reported structured GraphQL errors
    #[error("GraphQL query error: {}", .messages.join("; "))]
    Query { messages: Vec<String> },

    /// The payload could not be decoded into the expected structure
    #[error("Response parse error: {0}")]
    Parse(String),

    /// An operation did not complete within its allotted time and was abandoned
    #[error("Operation '{operation}' timed out after {}ms", .timeout.as_millis())]
    Timeout {
        operation: String,
        timeout: Duration,
    },

    /// Durable storage read/write failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// The circuit breaker refused to attempt the operation
    #[error("Service unavailable: circuit breaker is open for {component}")]
    CircuitOpen { component: String },

    /// Live fetch failed and no durable snapshot was available
    #[error("Could not reach service and no cached data available for '{key}': {source}")]
    Unavailable {
        key: String,
        #[source]
        source: Box<ApiError>,
    },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ApiError {
    /// Network failure without a status code (connection refused, DNS, reset, ...)
    pub fn network(message: impl Into<String>) -> Self {
        ApiError::Network {
            status: None,
            message: message.into(),
        }
    }

    /// Network failure carrying an HTTP status code
    pub fn http_status(status: u16, message: impl Into<String>) -> Self {
        ApiError::Network {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, timeout: Duration) -> Self {
        ApiError::Timeout {
            operation: operation.into(),
            timeout,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Network { .. } => ErrorKind::Network,
            ApiError::Query { .. } => ErrorKind::Query,
            ApiError::Parse(_) => ErrorKind::Parse,
            ApiError::Timeout { .. } => ErrorKind::Timeout,
            ApiError::Storage(_) => ErrorKind::Storage,
            ApiError::CircuitOpen { .. } => ErrorKind::CircuitOpen,
            ApiError::Unavailable { .. } => ErrorKind::Unavailable,
            ApiError::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// Status code carried by a network error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Network { status, .. } => *status,
            _ => None,
        }
    }
}

impl RetryableError for ApiError {
    fn is_retryable(&self) -> bool {
        match self {
            ApiError::Network {
                status: Some(code), ..
            } => RETRYABLE_STATUS_CODES.contains(code),
            // No status means a connection-level failure. Fatal DNS or config
            // errors land here too and are retried; attempts are bounded.
            ApiError::Network { status: None, .. } => true,
            ApiError::Timeout { .. } => true,
            ApiError::Query { .. }
            | ApiError::Parse(_)
            | ApiError::Storage(_)
            | ApiError::CircuitOpen { .. }
            | ApiError::Unavailable { .. }
            | ApiError::Configuration(_) => false,
        }
    }
}

impl From<CircuitBreakerError<ApiError>> for ApiError {
    fn from(error: CircuitBreakerError<ApiError>) -> Self {
        match error {
            CircuitBreakerError::CircuitOpen { component } => ApiError::CircuitOpen { component },
            CircuitBreakerError::OperationFailed(inner) => inner,
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(error: serde_json::Error) -> Self {
        ApiError::Parse(error.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(error: StorageError) -> Self {
        ApiError::Storage(error.to_string())
    }
}

impl From<ConfigurationError> for ApiError {
    fn from(error: ConfigurationError) -> Self {
        ApiError::Configuration(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
