//! Configuration Error Types
//!
//! Errors raised while loading, merging or validating the configuration tree.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors with enough context to act on
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A configuration file exists but could not be parsed
    #[error("Failed to parse configuration file '{file_path}': {reason}")]
    ParseError { file_path: String, reason: String },

    /// Layered sources could not be merged or deserialized into the tree
    #[error("Failed to build configuration: {error}")]
    BuildError { error: String },

    /// Explicit directory passed to the loader does not exist
    #[error("Configuration directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    /// One or more sections failed validation
    #[error("Invalid configuration: {}", .problems.join("; "))]
    Invalid { problems: Vec<String> },

    /// Invalid configuration value
    #[error("Invalid value '{value}' for field '{field}': {context}")]
    InvalidValue {
        field: String,
        value: String,
        context: String,
    },

    /// Environment-specific configuration issues
    #[error("Environment configuration error for '{environment}': {error}")]
    EnvironmentConfigError { environment: String, error: String },
}

impl ConfigurationError {
    pub fn parse_error<P: Into<String>, E: std::fmt::Display>(file_path: P, reason: E) -> Self {
        Self::ParseError {
            file_path: file_path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn build_error<E: std::fmt::Display>(error: E) -> Self {
        Self::BuildError {
            error: error.to_string(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value<F: Into<String>, V: Into<String>, C: Into<String>>(
        field: F,
        value: V,
        context: C,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            context: context.into(),
        }
    }

    /// Create an environment configuration error
    pub fn environment_config_error<E: Into<String>, R: std::fmt::Display>(
        environment: E,
        error: R,
    ) -> Self {
        Self::EnvironmentConfigError {
            environment: environment.into(),
            error: error.to_string(),
        }
    }
}

impl From<config::ConfigError> for ConfigurationError {
    fn from(error: config::ConfigError) -> Self {
        match error {
            config::ConfigError::FileParse { uri, cause } => Self::ParseError {
                file_path: uri.unwrap_or_else(|| "<unknown>".to_string()),
                reason: cause.to_string(),
            },
            other => Self::build_error(other),
        }
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigurationError>;
