//! # Logging
//!
//! Environment-aware structured logging for the data pipeline. Console
//! output by default, JSON lines when `COMPANION_LOG_FORMAT=json`.
//! `RUST_LOG` takes precedence over the level derived from the environment.

use crate::config::loader::ENVIRONMENT_VARIABLE;
use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Variable selecting the output format (`json` or `console`)
pub const LOG_FORMAT_VARIABLE: &str = "COMPANION_LOG_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Console,
    Json,
}

impl LogFormat {
    fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_lowercase()) {
            Some(v) if v == "json" => LogFormat::Json,
            _ => LogFormat::Console,
        }
    }
}

/// Install the global `tracing` subscriber once per process
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let format = LogFormat::parse(std::env::var(LOG_FORMAT_VARIABLE).ok().as_deref());
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));

        let layer = match format {
            LogFormat::Json => fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true)
                .with_filter(filter)
                .boxed(),
            LogFormat::Console => fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_filter(filter)
                .boxed(),
        };

        // An embedding app may already have installed its own subscriber
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Existing tracing subscriber kept");
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            format = ?format,
            "Structured logging initialized"
        );
    });
}

/// Deployment environment, `development` when unset
fn get_environment() -> String {
    std::env::var(ENVIRONMENT_VARIABLE).unwrap_or_else(|_| "development".to_string())
}

/// Default filter directive when `RUST_LOG` is unset
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log the outcome of one dataset fetch
pub fn log_fetch_operation(
    kind: &str,
    key: &str,
    status: &str,
    stale: bool,
    duration_ms: Option<u64>,
) {
    tracing::info!(
        kind = %kind,
        key = %key,
        status = %status,
        stale = stale,
        duration_ms = duration_ms,
        timestamp = %Utc::now().to_rfc3339(),
        "FETCH_OPERATION"
    );
}

/// Log a failure with the component and operation it came from
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "ERROR"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_logs_at_info_everything_else_at_debug() {
        assert_eq!(get_log_level("production"), "info");
        for environment in ["test", "development", "staging"] {
            assert_eq!(get_log_level(environment), "debug");
        }
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!(LogFormat::parse(Some("json")), LogFormat::Json);
        assert_eq!(LogFormat::parse(Some(" JSON ")), LogFormat::Json);
        assert_eq!(LogFormat::parse(Some("pretty")), LogFormat::Console);
        assert_eq!(LogFormat::parse(None), LogFormat::Console);
    }

    #[test]
    fn test_init_is_idempotent() {
        init_structured_logging();
        init_structured_logging();
        log_fetch_operation("tasks", "tasks:default", "ok", false, Some(12));
    }
}
