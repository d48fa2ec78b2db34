//! Layered configuration driving a fully wired data source

mod common;

use common::{service_unavailable, tasks_payload, Harness, ScriptedExecutor};
use companion_core::config::{ConfigLoader, ConfigurationError, StorageBackend};
use companion_core::data::{DataKind, DataRequest};
use companion_core::resilience::CircuitState;
use std::collections::HashMap;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

fn write_config(dir: &TempDir, name: &str, contents: &str) {
    fs::write(dir.path().join(name), contents).unwrap();
}

#[tokio::test]
async fn test_file_settings_flow_into_the_pipeline() {
    let config_dir = TempDir::new().unwrap();
    let snapshot_dir = TempDir::new().unwrap();

    write_config(
        &config_dir,
        "companion.toml",
        "[cache.ttl_overrides_seconds]\ntasks = 30\n",
    );
    write_config(
        &config_dir,
        "companion.test.toml",
        &format!(
            "[circuit_breaker]\nfailure_threshold = 1\n\n[storage]\nbackend = \"file\"\ndirectory = \"{}\"\n",
            snapshot_dir.path().display()
        ),
    );

    let overrides = HashMap::from([(
        "COMPANION__RETRY__MAX_ATTEMPTS".to_string(),
        "1".to_string(),
    )]);
    let config = ConfigLoader::new()
        .with_directory(config_dir.path())
        .with_environment("test")
        .with_overrides(overrides)
        .load()
        .unwrap();

    assert_eq!(config.storage.backend, StorageBackend::File);
    assert_eq!(config.retry.max_attempts, 1);
    assert_eq!(config.retry.base_delay_ms, 10, "test baseline is kept");

    let harness = Harness::with_config(
        &config,
        ScriptedExecutor::succeeding(tasks_payload(&["Debut"])),
    );
    assert_eq!(harness.source.ttl_for(DataKind::Tasks), Duration::from_secs(30));
    assert_eq!(harness.source.ttl_for(DataKind::Maps), DataKind::Maps.default_ttl());

    let request = DataRequest::new(DataKind::Tasks);
    harness.source.fetch(&request).await.unwrap();
    let snapshot_files = fs::read_dir(snapshot_dir.path()).unwrap().count();
    assert_eq!(snapshot_files, 1, "live success is persisted to disk");

    harness.clock.advance(Duration::from_secs(31));
    harness.executor.set_default(Err(service_unavailable()));
    let outcome = harness.source.fetch(&request).await.unwrap();

    assert!(outcome.is_stale());
    assert_eq!(harness.executor.calls(), 2, "single attempt per fetch");
    assert_eq!(
        harness.source.manager().circuit_breaker().state(),
        CircuitState::Open
    );
}

#[test]
fn test_invalid_layers_report_every_problem() {
    let config_dir = TempDir::new().unwrap();
    write_config(
        &config_dir,
        "companion.toml",
        "[retry]\nmax_attempts = 0\n\n[circuit_breaker]\nsuccess_threshold = 0\n",
    );

    let error = ConfigLoader::new()
        .with_directory(config_dir.path())
        .with_environment("development")
        .with_overrides(HashMap::new())
        .load()
        .unwrap_err();

    match error {
        ConfigurationError::Invalid { problems } => {
            assert_eq!(problems.len(), 2, "{problems:?}");
            assert!(problems.iter().any(|p| p.contains("retry.max_attempts")));
            assert!(problems.iter().any(|p| p.contains("success_threshold")));
        }
        other => panic!("expected Invalid, got {other:?}"),
    }
}

#[test]
fn test_malformed_file_is_a_parse_error() {
    let config_dir = TempDir::new().unwrap();
    write_config(&config_dir, "companion.toml", "[cache\nmax_entries = ");

    let error = ConfigLoader::new()
        .with_directory(config_dir.path())
        .with_environment("development")
        .with_overrides(HashMap::new())
        .load()
        .unwrap_err();

    assert!(
        matches!(error, ConfigurationError::ParseError { .. }),
        "{error:?}"
    );
}
