//! End-to-end fetch path: cache, circuit breaker, retry and durable fallback

mod common;

use common::{service_unavailable, tasks_payload, FailingStore, Harness, ScriptedExecutor};
use companion_core::api::SharedExecutor;
use companion_core::cache::{TtlCache, TtlCacheConfig};
use companion_core::clock::ManualClock;
use companion_core::config::CompanionConfig;
use companion_core::data::{DataKind, DataRequest, GameMode, PlayerContext, ResilientDataSource};
use companion_core::error::{ApiError, ErrorKind};
use companion_core::events::{RecordingObserver, ResilienceEvent};
use companion_core::resilience::{CircuitState, ResilienceManager};
use companion_core::storage::SnapshotStore;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn tasks_request() -> DataRequest {
    DataRequest::new(DataKind::Tasks).with_context(PlayerContext::default().with_level(15))
}

#[tokio::test]
async fn test_cold_start_fetch_is_cached_within_ttl() {
    let harness = Harness::new(ScriptedExecutor::succeeding(tasks_payload(&["Debut"])));
    let request = tasks_request();

    let first = harness.source.fetch(&request).await.unwrap();
    assert!(!first.is_stale());
    assert_eq!(harness.executor.calls(), 1);

    harness.clock.advance(Duration::from_secs(9 * 60));
    let second = harness.source.fetch(&request).await.unwrap();
    assert_eq!(second.data, first.data);
    assert_eq!(harness.executor.calls(), 1);

    harness.clock.advance(Duration::from_secs(2 * 60));
    harness.source.fetch(&request).await.unwrap();
    assert_eq!(harness.executor.calls(), 2, "expired entry should refetch");

    let stats = harness.source.cache().stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 2);
}

#[tokio::test]
async fn test_circuit_opens_after_threshold_and_fails_fast() {
    let harness = Harness::new(ScriptedExecutor::failing(service_unavailable()));
    let request = tasks_request();
    let attempts_per_fetch = 3;

    for _ in 0..2 {
        let error = harness.source.fetch(&request).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Unavailable);
    }
    assert_eq!(harness.executor.calls(), 2 * attempts_per_fetch);
    assert_eq!(
        harness.source.manager().circuit_breaker().state(),
        CircuitState::Open
    );

    let error = harness.source.fetch(&request).await.unwrap_err();
    match &error {
        ApiError::Unavailable { source, .. } => {
            assert_eq!(source.kind(), ErrorKind::CircuitOpen)
        }
        other => panic!("expected Unavailable, got {other:?}"),
    }
    assert_eq!(
        harness.executor.calls(),
        2 * attempts_per_fetch,
        "open circuit must not invoke the executor"
    );
    assert_eq!(
        harness
            .observer
            .count(|e| matches!(e, ResilienceEvent::CircuitRejected { .. })),
        1
    );
}

#[tokio::test]
async fn test_circuit_recovers_through_half_open_probe() {
    let harness = Harness::new(ScriptedExecutor::failing(service_unavailable()));
    let request = tasks_request();

    for _ in 0..2 {
        harness.source.fetch(&request).await.unwrap_err();
    }
    let breaker = harness.source.manager().circuit_breaker();
    assert_eq!(breaker.state(), CircuitState::Open);

    harness.executor.set_default(Ok(tasks_payload(&["Shooting Cans"])));
    harness.clock.advance(Duration::from_millis(150));

    let outcome = harness.source.fetch(&request).await.unwrap();
    assert!(!outcome.is_stale());
    assert_eq!(breaker.state(), CircuitState::Closed);

    let transitions: Vec<_> = harness
        .observer
        .events()
        .into_iter()
        .filter_map(|e| match e {
            ResilienceEvent::CircuitStateChanged { from, to, .. } => Some((from, to)),
            _ => None,
        })
        .collect();
    assert_eq!(
        transitions,
        vec![
            (CircuitState::Closed, CircuitState::Open),
            (CircuitState::Open, CircuitState::HalfOpen),
            (CircuitState::HalfOpen, CircuitState::Closed),
        ]
    );
}

#[tokio::test]
async fn test_stale_snapshot_served_after_retries_exhausted() {
    let saved = tasks_payload(&["Debut", "Checking"]);
    let harness = Harness::new(ScriptedExecutor::succeeding(saved.clone()));
    let request = tasks_request();
    let key = request.cache_key();

    harness.source.fetch(&request).await.unwrap();
    assert!(harness.source.invalidate(&request));

    harness.executor.set_default(Err(ApiError::network("connection reset")));
    let outcome = harness.source.fetch(&request).await.unwrap();

    assert!(outcome.is_stale());
    assert_eq!(outcome.data, saved);
    assert!(outcome
        .advisory()
        .is_some_and(|advisory| advisory.contains("live request failed")));
    assert_eq!(harness.executor.calls(), 1 + 3);

    assert!(!harness.source.cache().has(&key), "stale data is never cached");
    assert_eq!(
        harness
            .observer
            .count(|e| matches!(e, ResilienceEvent::StaleSnapshotServed { cause: ErrorKind::Network, .. })),
        1
    );
    assert_eq!(
        harness
            .observer
            .count(|e| matches!(e, ResilienceEvent::RetriesExhausted { attempts: 3, .. })),
        1
    );
}

#[tokio::test]
async fn test_concurrent_callers_share_one_live_fetch() {
    let executor = Arc::new(
        ScriptedExecutor::with_default(Ok(tasks_payload(&["Gunsmith"])))
            .with_latency(Duration::from_millis(50)),
    );
    let harness = Harness::new(executor);
    let request = tasks_request();

    let fetches = (0..8).map(|_| {
        let source = harness.source.clone();
        let request = request.clone();
        tokio::spawn(async move { source.fetch(&request).await })
    });
    let results = futures::future::join_all(fetches).await;

    assert_eq!(harness.executor.calls(), 1);
    let first = results[0].as_ref().unwrap().as_ref().unwrap().data.clone();
    for result in results {
        assert_eq!(result.unwrap().unwrap().data, first);
    }
    assert!(
        harness
            .observer
            .count(|e| matches!(e, ResilienceEvent::RequestDeduplicated { .. }))
            >= 1
    );
    assert_eq!(harness.source.cache().pending_count(), 0);
}

#[tokio::test]
async fn test_query_errors_are_not_retried_and_propagate_unchanged() {
    let harness = Harness::new(ScriptedExecutor::failing(ApiError::Query {
        messages: vec!["Unknown argument gameMode".into()],
    }));

    let error = harness.source.fetch(&tasks_request()).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Query);
    assert_eq!(harness.executor.calls(), 1);
}

#[tokio::test]
async fn test_contexts_partition_the_cache() {
    let harness = Harness::new(ScriptedExecutor::succeeding(json!({ "items": [] })));

    let regular = DataRequest::new(DataKind::Items);
    let regular_high_level =
        DataRequest::new(DataKind::Items).with_context(PlayerContext::default().with_level(60));
    let pve = DataRequest::new(DataKind::Items)
        .with_context(PlayerContext::default().with_game_mode(GameMode::Pve));

    harness.source.fetch(&regular).await.unwrap();
    harness.source.fetch(&regular_high_level).await.unwrap();
    assert_eq!(harness.executor.calls(), 1, "items ignore player level");

    harness.source.fetch(&pve).await.unwrap();
    assert_eq!(harness.executor.calls(), 2);
    assert!(harness.executor.queries()[1].contains("gameMode: pve"));
}

#[tokio::test]
async fn test_force_refresh_bypasses_fresh_entry() {
    let harness = Harness::new(ScriptedExecutor::succeeding(tasks_payload(&["Debut"])));
    let request = tasks_request();

    harness.source.fetch(&request).await.unwrap();
    harness
        .executor
        .push(Ok(tasks_payload(&["Debut", "Delivery From the Past"])));

    let refreshed = harness.source.fetch(&request.clone().force_refresh()).await.unwrap();
    assert_eq!(harness.executor.calls(), 2);
    assert_eq!(refreshed.data["tasks"].as_array().map(Vec::len), Some(2));

    let cached = harness.source.fetch(&request).await.unwrap();
    assert_eq!(cached.data, refreshed.data);
    assert_eq!(harness.executor.calls(), 2);
}

#[tokio::test]
async fn test_storage_failures_never_fail_the_fetch() {
    let config = CompanionConfig::for_test();
    let executor = ScriptedExecutor::succeeding(tasks_payload(&["Debut"]));
    let observer = RecordingObserver::shared();
    let clock = ManualClock::shared();

    let manager = ResilienceManager::from_config(&config)
        .clock(clock.clone())
        .observer(observer.clone())
        .build();
    let cache = TtlCache::builder("api_cache", TtlCacheConfig::default())
        .clock(clock)
        .build();
    let snapshots = SnapshotStore::new(Arc::new(FailingStore)).with_observer(observer.clone());
    let source = ResilientDataSource::new(
        executor.clone() as SharedExecutor,
        Arc::new(manager),
        cache,
        snapshots,
    )
    .with_observer(observer.clone());

    let request = tasks_request();
    let outcome = source.fetch(&request).await.unwrap();
    assert!(!outcome.is_stale());
    assert_eq!(
        observer.count(|e| matches!(e, ResilienceEvent::StorageWriteFailed { .. })),
        1
    );

    source.invalidate(&request);
    executor.set_default(Err(service_unavailable()));
    let error = source.fetch(&request).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Unavailable);
    assert!(error.to_string().contains("no cached data available"));
    assert_eq!(
        observer.count(|e| matches!(e, ResilienceEvent::StorageReadFailed { .. })),
        1
    );
}

#[tokio::test]
async fn test_manager_metrics_reflect_pipeline_health() {
    let harness = Harness::new(ScriptedExecutor::failing(service_unavailable()));
    let request = tasks_request();

    for _ in 0..2 {
        harness.source.fetch(&request).await.unwrap_err();
    }

    let metrics = harness.source.manager().metrics();
    assert_eq!(metrics.requests.total_requests, 2);
    assert_eq!(metrics.requests.failed_requests, 2);
    assert_eq!(metrics.circuit_breaker.state, CircuitState::Open);
    assert_eq!(
        metrics.health_status,
        companion_core::resilience::HealthStatus::Unhealthy
    );
    assert!(!metrics.recommendations.is_empty());
}
