//! Results cache and result store.
//!
//! GREEN when:
//! - Concurrent requests for one key compute exactly once.
//! - Cancelled responses are returned but never cached.
//! - A changed request grid is a different cache key.
//! - Stores are append-only and list runs oldest first.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rdk_backtest::StrategyRegistry;
use rdk_config::LoadedConfig;
use rdk_pipeline::{
    EventSink, JsonDirStore, MemoryStore, Pipeline, PipelineError, ResultCache, ResultStore,
    ValidationConfig, ValidationRequest, ValidationResponse,
};
use rdk_readiness::ReadinessStatus;
use rdk_schemas::{RunControl, Side, Timeframe};
use rdk_testkit::{memory_source, trending_candles, PeriodicFactory};
use uuid::Uuid;

fn pipeline() -> Pipeline {
    let source = memory_source(&["UP1"], &[Timeframe::H1], |_, tf| {
        trending_candles(400, tf, 100.0, 0.002, 0.004, 5)
    })
    .unwrap();
    let mut registry = StrategyRegistry::new();
    registry
        .register(Arc::new(PeriodicFactory::new("periodic_long", Side::Long)))
        .unwrap();
    let mut config = ValidationConfig::default();
    config.pool.workers = 2;
    Pipeline::new(
        config,
        LoadedConfig::empty().config_hash,
        Arc::new(source),
        Arc::new(registry),
    )
    .unwrap()
}

fn request() -> ValidationRequest {
    ValidationRequest {
        strategy_id: "periodic_long".into(),
        symbols: vec!["UP1".into()],
        timeframes: vec![Timeframe::H1],
        lookback_days: 365,
        simulation_count: 50,
    }
}

fn finished_run(p: &Pipeline) -> ValidationResponse {
    p.run(&request(), &RunControl::new(), &EventSink::none()).unwrap()
}

#[test]
fn concurrent_requests_compute_once() {
    let p = pipeline();
    let response = finished_run(&p);
    assert!(response.is_cacheable());
    let key = p.cache_key(&request()).unwrap();

    let cache = Arc::new(ResultCache::new());
    let computed = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let computed = Arc::clone(&computed);
            let key = key.clone();
            let response = response.clone();
            thread::spawn(move || {
                cache
                    .get_or_compute(&key, || {
                        computed.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(50));
                        Ok::<_, PipelineError>(response)
                    })
                    .unwrap()
                    .run_id
            })
        })
        .collect();
    let ids: Vec<Uuid> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(computed.load(Ordering::SeqCst), 1);
    assert!(ids.iter().all(|id| *id == response.run_id));
    assert_eq!(cache.len(), 1);
}

#[test]
fn pipeline_cache_hit_returns_first_run() {
    let p = pipeline();
    let cache = ResultCache::new();
    let ctl = RunControl::new();
    let a = p
        .run_cached(&cache, Uuid::new_v4(), &request(), &ctl, &EventSink::none())
        .unwrap();
    let b = p
        .run_cached(&cache, Uuid::new_v4(), &request(), &ctl, &EventSink::none())
        .unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    let mut longer = request();
    longer.simulation_count = 60;
    assert_ne!(p.cache_key(&longer).unwrap(), p.cache_key(&request()).unwrap());
}

#[test]
fn cancelled_runs_are_not_cached() {
    let p = pipeline();
    let cache = ResultCache::new();
    let ctl = RunControl::new();
    ctl.cancel();

    let first = p
        .run_cached(&cache, Uuid::new_v4(), &request(), &ctl, &EventSink::none())
        .unwrap();
    assert_eq!(first.status, ReadinessStatus::Cancelled);
    assert!(cache.is_empty());

    let again = p
        .run_cached(&cache, Uuid::new_v4(), &request(), &RunControl::new(), &EventSink::none())
        .unwrap();
    assert_ne!(again.status, ReadinessStatus::Cancelled);
    assert_ne!(again.run_id, first.run_id);
    assert_eq!(cache.len(), 1);
}

fn exercise_store(store: &dyn ResultStore, p: &Pipeline) {
    let first = finished_run(p);
    let second = finished_run(p);
    assert!(second.run_timestamp >= first.run_timestamp);

    let k1 = store.save(&first).unwrap();
    let k2 = store.save(&second).unwrap();
    assert!(store.save(&first).is_err(), "saving a run twice must fail");

    let listed = store.list(Some("periodic_long")).unwrap();
    assert_eq!(listed, vec![k1.clone(), k2.clone()]);
    assert_eq!(store.list(None).unwrap().len(), 2);
    assert!(store.list(Some("other")).unwrap().is_empty());

    let loaded = store.load("periodic_long", k1.run_timestamp).unwrap().unwrap();
    assert_eq!(loaded.run_id, first.run_id);
    assert_eq!(loaded.request, first.request);
    assert_eq!(loaded.status, first.status);
    assert_eq!(loaded.phases, first.phases);
    assert_eq!(store.latest("periodic_long").unwrap().unwrap().run_id, second.run_id);
    assert!(store.load("other", k1.run_timestamp).unwrap().is_none());
}

#[test]
fn json_dir_store_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonDirStore::new(dir.path());
    exercise_store(&store, &pipeline());
    assert!(dir.path().join("periodic_long").is_dir());
}

#[test]
fn memory_store_round_trips() {
    exercise_store(&MemoryStore::new(), &pipeline());
}
