//! In-process scenario tests for rdk-daemon HTTP endpoints.
//!
//! These tests spin up the Axum router **without** binding a TCP socket.
//! Each test calls `routes::build_router` and drives it via
//! `tower::ServiceExt::oneshot`, with no network I/O.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use rdk_backtest::StrategyRegistry;
use rdk_config::LoadedConfig;
use rdk_daemon::{routes, state};
use rdk_pipeline::{MemoryStore, Pipeline, ResultStore, ValidationConfig};
use rdk_schemas::{Side, Timeframe};
use rdk_testkit::{memory_source, trending_candles, PeriodicFactory};
use tower::ServiceExt; // oneshot
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_state() -> (Arc<state::AppState>, Arc<MemoryStore>) {
    make_state_retaining(state::DEFAULT_MAX_RETAINED_RUNS)
}

fn make_state_retaining(max_runs: usize) -> (Arc<state::AppState>, Arc<MemoryStore>) {
    let source = memory_source(&["UP1", "UP2"], &[Timeframe::H1], |symbol, tf| {
        let seed = symbol.bytes().map(u64::from).sum::<u64>();
        trending_candles(500, tf, 100.0, 0.002, 0.004, seed)
    })
    .unwrap();
    let mut registry = StrategyRegistry::new();
    registry
        .register(Arc::new(PeriodicFactory::new("periodic_long", Side::Long)))
        .unwrap();
    let mut config = ValidationConfig::default();
    config.pool.workers = 2;
    let pipeline = Pipeline::new(
        config,
        LoadedConfig::empty().config_hash,
        Arc::new(source),
        Arc::new(registry),
    )
    .unwrap();
    let store = Arc::new(MemoryStore::new());
    let st = Arc::new(
        state::AppState::new(Arc::new(pipeline), Arc::clone(&store) as Arc<dyn ResultStore>)
            .with_max_retained_runs(max_runs),
    );
    (st, store)
}

/// Drive the router with a single request and return (status, body_bytes).
async fn call(st: &Arc<state::AppState>, req: Request<axum::body::Body>) -> (StatusCode, bytes::Bytes) {
    let resp = routes::build_router(Arc::clone(st))
        .oneshot(req)
        .await
        .expect("oneshot failed");
    let status = resp.status();
    let body = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    (status, body)
}

fn get(uri: &str) -> Request<axum::body::Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<axum::body::Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body.to_string()))
        .unwrap()
}

/// Parse body bytes as a `serde_json::Value`.
fn parse_json(b: bytes::Bytes) -> serde_json::Value {
    serde_json::from_slice(&b).expect("body is not valid JSON")
}

fn good_body() -> serde_json::Value {
    serde_json::json!({
        "strategy_id": "periodic_long",
        "symbols": ["UP1", "UP2"],
        "timeframes": ["1h"],
        "simulation_count": 100
    })
}

async fn submit(st: &Arc<state::AppState>) -> Uuid {
    let (status, body) = call(st, post_json("/v1/validate", good_body())).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let json = parse_json(body);
    assert_eq!(json["state"], "running");
    serde_json::from_value(json["run_id"].clone()).unwrap()
}

/// Poll until the run leaves `running`.
async fn wait_finished(st: &Arc<state::AppState>, run_id: Uuid) -> serde_json::Value {
    for _ in 0..600 {
        let (status, body) = call(st, get(&format!("/v1/runs/{run_id}"))).await;
        assert_eq!(status, StatusCode::OK);
        let json = parse_json(body);
        if json["state"] != "running" {
            return json;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("run {run_id} did not finish");
}

// ---------------------------------------------------------------------------
// GET /v1/health, /v1/strategies
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_returns_200_ok_true() {
    let (st, _) = make_state();
    let (status, body) = call(&st, get("/v1/health")).await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    assert_eq!(json["ok"], true);
    assert_eq!(json["service"], "rdk-daemon");
    assert_eq!(json["config_hash"], LoadedConfig::empty().config_hash);
}

#[tokio::test]
async fn strategies_lists_registry() {
    let (st, _) = make_state();
    let (status, body) = call(&st, get("/v1/strategies")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_json(body)["strategies"], serde_json::json!(["periodic_long"]));
}

// ---------------------------------------------------------------------------
// POST /v1/validate
// ---------------------------------------------------------------------------

#[tokio::test]
async fn validate_rejects_bad_requests_with_400() {
    let (st, _) = make_state();

    let mut empty = good_body();
    empty["symbols"] = serde_json::json!([]);
    let (status, body) = call(&st, post_json("/v1/validate", empty)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let err = parse_json(body)["error"].as_str().unwrap().to_string();
    assert!(err.starts_with("CONFIG_INVALID"), "{err}");
    assert!(err.contains("symbols"), "{err}");

    let mut unknown = good_body();
    unknown["strategy_id"] = serde_json::json!("nope");
    let (status, body) = call(&st, post_json("/v1/validate", unknown)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(parse_json(body)["error"].as_str().unwrap().contains("nope"));

    assert!(st.runs.read().await.is_empty(), "rejected requests must not create runs");
}

#[tokio::test]
async fn validate_runs_to_completion_and_stores_result() {
    let (st, store) = make_state();
    let run_id = submit(&st).await;

    let json = wait_finished(&st, run_id).await;
    assert_eq!(json["state"], "finished");
    assert_eq!(json["cached"], false);
    assert_eq!(json["phase_failures"], serde_json::json!([]));
    let response = &json["response"];
    assert_eq!(response["run_id"], serde_json::json!(run_id));
    assert_eq!(response["phases"].as_array().unwrap().len(), 7);
    assert!(response["readiness"]["gates"].as_array().is_some_and(|g| !g.is_empty()));

    let stored = store.list(Some("periodic_long")).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].run_id, run_id);

    let (status, body) = call(&st, get("/v1/results/periodic_long/latest")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_json(body)["run_id"], serde_json::json!(run_id));

    let (status, body) = call(&st, get("/v1/runs")).await;
    assert_eq!(status, StatusCode::OK);
    let runs = parse_json(body);
    assert_eq!(runs["runs"].as_array().unwrap().len(), 1);
    assert_eq!(runs["runs"][0]["state"], "finished");
}

#[tokio::test]
async fn repeated_request_is_served_from_cache() {
    let (st, store) = make_state();
    let first = submit(&st).await;
    wait_finished(&st, first).await;

    let second = submit(&st).await;
    let json = wait_finished(&st, second).await;
    assert_eq!(json["cached"], true);
    assert_eq!(json["response"]["run_id"], serde_json::json!(first));
    assert_eq!(store.list(None).unwrap().len(), 1, "cache hits are not stored again");
}

// ---------------------------------------------------------------------------
// /v1/runs/:run_id
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_run_is_404() {
    let (st, _) = make_state();
    let id = Uuid::new_v4();
    let (status, _) = call(&st, get(&format!("/v1/runs/{id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&st, post_json(&format!("/v1/runs/{id}/cancel"), serde_json::json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&st, get("/v1/results/periodic_long/latest")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cancel_raises_flag_or_conflicts_when_done() {
    let (st, _) = make_state();
    let run_id = submit(&st).await;

    let (status, body) = call(&st, post_json(&format!("/v1/runs/{run_id}/cancel"), serde_json::json!({}))).await;
    let json = parse_json(body);
    match status {
        StatusCode::OK => {
            assert_eq!(json["cancel_requested"], true);
            let runs = st.runs.read().await;
            assert!(runs[&run_id].control.is_cancelled());
        }
        StatusCode::CONFLICT => assert_eq!(json["cancel_requested"], false),
        other => panic!("unexpected status {other}"),
    }

    wait_finished(&st, run_id).await;
    let (status, body) = call(&st, post_json(&format!("/v1/runs/{run_id}/cancel"), serde_json::json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(parse_json(body)["state"], "finished");
}

#[tokio::test]
async fn finished_runs_past_the_cap_are_evicted() {
    let (st, store) = make_state_retaining(1);
    let first = submit(&st).await;
    wait_finished(&st, first).await;
    let second = submit(&st).await;
    wait_finished(&st, second).await;

    let (status, _) = call(&st, get(&format!("/v1/runs/{first}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, body) = call(&st, get("/v1/runs")).await;
    assert_eq!(status, StatusCode::OK);
    let runs = parse_json(body);
    assert_eq!(runs["runs"].as_array().unwrap().len(), 1);
    assert_eq!(runs["runs"][0]["run_id"], serde_json::json!(second));

    // Eviction only trims the run table; stored results stay.
    assert_eq!(store.list(None).unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stream_is_event_stream() {
    let (st, _) = make_state();
    let resp = routes::build_router(Arc::clone(&st))
        .oneshot(get("/v1/stream"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let ct = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(ct.starts_with("text/event-stream"), "{ct}");
}

#[tokio::test]
async fn bus_carries_phase_events_then_run_finished() {
    let (st, _) = make_state();
    let mut rx = st.bus.subscribe();
    let run_id = submit(&st).await;

    let mut phase_events = 0;
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(30), rx.recv())
            .await
            .expect("bus timed out")
            .expect("bus closed");
        match msg {
            state::BusMsg::Phase { event } => {
                assert_eq!(event.run_id(), run_id);
                phase_events += 1;
            }
            state::BusMsg::RunFinished {
                run_id: finished,
                state,
                status,
                ..
            } => {
                assert_eq!(finished, run_id);
                assert_eq!(state, state::RunState::Finished);
                assert!(status.is_some());
                break;
            }
            _ => {}
        }
    }
    assert_eq!(phase_events, 14, "started + completed for each of 7 phases");
}
