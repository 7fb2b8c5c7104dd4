//! Axum router and all HTTP handlers for rdk-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers.  All handlers are `pub(crate)` so the scenario tests in
//! `tests/` can compose the router directly.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use rdk_pipeline::PipelineError;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;
use uuid::Uuid;

use crate::{
    api_types::{
        CancelResponse, ErrorResponse, HealthResponse, RunResponse, RunSummary, RunsResponse,
        StrategiesResponse, ValidateAccepted, ValidateBody,
    },
    state::{AppState, BusMsg, RunState},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/strategies", get(strategies))
        .route("/v1/stream", get(stream))
        .route("/v1/validate", post(validate))
        .route("/v1/runs", get(list_runs))
        .route("/v1/runs/:run_id", get(get_run))
        .route("/v1/runs/:run_id/cancel", post(cancel_run))
        .route("/v1/results/:strategy_id/latest", get(latest_result))
        .with_state(state)
}

fn error(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, Json(ErrorResponse::new(msg))).into_response()
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
            config_hash: st.pipeline.config_hash().to_string(),
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/strategies
// ---------------------------------------------------------------------------

pub(crate) async fn strategies(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let strategies = st
        .pipeline
        .registry()
        .list()
        .into_iter()
        .map(str::to_string)
        .collect();
    (StatusCode::OK, Json(StrategiesResponse { strategies }))
}

// ---------------------------------------------------------------------------
// POST /v1/validate
// ---------------------------------------------------------------------------

/// Accept a validation request and run it in the background.
///
/// `202` with the run id; `400` when the request or strategy is rejected.
/// Progress arrives on `/v1/stream`, the result on `GET /v1/runs/:run_id`.
pub(crate) async fn validate(
    State(st): State<Arc<AppState>>,
    Json(body): Json<ValidateBody>,
) -> Response {
    match st.submit(body.into()).await {
        Ok(run_id) => {
            info!(%run_id, "validate accepted");
            (
                StatusCode::ACCEPTED,
                Json(ValidateAccepted {
                    run_id,
                    state: RunState::Running,
                }),
            )
                .into_response()
        }
        Err(e @ (PipelineError::ConfigurationInvalid(_) | PipelineError::UnknownStrategy(_))) => {
            error(StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(e) => error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/runs   GET /v1/runs/:run_id
// ---------------------------------------------------------------------------

pub(crate) async fn list_runs(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let runs = st.runs.read().await;
    let mut entries: Vec<_> = runs.values().collect();
    entries.sort_by_key(|e| e.submitted_at);
    let runs = entries
        .into_iter()
        .map(|e| RunSummary {
            run_id: e.run_id,
            strategy_id: e.strategy_id.clone(),
            state: e.state,
            status: e.response.as_ref().map(|r| r.status),
        })
        .collect();
    (StatusCode::OK, Json(RunsResponse { runs }))
}

pub(crate) async fn get_run(State(st): State<Arc<AppState>>, Path(run_id): Path<Uuid>) -> Response {
    let runs = st.runs.read().await;
    let Some(e) = runs.get(&run_id) else {
        return error(StatusCode::NOT_FOUND, format!("unknown run_id {run_id}"));
    };
    (
        StatusCode::OK,
        Json(RunResponse {
            run_id: e.run_id,
            strategy_id: e.strategy_id.clone(),
            state: e.state,
            cached: e.cached(),
            error: e.error.clone(),
            phase_failures: e
                .response
                .as_ref()
                .map(|r| r.phase_failures())
                .unwrap_or_default(),
            response: e.response.as_deref().cloned(),
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// POST /v1/runs/:run_id/cancel
// ---------------------------------------------------------------------------

/// `200` when the cancel flag was raised; `409` when the run already ended.
pub(crate) async fn cancel_run(
    State(st): State<Arc<AppState>>,
    Path(run_id): Path<Uuid>,
) -> Response {
    let runs = st.runs.read().await;
    let Some(e) = runs.get(&run_id) else {
        return error(StatusCode::NOT_FOUND, format!("unknown run_id {run_id}"));
    };
    let running = e.state == RunState::Running;
    if running {
        e.control.cancel();
        info!(%run_id, "cancel requested");
    }
    let status = if running {
        StatusCode::OK
    } else {
        StatusCode::CONFLICT
    };
    (
        status,
        Json(CancelResponse {
            run_id,
            cancel_requested: running,
            state: e.state,
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// GET /v1/results/:strategy_id/latest
// ---------------------------------------------------------------------------

pub(crate) async fn latest_result(
    State(st): State<Arc<AppState>>,
    Path(strategy_id): Path<String>,
) -> Response {
    match st.store.latest(&strategy_id) {
        Ok(Some(response)) => (StatusCode::OK, Json(response)).into_response(),
        Ok(None) => error(
            StatusCode::NOT_FOUND,
            format!("no stored results for strategy '{strategy_id}'"),
        ),
        Err(e) => error(StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}")),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(m.name()).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
