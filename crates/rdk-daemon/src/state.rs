//! Shared runtime state for rdk-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. Validation runs execute
//! on the blocking pool through `rdk_pipeline::spawn_cached_validation`; a
//! forwarding task relays their phase events onto the SSE bus and records the
//! outcome in the run table.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rdk_pipeline::{
    spawn_cached_validation, PhaseEvent, Pipeline, PipelineError, ResultCache, ResultStore,
    ValidationRequest, ValidationResponse,
};
use rdk_readiness::ReadinessStatus;
use rdk_schemas::RunControl;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// BusMsg: SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat {
        ts_millis: i64,
    },
    Phase {
        event: PhaseEvent,
    },
    RunFinished {
        run_id: Uuid,
        strategy_id: String,
        state: RunState,
        status: Option<ReadinessStatus>,
    },
    LogLine {
        level: String,
        msg: String,
    },
}

impl BusMsg {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            BusMsg::Heartbeat { .. } => "heartbeat",
            BusMsg::Phase { event } => event.name(),
            BusMsg::RunFinished { .. } => "run_finished",
            BusMsg::LogLine { .. } => "log",
        }
    }
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// Run table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Running,
    Finished,
    /// The pipeline returned an error or the worker task died.
    Failed,
}

#[derive(Debug, Clone)]
pub struct RunEntry {
    pub run_id: Uuid,
    pub strategy_id: String,
    pub submitted_at: DateTime<Utc>,
    pub control: RunControl,
    pub state: RunState,
    pub response: Option<Arc<ValidationResponse>>,
    pub error: Option<String>,
}

impl RunEntry {
    /// Served from the results cache rather than computed by this run.
    pub fn cached(&self) -> bool {
        self.response
            .as_ref()
            .is_some_and(|r| r.run_id != self.run_id)
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Finished or failed runs kept in the run table before the oldest are
/// evicted. Running entries are never evicted.
pub const DEFAULT_MAX_RETAINED_RUNS: usize = 256;

/// Shared across all Axum handlers behind an `Arc`.
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    /// Static build metadata.
    pub build: BuildInfo,
    pub pipeline: Arc<Pipeline>,
    pub cache: Arc<ResultCache>,
    /// Every freshly computed response is appended here.
    pub store: Arc<dyn ResultStore>,
    pub runs: Arc<RwLock<HashMap<Uuid, RunEntry>>>,
    pub max_retained_runs: usize,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>, store: Arc<dyn ResultStore>) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);
        Self {
            bus,
            build: BuildInfo {
                service: "rdk-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            pipeline,
            cache: Arc::new(ResultCache::new()),
            store,
            runs: Arc::new(RwLock::new(HashMap::new())),
            max_retained_runs: DEFAULT_MAX_RETAINED_RUNS,
        }
    }

    pub fn with_max_retained_runs(mut self, max: usize) -> Self {
        self.max_retained_runs = max;
        self
    }

    /// Validate `request` and start it in the background.
    ///
    /// # Errors
    /// Request or strategy problems are returned before anything is spawned.
    pub async fn submit(self: &Arc<Self>, request: ValidationRequest) -> Result<Uuid, PipelineError> {
        self.pipeline.check_request(&request)?;

        let run_id = Uuid::new_v4();
        let control = RunControl::new();
        self.runs.write().await.insert(
            run_id,
            RunEntry {
                run_id,
                strategy_id: request.strategy_id.clone(),
                submitted_at: Utc::now(),
                control: control.clone(),
                state: RunState::Running,
                response: None,
                error: None,
            },
        );
        info!(%run_id, strategy_id = %request.strategy_id, "validation submitted");

        let (handle, mut rx) = spawn_cached_validation(
            Arc::clone(&self.pipeline),
            Arc::clone(&self.cache),
            run_id,
            request,
            control,
        );

        let st = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let _ = st.bus.send(BusMsg::Phase { event });
            }
            let outcome = match handle.await {
                Ok(Ok(response)) => Ok(response),
                Ok(Err(e)) => Err(e.to_string()),
                Err(e) => Err(format!("RUNTIME: validation task failed: {e}")),
            };
            st.finish(run_id, outcome).await;
        });

        Ok(run_id)
    }

    async fn finish(&self, run_id: Uuid, outcome: Result<Arc<ValidationResponse>, String>) {
        if let Ok(response) = &outcome {
            if response.run_id == run_id {
                if let Err(e) = self.store.save(response) {
                    warn!(%run_id, error = %format!("{e:#}"), "result store save failed");
                    let _ = self.bus.send(BusMsg::LogLine {
                        level: "WARN".to_string(),
                        msg: format!("result store save failed for {run_id}: {e:#}"),
                    });
                }
            }
        }

        let msg = {
            let mut runs = self.runs.write().await;
            let Some(entry) = runs.get_mut(&run_id) else {
                return;
            };
            match outcome {
                Ok(response) => {
                    entry.state = RunState::Finished;
                    entry.response = Some(response);
                }
                Err(error) => {
                    warn!(%run_id, %error, "validation failed");
                    entry.state = RunState::Failed;
                    entry.error = Some(error);
                }
            }
            let msg = BusMsg::RunFinished {
                run_id,
                strategy_id: entry.strategy_id.clone(),
                state: entry.state,
                status: entry.response.as_ref().map(|r| r.status),
            };
            evict_finished(&mut runs, self.max_retained_runs);
            msg
        };
        info!(%run_id, "validation finished");
        let _ = self.bus.send(msg);
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Drop the oldest finished or failed entries until at most `max` remain.
fn evict_finished(runs: &mut HashMap<Uuid, RunEntry>, max: usize) {
    let mut done: Vec<(DateTime<Utc>, Uuid)> = runs
        .values()
        .filter(|e| e.state != RunState::Running)
        .map(|e| (e.submitted_at, e.run_id))
        .collect();
    if done.len() <= max {
        return;
    }
    done.sort();
    let excess = done.len() - max;
    for (_, run_id) in done.into_iter().take(excess) {
        runs.remove(&run_id);
    }
    debug!(evicted = excess, retained = runs.len(), "run table trimmed");
}

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}
