//! Request and response types for all rdk-daemon HTTP endpoints.
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded
//! by Axum and decoded by tests.  No business logic lives here.

use rdk_pipeline::{ValidationRequest, ValidationResponse};
use rdk_readiness::ReadinessStatus;
use rdk_schemas::Timeframe;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::RunState;

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
    pub config_hash: String,
}

// ---------------------------------------------------------------------------
// Errors (400 / 404 / 409)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// /v1/strategies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategiesResponse {
    pub strategies: Vec<String>,
}

// ---------------------------------------------------------------------------
// POST /v1/validate
// ---------------------------------------------------------------------------

fn default_lookback_days() -> u32 {
    365
}

fn default_simulation_count() -> usize {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidateBody {
    pub strategy_id: String,
    pub symbols: Vec<String>,
    pub timeframes: Vec<Timeframe>,
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    #[serde(default = "default_simulation_count")]
    pub simulation_count: usize,
}

impl From<ValidateBody> for ValidationRequest {
    fn from(b: ValidateBody) -> Self {
        ValidationRequest {
            strategy_id: b.strategy_id,
            symbols: b.symbols,
            timeframes: b.timeframes,
            lookback_days: b.lookback_days,
            simulation_count: b.simulation_count,
        }
    }
}

/// 202 body: the run was accepted and is executing in the background.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateAccepted {
    pub run_id: Uuid,
    pub state: RunState,
}

// ---------------------------------------------------------------------------
// /v1/runs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub strategy_id: String,
    pub state: RunState,
    pub status: Option<ReadinessStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunsResponse {
    pub runs: Vec<RunSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResponse {
    pub run_id: Uuid,
    pub strategy_id: String,
    pub state: RunState,
    /// True when the response was served from the results cache; its
    /// `run_id` is then the run that originally computed it.
    pub cached: bool,
    pub error: Option<String>,
    /// `<phase>: <reason>` for every failed phase of the response.
    pub phase_failures: Vec<String>,
    pub response: Option<ValidationResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    pub run_id: Uuid,
    pub cancel_requested: bool,
    pub state: RunState,
}
