use chrono::{DateTime, Utc};
use rdk_costs::CostDrag;
use rdk_markets::MultiMarketAggregate;
use rdk_montecarlo::MonteCarloAggregate;
use rdk_profit::ProfitReport;
use rdk_readiness::{ReadinessAssessment, ReadinessStatus};
use rdk_schemas::{Phase, Timeframe};
use rdk_walkforward::WalkForwardAggregate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PhaseFailure, PipelineError};

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidationRequest {
    pub strategy_id: String,
    pub symbols: Vec<String>,
    pub timeframes: Vec<Timeframe>,
    pub lookback_days: u32,
    /// Bootstrap resampling runs; overrides `monte_carlo.bootstrap.runs`.
    pub simulation_count: usize,
}

impl ValidationRequest {
    /// Grid and counts must be usable before any harness call.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let mut problems = Vec::new();
        if self.strategy_id.trim().is_empty() {
            problems.push("strategy_id must not be empty".to_string());
        }
        if self.symbols.is_empty() {
            problems.push("symbols must not be empty".to_string());
        }
        if self.symbols.iter().any(|s| s.trim().is_empty()) {
            problems.push("symbols must not contain empty names".to_string());
        }
        if self.timeframes.is_empty() {
            problems.push("timeframes must not be empty".to_string());
        }
        if self.lookback_days == 0 {
            problems.push("lookback_days must be >= 1".to_string());
        }
        if self.simulation_count == 0 {
            problems.push("simulation_count must be >= 1".to_string());
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::ConfigurationInvalid(format!(
                "request: {}",
                problems.join("; ")
            )))
        }
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseState {
    Completed,
    /// Completed with neutral metrics (no trades or zero variance).
    Degenerate,
    Failed,
    /// Not run because an upstream phase produced nothing to work on.
    Skipped,
}

impl PhaseState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseState::Completed => "completed",
            PhaseState::Degenerate => "degenerate",
            PhaseState::Failed => "failed",
            PhaseState::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseOutcome {
    pub phase: Phase,
    pub state: PhaseState,
    pub elapsed_ms: u64,
    pub failure: Option<PhaseFailure>,
}

impl PhaseOutcome {
    pub fn failure_message(&self) -> Option<String> {
        self.failure.as_ref().map(|f| f.describe(self.phase))
    }
}

/// The (symbol, timeframe) series used for profit, walk-forward and
/// Monte Carlo: the first grid cell whose data loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimarySeries {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub candle_count: usize,
    pub start_ts: i64,
    pub end_ts: i64,
    pub gross_trade_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResults {
    pub markets: Option<MultiMarketAggregate>,
    pub primary: Option<PrimarySeries>,
    pub cost_drag: Option<CostDrag>,
    pub profit: Option<ProfitReport>,
    pub walk_forward: Option<WalkForwardAggregate>,
    pub monte_carlo: Option<MonteCarloAggregate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResponse {
    pub run_id: Uuid,
    pub run_timestamp: DateTime<Utc>,
    pub request: ValidationRequest,
    pub config_hash: String,
    pub status: ReadinessStatus,
    pub phases: Vec<PhaseOutcome>,
    pub results: ValidationResults,
    pub readiness: ReadinessAssessment,
}

impl ValidationResponse {
    pub fn strategy_id(&self) -> &str {
        &self.request.strategy_id
    }

    pub fn recommendations(&self) -> &[String] {
        &self.readiness.recommendations
    }

    /// Stage-qualified reasons of every failed phase, in run order.
    pub fn phase_failures(&self) -> Vec<String> {
        self.phases
            .iter()
            .filter_map(PhaseOutcome::failure_message)
            .collect()
    }

    pub fn phase(&self, phase: Phase) -> Option<&PhaseOutcome> {
        self.phases.iter().find(|p| p.phase == phase)
    }

    /// Cancelled or partially timed-out runs are not reused.
    pub fn is_cacheable(&self) -> bool {
        self.status != ReadinessStatus::Cancelled
            && !self
                .phases
                .iter()
                .any(|p| p.failure.as_ref().is_some_and(PhaseFailure::is_timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ValidationRequest {
        ValidationRequest {
            strategy_id: "sma_cross".into(),
            symbols: vec!["BTCUSD".into()],
            timeframes: vec![Timeframe::H1],
            lookback_days: 365,
            simulation_count: 1_000,
        }
    }

    #[test]
    fn valid_request_passes() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn every_problem_is_listed() {
        let mut r = request();
        r.symbols.clear();
        r.simulation_count = 0;
        let msg = r.validate().unwrap_err().to_string();
        assert!(msg.contains("symbols"), "{msg}");
        assert!(msg.contains("simulation_count"), "{msg}");
    }
}
