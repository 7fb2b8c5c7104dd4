//! rdk-readiness
//!
//! Deployment Readiness Scorer: maps every component result to a 0–100
//! score, checks hard gates, and derives status, risk level, sizing and
//! rule-based recommendations. Any failed gate forces `Rejected`.

mod evaluator;
mod types;

pub use evaluator::{
    check_gates, component_scores, evaluate_readiness, max_observed_drawdown, recommendation,
    PhaseIssue, ReadinessInput,
};
pub use types::{
    write_assessment_json, ComponentScores, ComponentWeights, DeploymentRiskConfig, Gate,
    GateCheck, GateMargin, ReadinessAssessment, ReadinessConfig, ReadinessGates,
    ReadinessStatus, ReadinessWarning, RiskBands, RiskLevel, SizingRecommendation, SizingTable,
    StatusBands, WarningSeverity,
};
