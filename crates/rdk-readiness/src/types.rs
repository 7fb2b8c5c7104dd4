use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use rdk_config::Violations;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Hard gates. Any failure rejects the strategy regardless of score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReadinessGates {
    pub min_markets_passed: usize,
    pub require_market_verdict: bool,
    /// Maximum walk-forward overfitting score (0–100).
    pub max_overfitting_score: f64,
    pub max_probability_of_ruin: f64,
    pub min_net_sharpe: f64,
    /// Max observed drawdown must stay strictly below this fraction.
    pub max_drawdown: f64,
}

impl Default for ReadinessGates {
    fn default() -> Self {
        Self {
            min_markets_passed: 4,
            require_market_verdict: true,
            max_overfitting_score: 60.0,
            max_probability_of_ruin: 0.05,
            min_net_sharpe: 0.5,
            max_drawdown: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComponentWeights {
    pub markets: f64,
    pub profit: f64,
    pub walk_forward: f64,
    pub robustness: f64,
}

impl Default for ComponentWeights {
    fn default() -> Self {
        Self {
            markets: 0.30,
            profit: 0.30,
            walk_forward: 0.20,
            robustness: 0.20,
        }
    }
}

/// Lower readiness-score bounds of the passing statuses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatusBands {
    pub approved: f64,
    pub conditional: f64,
}

impl Default for StatusBands {
    fn default() -> Self {
        Self {
            approved: 85.0,
            conditional: 70.0,
        }
    }
}

/// Lower drawdown bounds of the Medium, High and Extreme risk levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RiskBands {
    pub medium: f64,
    pub high: f64,
    pub extreme: f64,
}

impl Default for RiskBands {
    fn default() -> Self {
        Self {
            medium: 0.15,
            high: 0.30,
            extreme: 0.50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SizingRecommendation {
    pub position_size_pct: f64,
    pub max_exposure_pct: f64,
    pub daily_loss_limit_pct: f64,
}

impl SizingRecommendation {
    pub const fn new(position_size_pct: f64, max_exposure_pct: f64, daily_loss_limit_pct: f64) -> Self {
        Self {
            position_size_pct,
            max_exposure_pct,
            daily_loss_limit_pct,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SizingTable {
    pub low: SizingRecommendation,
    pub medium: SizingRecommendation,
    pub high: SizingRecommendation,
    pub extreme: SizingRecommendation,
}

impl Default for SizingTable {
    fn default() -> Self {
        Self {
            low: SizingRecommendation::new(5.0, 50.0, 3.0),
            medium: SizingRecommendation::new(3.0, 30.0, 2.0),
            high: SizingRecommendation::new(1.5, 15.0, 1.0),
            extreme: SizingRecommendation::new(0.5, 5.0, 0.5),
        }
    }
}

impl SizingTable {
    pub fn for_level(&self, level: RiskLevel) -> SizingRecommendation {
        match level {
            RiskLevel::Low => self.low,
            RiskLevel::Medium => self.medium,
            RiskLevel::High => self.high,
            RiskLevel::Extreme => self.extreme,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReadinessConfig {
    pub gates: ReadinessGates,
    pub weights: ComponentWeights,
    pub status: StatusBands,
    pub risk: RiskBands,
    pub sizing: SizingTable,
    /// A passing gate within this relative distance of its threshold is marginal.
    pub marginal_band: f64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            gates: ReadinessGates::default(),
            weights: ComponentWeights::default(),
            status: StatusBands::default(),
            risk: RiskBands::default(),
            sizing: SizingTable::default(),
            marginal_band: 0.10,
        }
    }
}

impl ReadinessConfig {
    pub fn validate_into(&self, path: &str, v: &mut Violations) {
        let g = &self.gates;
        v.at_least(&format!("{path}.gates.min_markets_passed"), g.min_markets_passed, 1);
        v.score(&format!("{path}.gates.max_overfitting_score"), g.max_overfitting_score);
        v.fraction(&format!("{path}.gates.max_probability_of_ruin"), g.max_probability_of_ruin);
        v.finite(&format!("{path}.gates.min_net_sharpe"), g.min_net_sharpe);
        v.open_fraction(&format!("{path}.gates.max_drawdown"), g.max_drawdown);

        let w = &self.weights;
        v.weights(
            &format!("{path}.weights"),
            &[
                ("markets", w.markets),
                ("profit", w.profit),
                ("walk_forward", w.walk_forward),
                ("robustness", w.robustness),
            ],
        );

        let s = &self.status;
        v.score(&format!("{path}.status.approved"), s.approved);
        v.score(&format!("{path}.status.conditional"), s.conditional);
        if s.conditional >= s.approved {
            v.push(&format!("{path}.status"), "conditional must be below approved");
        }

        let r = &self.risk;
        v.open_fraction(&format!("{path}.risk.medium"), r.medium);
        v.open_fraction(&format!("{path}.risk.high"), r.high);
        v.open_fraction(&format!("{path}.risk.extreme"), r.extreme);
        if !(r.medium < r.high && r.high < r.extreme) {
            v.push(&format!("{path}.risk"), "bands must be strictly ascending (medium < high < extreme)");
        }

        for (name, s) in [
            ("low", &self.sizing.low),
            ("medium", &self.sizing.medium),
            ("high", &self.sizing.high),
            ("extreme", &self.sizing.extreme),
        ] {
            v.score(&format!("{path}.sizing.{name}.position_size_pct"), s.position_size_pct);
            v.score(&format!("{path}.sizing.{name}.max_exposure_pct"), s.max_exposure_pct);
            v.score(&format!("{path}.sizing.{name}.daily_loss_limit_pct"), s.daily_loss_limit_pct);
        }
        v.open_fraction(&format!("{path}.marginal_band"), self.marginal_band);
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReadinessStatus {
    Approved,
    Conditional,
    NeedsImprovement,
    Rejected,
    /// Caller aborted the run; distinct from a rejection.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Extreme,
}

impl ReadinessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadinessStatus::Approved => "APPROVED",
            ReadinessStatus::Conditional => "CONDITIONAL",
            ReadinessStatus::NeedsImprovement => "NEEDS_IMPROVEMENT",
            ReadinessStatus::Rejected => "REJECTED",
            ReadinessStatus::Cancelled => "CANCELLED",
        }
    }
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Extreme => "EXTREME",
        }
    }
}

impl RiskBands {
    pub fn level(&self, max_drawdown: f64) -> RiskLevel {
        if max_drawdown >= self.extreme {
            RiskLevel::Extreme
        } else if max_drawdown >= self.high {
            RiskLevel::High
        } else if max_drawdown >= self.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    PhasesCompleted,
    MarketsPassed,
    MarketVerdict,
    OverfittingScore,
    ProbabilityOfRuin,
    NetSharpe,
    MaxDrawdown,
}

impl Gate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gate::PhasesCompleted => "phases_completed",
            Gate::MarketsPassed => "markets_passed",
            Gate::MarketVerdict => "market_verdict",
            Gate::OverfittingScore => "overfitting_score",
            Gate::ProbabilityOfRuin => "probability_of_ruin",
            Gate::NetSharpe => "net_sharpe",
            Gate::MaxDrawdown => "max_drawdown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateMargin {
    Failed,
    Marginal,
    Comfortable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningSeverity {
    /// Caps the status at NeedsImprovement.
    Soft,
    /// Informational; never changes the status.
    Advisory,
}

// ---------------------------------------------------------------------------
// Assessment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateCheck {
    pub gate: Gate,
    pub value: f64,
    pub threshold: f64,
    pub margin: GateMargin,
}

impl GateCheck {
    pub fn passed(&self) -> bool {
        self.margin != GateMargin::Failed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessWarning {
    pub severity: WarningSeverity,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    pub markets: f64,
    pub profit: f64,
    pub walk_forward: f64,
    pub robustness: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessAssessment {
    pub strategy_id: String,
    pub component_scores: ComponentScores,
    /// 0–100 weighted blend of the component scores.
    pub readiness_score: f64,
    pub status: ReadinessStatus,
    pub risk_level: RiskLevel,
    pub max_observed_drawdown: f64,
    pub sizing: SizingRecommendation,
    pub gates: Vec<GateCheck>,
    /// Stable-ordered failed gate descriptions. Non-empty means Rejected.
    pub critical_failures: Vec<String>,
    pub warnings: Vec<ReadinessWarning>,
    pub recommendations: Vec<String>,
}

/// Default risk configuration handed to a live or paper trading deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentRiskConfig {
    pub strategy_id: String,
    /// Only Approved and Conditional strategies may be deployed.
    pub deployable: bool,
    pub risk_level: RiskLevel,
    pub position_size_pct: f64,
    pub max_exposure_pct: f64,
    pub daily_loss_limit_pct: f64,
}

impl ReadinessAssessment {
    /// Assessment for a run the caller aborted.
    pub fn cancelled(strategy_id: impl Into<String>, sizing: &SizingTable) -> Self {
        Self {
            strategy_id: strategy_id.into(),
            component_scores: ComponentScores::default(),
            readiness_score: 0.0,
            status: ReadinessStatus::Cancelled,
            risk_level: RiskLevel::Extreme,
            max_observed_drawdown: 0.0,
            sizing: sizing.extreme,
            gates: Vec::new(),
            critical_failures: Vec::new(),
            warnings: Vec::new(),
            recommendations: Vec::new(),
        }
    }

    pub fn deployment_risk_config(&self) -> DeploymentRiskConfig {
        DeploymentRiskConfig {
            strategy_id: self.strategy_id.clone(),
            deployable: matches!(
                self.status,
                ReadinessStatus::Approved | ReadinessStatus::Conditional
            ),
            risk_level: self.risk_level,
            position_size_pct: self.sizing.position_size_pct,
            max_exposure_pct: self.sizing.max_exposure_pct,
            daily_loss_limit_pct: self.sizing.daily_loss_limit_pct,
        }
    }
}

/// Write the assessment as pretty-printed JSON to
/// `out_dir/readiness_assessment.json`. Returns the path written.
pub fn write_assessment_json(out_dir: &Path, assessment: &ReadinessAssessment) -> Result<PathBuf> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("create assessment dir failed: {}", out_dir.display()))?;
    let path = out_dir.join("readiness_assessment.json");
    let json = serde_json::to_string_pretty(assessment).context("serialize readiness assessment failed")?;
    fs::write(&path, format!("{json}\n"))
        .with_context(|| format!("write readiness assessment failed: {}", path.display()))?;
    Ok(path)
}
