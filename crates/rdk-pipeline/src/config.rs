//! Typed, validated pipeline configuration.
//!
//! A document is loaded with `rdk_config::load_layered_yaml*`, its optional
//! top-level `preset:` key selects the base values, and the rest of the
//! document is merged on top. Every section denies unknown keys.

use std::time::Duration;

use rdk_backtest::HarnessConfig;
use rdk_config::{apply_overrides, ConfigError, LoadedConfig, Violations};
use rdk_costs::CostConfig;
use rdk_markets::MarketsConfig;
use rdk_montecarlo::MonteCarloConfig;
use rdk_profit::ProfitConfig;
use rdk_readiness::ReadinessConfig;
use rdk_schemas::Phase;
use rdk_walkforward::{WalkForwardConfig, WalkForwardValidator};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    #[default]
    Standard,
    /// Stricter gates and thresholds.
    Conservative,
    /// Looser gates for exploratory screening.
    Aggressive,
}

impl Preset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::Standard => "standard",
            Preset::Conservative => "conservative",
            Preset::Aggressive => "aggressive",
        }
    }

    pub fn defaults(&self) -> ValidationConfig {
        let mut c = ValidationConfig {
            preset: *self,
            harness: HarnessConfig::default(),
            markets: MarketsConfig::default(),
            costs: CostConfig::default(),
            profit: ProfitConfig::default(),
            walk_forward: WalkForwardConfig::default(),
            monte_carlo: MonteCarloConfig::default(),
            readiness: ReadinessConfig::default(),
            pool: PoolConfig::default(),
            budgets: PhaseBudgets::default(),
        };
        match self {
            Preset::Standard => {}
            Preset::Conservative => {
                c.markets.checklist.min_sharpe = 0.8;
                c.markets.checklist.max_drawdown = 0.20;
                c.markets.verdict.min_markets_passed = 5;
                c.markets.verdict.min_pass_rate = 0.7;
                c.markets.verdict.min_mean_sharpe = 0.8;
                c.markets.verdict.max_mean_drawdown = 0.20;
                c.walk_forward.windows = 6;
                c.monte_carlo.bootstrap.ruin_threshold = 0.3;
                c.monte_carlo.stress.max_drawdown = 0.35;
                c.readiness.gates.min_markets_passed = 5;
                c.readiness.gates.max_overfitting_score = 50.0;
                c.readiness.gates.max_probability_of_ruin = 0.02;
                c.readiness.gates.min_net_sharpe = 0.8;
                c.readiness.gates.max_drawdown = 0.30;
                c.readiness.status.approved = 90.0;
                c.readiness.status.conditional = 75.0;
            }
            Preset::Aggressive => {
                c.markets.checklist.min_fitness = 0.3;
                c.markets.checklist.min_sharpe = 0.3;
                c.markets.checklist.max_drawdown = 0.35;
                c.markets.verdict.min_markets_passed = 3;
                c.markets.verdict.min_pass_rate = 0.5;
                c.markets.verdict.min_mean_sharpe = 0.3;
                c.markets.verdict.max_mean_drawdown = 0.35;
                c.readiness.gates.min_markets_passed = 3;
                c.readiness.gates.max_overfitting_score = 70.0;
                c.readiness.gates.max_probability_of_ruin = 0.10;
                c.readiness.gates.min_net_sharpe = 0.3;
                c.readiness.status.approved = 80.0;
                c.readiness.status.conditional = 65.0;
            }
        }
        c
    }
}

/// Bounded worker pool shared by cells, windows and simulations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolConfig {
    pub workers: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

/// Per-phase time budgets in milliseconds. `None` means unbounded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhaseBudgets {
    pub multi_market_ms: Option<u64>,
    pub primary_backtest_ms: Option<u64>,
    pub walk_forward_ms: Option<u64>,
    pub monte_carlo_ms: Option<u64>,
}

impl PhaseBudgets {
    pub fn budget(&self, phase: Phase) -> Option<Duration> {
        let ms = match phase {
            Phase::MultiMarket => self.multi_market_ms,
            Phase::PrimaryBacktest => self.primary_backtest_ms,
            Phase::WalkForward => self.walk_forward_ms,
            Phase::MonteCarlo => self.monte_carlo_ms,
            Phase::ExecutionCost | Phase::ProfitAnalysis | Phase::Readiness => None,
        };
        ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidationConfig {
    pub preset: Preset,
    pub harness: HarnessConfig,
    pub markets: MarketsConfig,
    pub costs: CostConfig,
    pub profit: ProfitConfig,
    pub walk_forward: WalkForwardConfig,
    pub monte_carlo: MonteCarloConfig,
    pub readiness: ReadinessConfig,
    pub pool: PoolConfig,
    pub budgets: PhaseBudgets,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Preset::Standard.defaults()
    }
}

impl ValidationConfig {
    /// Preset defaults with `doc` merged on top, then range-checked.
    pub fn from_document(doc: &Value) -> Result<Self, PipelineError> {
        let preset = match doc.get("preset") {
            None | Some(Value::Null) => Preset::Standard,
            Some(v) => serde_json::from_value::<Preset>(v.clone()).map_err(|e| {
                PipelineError::ConfigurationInvalid(format!(
                    "preset: expected standard | conservative | aggressive ({e})"
                ))
            })?,
        };
        let config = apply_overrides(&preset.defaults(), doc)
            .map_err(|e| PipelineError::ConfigurationInvalid(format!("{e:#}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_loaded(loaded: &LoadedConfig) -> Result<Self, PipelineError> {
        Self::from_document(&loaded.config_json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut v = Violations::new();
        v.positive("harness.initial_capital", self.harness.initial_capital);
        v.at_least("harness.full_activity_trades", self.harness.full_activity_trades, 1);
        self.markets.validate_into("markets", &mut v);
        self.costs.validate_into("costs", &mut v);
        self.profit.validate_into("profit", &mut v);
        self.walk_forward.validate_into("walk_forward", &mut v);
        self.monte_carlo.validate_into("monte_carlo", &mut v);
        self.readiness.validate_into("readiness", &mut v);
        v.at_least("pool.workers", self.pool.workers, 1);
        v.into_result()
    }

    /// Walk-forward windows are judged by the market checklist's thresholds.
    pub fn walk_forward_validator(&self) -> WalkForwardValidator {
        WalkForwardValidator::new(self.walk_forward.clone())
            .with_thresholds(self.markets.checklist.thresholds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn every_preset_is_valid() {
        for p in [Preset::Standard, Preset::Conservative, Preset::Aggressive] {
            assert!(p.defaults().validate().is_ok(), "{}", p.as_str());
        }
    }

    #[test]
    fn preset_key_selects_base() {
        let c = ValidationConfig::from_document(&json!({
            "preset": "conservative",
            "readiness": {"gates": {"min_net_sharpe": 1.0}}
        }))
        .unwrap();
        assert_eq!(c.preset, Preset::Conservative);
        assert_eq!(c.readiness.gates.max_probability_of_ruin, 0.02);
        assert_eq!(c.readiness.gates.min_net_sharpe, 1.0);
    }

    #[test]
    fn walk_forward_follows_market_checklist() {
        let c = ValidationConfig::from_document(&json!({
            "preset": "conservative",
            "markets": {"checklist": {"min_sharpe": 1.1}}
        }))
        .unwrap();
        let t = *c.walk_forward_validator().thresholds();
        assert_eq!(t.min_sharpe, 1.1);
        assert_eq!(t.max_drawdown, 0.20);
        assert_eq!(t, c.markets.checklist.thresholds());

        let err = ValidationConfig::from_document(&json!({
            "walk_forward": {"min_sharpe": 0.9}
        }))
        .unwrap_err();
        assert!(err.to_string().contains("min_sharpe"), "{err}");
    }

    #[test]
    fn unknown_preset_is_invalid() {
        let err = ValidationConfig::from_document(&json!({"preset": "yolo"})).unwrap_err();
        assert!(matches!(err, PipelineError::ConfigurationInvalid(_)));
    }

    #[test]
    fn zero_budget_maps_to_duration() {
        let b = PhaseBudgets {
            walk_forward_ms: Some(0),
            ..PhaseBudgets::default()
        };
        assert_eq!(b.budget(Phase::WalkForward), Some(Duration::ZERO));
        assert_eq!(b.budget(Phase::Readiness), None);
    }
}
