//! rdk-montecarlo
//!
//! Monte Carlo Simulator: three independent robustness analyses plus a blended
//! score.
//!
//! - bootstrap: resample per-trade returns, distribution of terminal outcomes
//! - sensitivity: perturb each tunable parameter over a grid
//! - stress: replay on crash / volatility / adverse-drift transformed candles
//!
//! Parallel work uses rayon's ambient pool; callers bound it by running inside
//! `ThreadPool::install`.

mod bootstrap;
pub mod resample;
mod sensitivity;
mod stress;

pub use bootstrap::{run_bootstrap, BootstrapAggregate, BootstrapConfig, MonteCarloRun};
pub use resample::{bootstrap_ci, ConfidenceInterval, Resampler};
pub use sensitivity::{run_sensitivity, SensitivityConfig, SensitivityPoint, SensitivityReport};
pub use stress::{
    adverse_drift, exposure_bias, flash_crash, run_stress, volatility_expansion, StressConfig,
    StressReport, StressResult, StressScenario,
};

use rdk_backtest::{Harness, ParamSet, StrategyFactory};
use rdk_config::Violations;
use rdk_schemas::stats::clamp_score;
use rdk_schemas::{Candle, Interrupted, PhaseGuard, Trade};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Everything the parameter and stress analyses replay.
#[derive(Clone, Copy)]
pub struct StrategyUnderTest<'a> {
    pub harness: &'a Harness,
    pub factory: &'a dyn StrategyFactory,
    pub params: &'a ParamSet,
    pub candles: &'a [Candle],
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RobustnessWeights {
    pub probability_of_profit: f64,
    pub survival: f64,
    pub parameters: f64,
    pub stress: f64,
}

impl Default for RobustnessWeights {
    fn default() -> Self {
        Self {
            probability_of_profit: 0.35,
            survival: 0.25,
            parameters: 0.2,
            stress: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonteCarloConfig {
    pub bootstrap: BootstrapConfig,
    pub sensitivity: SensitivityConfig,
    pub stress: StressConfig,
    pub weights: RobustnessWeights,
    /// `(1 − ruin)^exponent` multiplies the blended score.
    pub ruin_penalty_exponent: f64,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            bootstrap: BootstrapConfig::default(),
            sensitivity: SensitivityConfig::default(),
            stress: StressConfig::default(),
            weights: RobustnessWeights::default(),
            ruin_penalty_exponent: 4.0,
        }
    }
}

impl MonteCarloConfig {
    pub fn validate_into(&self, path: &str, v: &mut Violations) {
        self.bootstrap.validate_into(&format!("{path}.bootstrap"), v);
        self.sensitivity.validate_into(&format!("{path}.sensitivity"), v);
        self.stress.validate_into(&format!("{path}.stress"), v);
        let w = &self.weights;
        v.weights(
            &format!("{path}.weights"),
            &[
                ("probability_of_profit", w.probability_of_profit),
                ("survival", w.survival),
                ("parameters", w.parameters),
                ("stress", w.stress),
            ],
        );
        v.non_negative(&format!("{path}.ruin_penalty_exponent"), self.ruin_penalty_exponent);
    }
}

// ---------------------------------------------------------------------------
// Aggregate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloAggregate {
    pub bootstrap: BootstrapAggregate,
    pub sensitivity: SensitivityReport,
    pub stress: StressReport,
    /// 0–100, higher is more robust.
    pub robustness_score: f64,
}

impl MonteCarloAggregate {
    pub fn probability_of_ruin(&self) -> f64 {
        self.bootstrap.probability_of_ruin
    }
}

/// `100 × weighted(P(profit), 1 − ruin, param flag, stress flag) × (1 − ruin)^exp`.
pub fn robustness_score(
    bootstrap: &BootstrapAggregate,
    robust_to_parameters: bool,
    robust_to_stress: bool,
    config: &MonteCarloConfig,
) -> f64 {
    let w = &config.weights;
    let ruin = bootstrap.probability_of_ruin.clamp(0.0, 1.0);
    let flag = |b: bool| if b { 1.0 } else { 0.0 };
    let blended = w.probability_of_profit * bootstrap.probability_of_profit
        + w.survival * (1.0 - ruin)
        + w.parameters * flag(robust_to_parameters)
        + w.stress * flag(robust_to_stress);
    clamp_score(100.0 * blended * (1.0 - ruin).powf(config.ruin_penalty_exponent))
}

pub struct MonteCarloSimulator {
    config: MonteCarloConfig,
}

impl MonteCarloSimulator {
    pub fn new(config: MonteCarloConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MonteCarloConfig {
        &self.config
    }

    /// Run all three analyses. `trade_returns` feeds the bootstrap (typically
    /// net-of-cost per-trade equity returns); `gross_trades` sets the adverse
    /// drift direction.
    pub fn run(
        &self,
        target: &StrategyUnderTest<'_>,
        trade_returns: &[f64],
        gross_trades: &[Trade],
        guard: &PhaseGuard,
    ) -> Result<MonteCarloAggregate, Interrupted> {
        let bootstrap = run_bootstrap(trade_returns, &self.config.bootstrap, guard)?;
        let sensitivity = run_sensitivity(target, &self.config.sensitivity, guard)?;
        let stress = run_stress(
            target,
            gross_trades,
            &self.config.stress,
            self.config.bootstrap.ruin_threshold,
            guard,
        )?;
        let robustness_score = robustness_score(
            &bootstrap,
            sensitivity.robust_to_parameters,
            stress.robust_to_stress,
            &self.config,
        );

        info!(
            strategy_id = target.factory.strategy_id(),
            runs = bootstrap.run_count,
            p_profit = bootstrap.probability_of_profit,
            p_ruin = bootstrap.probability_of_ruin,
            robustness_score,
            "monte carlo complete"
        );

        Ok(MonteCarloAggregate {
            bootstrap,
            sensitivity,
            stress,
            robustness_score,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ruin_is_near_disqualifying() {
        let cfg = MonteCarloConfig::default();
        let safe = BootstrapAggregate {
            probability_of_profit: 0.8,
            probability_of_ruin: 0.0,
            ..Default::default()
        };
        let risky = BootstrapAggregate {
            probability_of_profit: 0.8,
            probability_of_ruin: 0.4,
            ..Default::default()
        };
        let a = robustness_score(&safe, true, true, &cfg);
        let b = robustness_score(&risky, true, true, &cfg);
        assert!((a - 93.0).abs() < 1e-9, "a={}", a);
        assert!(b < 15.0, "b={}", b);
    }
}
