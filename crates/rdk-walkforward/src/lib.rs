//! rdk-walkforward
//!
//! Walk-Forward Validator. Each window runs the harness on its in-sample
//! range and again on its out-of-sample range, with the in-sample tail
//! replayed first as a warm-up that cannot trade. In/out comparisons feed
//! an overfitting score and a diagnosis that separates a strategy that
//! overfit from one that never worked.

pub mod windows;

pub use windows::{plan_windows, IndexRange, WindowMode, WindowSpec};

use rayon::prelude::*;
use rdk_backtest::{Harness, HarnessMetrics, ParamSet, PassThresholds, StrategyFactory};
use rdk_config::Violations;
use rdk_schemas::stats::{clamp01, clamp_score, mean, safe_div};
use rdk_schemas::{Candle, Interrupted, PhaseGuard};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverfittingWeights {
    pub degradation: f64,
    pub pass_variance: f64,
    pub failure_rate: f64,
}

impl Default for OverfittingWeights {
    fn default() -> Self {
        Self {
            degradation: 0.6,
            pass_variance: 0.25,
            failure_rate: 0.15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WalkForwardConfig {
    pub windows: usize,
    pub in_sample_fraction: f64,
    pub mode: WindowMode,
    pub min_in_sample_candles: usize,
    pub min_out_of_sample_candles: usize,
    /// Longest in-sample tail replayed as out-of-sample warm-up.
    pub max_warmup_candles: usize,
    /// Mean degradation at or above which a passing in-sample record that
    /// fails out-of-sample is called overfit.
    pub high_degradation: f64,
    pub weights: OverfittingWeights,
    pub stable_max_score: f64,
    pub stable_min_pass_rate: f64,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            windows: 5,
            in_sample_fraction: 0.7,
            mode: WindowMode::Rolling,
            min_in_sample_candles: 50,
            min_out_of_sample_candles: 20,
            max_warmup_candles: 500,
            high_degradation: 0.3,
            weights: OverfittingWeights::default(),
            stable_max_score: 40.0,
            stable_min_pass_rate: 0.5,
        }
    }
}

impl WalkForwardConfig {
    pub fn validate_into(&self, path: &str, v: &mut Violations) {
        v.at_least(&format!("{path}.windows"), self.windows, 1);
        v.open_fraction(&format!("{path}.in_sample_fraction"), self.in_sample_fraction);
        v.at_least(&format!("{path}.min_in_sample_candles"), self.min_in_sample_candles, 2);
        v.at_least(&format!("{path}.min_out_of_sample_candles"), self.min_out_of_sample_candles, 2);
        v.fraction(&format!("{path}.high_degradation"), self.high_degradation);
        let w = &self.weights;
        v.weights(
            &format!("{path}.weights"),
            &[
                ("degradation", w.degradation),
                ("pass_variance", w.pass_variance),
                ("failure_rate", w.failure_rate),
            ],
        );
        v.score(&format!("{path}.stable_max_score"), self.stable_max_score);
        v.fraction(&format!("{path}.stable_min_pass_rate"), self.stable_min_pass_rate);
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// `(in − out) / |in|` clipped to ±1; 0 when `in` is 0.
pub fn degradation(in_sample: f64, out_of_sample: f64) -> f64 {
    if in_sample == 0.0 || !in_sample.is_finite() || !out_of_sample.is_finite() {
        return 0.0;
    }
    ((in_sample - out_of_sample) / in_sample.abs()).clamp(-1.0, 1.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardPeriod {
    pub index: usize,
    pub in_sample: IndexRange,
    pub out_of_sample: IndexRange,
    pub in_sample_start_ts: i64,
    pub out_of_sample_start_ts: i64,
    pub out_of_sample_end_ts: i64,
    pub in_metrics: HarnessMetrics,
    pub out_metrics: HarnessMetrics,
    pub sharpe_degradation: f64,
    pub return_degradation: f64,
    pub in_sample_passed: bool,
    pub out_of_sample_passed: bool,
    /// Harness failure on either leg; such a window fails out-of-sample and
    /// is left out of the degradation mean.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Diagnosis {
    Robust,
    /// Good in-sample, poor out-of-sample, high degradation.
    Overfit,
    /// Poor in both, so degradation says little.
    NeverWorked,
    Unstable,
    /// Too little data for a single window.
    Insufficient,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardAggregate {
    pub mode: WindowMode,
    pub periods: Vec<WalkForwardPeriod>,
    pub mean_in_sample_sharpe: f64,
    pub mean_out_of_sample_sharpe: f64,
    pub mean_degradation: f64,
    pub in_sample_pass_rate: f64,
    pub out_of_sample_pass_rate: f64,
    /// Variance of the out-of-sample pass indicator, at most 0.25.
    pub pass_variance: f64,
    /// 0–100, higher is worse.
    pub overfitting_score: f64,
    pub diagnosis: Diagnosis,
    pub stable: bool,
}

impl WalkForwardAggregate {
    pub fn insufficient(mode: WindowMode) -> Self {
        Self {
            mode,
            periods: Vec::new(),
            mean_in_sample_sharpe: 0.0,
            mean_out_of_sample_sharpe: 0.0,
            mean_degradation: 0.0,
            in_sample_pass_rate: 0.0,
            out_of_sample_pass_rate: 0.0,
            pass_variance: 0.0,
            overfitting_score: 100.0,
            diagnosis: Diagnosis::Insufficient,
            stable: false,
        }
    }

    pub fn from_periods(mode: WindowMode, periods: Vec<WalkForwardPeriod>, cfg: &WalkForwardConfig) -> Self {
        if periods.is_empty() {
            return Self::insufficient(mode);
        }
        let n = periods.len() as f64;
        let clean: Vec<&WalkForwardPeriod> = periods.iter().filter(|p| p.error.is_none()).collect();
        if clean.is_empty() {
            let mut agg = Self::insufficient(mode);
            agg.periods = periods;
            return agg;
        }

        let in_sharpes: Vec<f64> = clean.iter().map(|p| p.in_metrics.sharpe).collect();
        let out_sharpes: Vec<f64> = clean.iter().map(|p| p.out_metrics.sharpe).collect();
        let mean_degradation = mean(&clean.iter().map(|p| p.sharpe_degradation).collect::<Vec<_>>());

        let oos_passed = periods.iter().filter(|p| p.out_of_sample_passed).count() as f64;
        let is_passed = periods.iter().filter(|p| p.in_sample_passed).count() as f64;
        let out_of_sample_pass_rate = safe_div(oos_passed, n);
        let in_sample_pass_rate = safe_div(is_passed, n);
        let pass_variance = out_of_sample_pass_rate * (1.0 - out_of_sample_pass_rate);

        let w = &cfg.weights;
        let overfitting_score = clamp_score(
            100.0
                * (w.degradation * clamp01(mean_degradation)
                    + w.pass_variance * clamp01(pass_variance / 0.25)
                    + w.failure_rate * (1.0 - out_of_sample_pass_rate)),
        );

        let stable =
            overfitting_score <= cfg.stable_max_score && out_of_sample_pass_rate >= cfg.stable_min_pass_rate;
        let diagnosis = if stable {
            Diagnosis::Robust
        } else if in_sample_pass_rate >= 0.5
            && out_of_sample_pass_rate < 0.5
            && mean_degradation >= cfg.high_degradation
        {
            Diagnosis::Overfit
        } else if in_sample_pass_rate < 0.5 && out_of_sample_pass_rate < 0.5 {
            Diagnosis::NeverWorked
        } else {
            Diagnosis::Unstable
        };

        Self {
            mode,
            mean_in_sample_sharpe: mean(&in_sharpes),
            mean_out_of_sample_sharpe: mean(&out_sharpes),
            mean_degradation,
            in_sample_pass_rate,
            out_of_sample_pass_rate,
            pass_variance,
            overfitting_score,
            diagnosis,
            stable,
            periods,
        }
    }
}

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

/// Windows pass or fail on the same [`PassThresholds`] as market cells;
/// `new` starts from the defaults.
#[derive(Debug, Clone, Default)]
pub struct WalkForwardValidator {
    config: WalkForwardConfig,
    thresholds: PassThresholds,
}

impl WalkForwardValidator {
    pub fn new(config: WalkForwardConfig) -> Self {
        Self {
            config,
            thresholds: PassThresholds::default(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: PassThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn config(&self) -> &WalkForwardConfig {
        &self.config
    }

    pub fn thresholds(&self) -> &PassThresholds {
        &self.thresholds
    }

    pub fn plan(&self, len: usize) -> Vec<WindowSpec> {
        let c = &self.config;
        plan_windows(
            len,
            c.windows,
            c.in_sample_fraction,
            c.mode,
            c.min_in_sample_candles,
            c.min_out_of_sample_candles,
        )
    }

    fn run_window(
        &self,
        harness: &Harness,
        factory: &dyn StrategyFactory,
        params: &ParamSet,
        candles: &[Candle],
        spec: &WindowSpec,
    ) -> WalkForwardPeriod {
        let is = spec.in_sample;
        let oos = spec.out_of_sample;
        let warmup = is.len().min(self.config.max_warmup_candles);
        let in_run = harness.run(factory, params, &candles[is.start..is.end]);
        let out_run = harness.run_with_warmup(factory, params, &candles[is.end - warmup..oos.end], warmup);

        let mut period = WalkForwardPeriod {
            index: spec.index,
            in_sample: is,
            out_of_sample: oos,
            in_sample_start_ts: candles[is.start].ts,
            out_of_sample_start_ts: candles[oos.start].ts,
            out_of_sample_end_ts: candles[oos.end - 1].ts,
            in_metrics: HarnessMetrics::default(),
            out_metrics: HarnessMetrics::default(),
            sharpe_degradation: 0.0,
            return_degradation: 0.0,
            in_sample_passed: false,
            out_of_sample_passed: false,
            error: None,
        };
        match (in_run, out_run) {
            (Ok(a), Ok(b)) => {
                period.sharpe_degradation = degradation(a.metrics.sharpe, b.metrics.sharpe);
                period.return_degradation = degradation(a.metrics.total_return, b.metrics.total_return);
                period.in_sample_passed = self.thresholds.passes(&a.metrics);
                period.out_of_sample_passed = self.thresholds.passes(&b.metrics);
                period.in_metrics = a.metrics;
                period.out_metrics = b.metrics;
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!(window = spec.index, error = %e, "walk-forward window failed");
                period.error = Some(e.to_string());
            }
        }
        period
    }

    pub fn run(
        &self,
        harness: &Harness,
        factory: &dyn StrategyFactory,
        params: &ParamSet,
        candles: &[Candle],
        guard: &PhaseGuard,
    ) -> Result<WalkForwardAggregate, Interrupted> {
        let plan = self.plan(candles.len());
        if plan.is_empty() {
            warn!(
                strategy_id = factory.strategy_id(),
                candles = candles.len(),
                windows = self.config.windows,
                "not enough data for walk-forward windows"
            );
            return Ok(WalkForwardAggregate::insufficient(self.config.mode));
        }

        let periods = plan
            .par_iter()
            .map(|spec| {
                guard.checkpoint()?;
                Ok(self.run_window(harness, factory, params, candles, spec))
            })
            .collect::<Result<Vec<_>, Interrupted>>()?;

        let agg = WalkForwardAggregate::from_periods(self.config.mode, periods, &self.config);
        info!(
            strategy_id = factory.strategy_id(),
            windows = agg.periods.len(),
            overfitting_score = agg.overfitting_score,
            oos_pass_rate = agg.out_of_sample_pass_rate,
            diagnosis = ?agg.diagnosis,
            "walk-forward complete"
        );
        Ok(agg)
    }
}
