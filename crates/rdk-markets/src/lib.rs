//! rdk-markets
//!
//! Multi-Market Tester: one harness run per (symbol, timeframe) cell, a fixed
//! per-cell checklist, and an aggregate verdict with a per-regime breakdown.
//!
//! Cells never disappear: a cell whose data cannot be loaded or whose harness
//! run fails is kept as a failed result carrying its reason, and still counts
//! toward `markets_tested`.

pub mod regime;

pub use regime::{infer_regime, MarketRegime, RegimeConfig, TrendRegime, VolatilityRegime};

use std::collections::BTreeMap;

use rayon::prelude::*;
use rdk_backtest::{Harness, HarnessMetrics, ParamSet, PassThresholds, StrategyFactory};
use rdk_config::Violations;
use rdk_md::MarketDataSource;
use rdk_schemas::stats::{mean, median, safe_div};
use rdk_schemas::{Interrupted, PhaseGuard, Timeframe};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Per-cell pass criteria.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CellChecklist {
    pub min_fitness: f64,
    pub min_sharpe: f64,
    pub max_drawdown: f64,
}

impl Default for CellChecklist {
    fn default() -> Self {
        let t = PassThresholds::default();
        Self {
            min_fitness: 0.5,
            min_sharpe: t.min_sharpe,
            max_drawdown: t.max_drawdown,
        }
    }
}

impl CellChecklist {
    /// The Sharpe/drawdown pair, reused for walk-forward windows.
    pub fn thresholds(&self) -> PassThresholds {
        PassThresholds {
            min_sharpe: self.min_sharpe,
            max_drawdown: self.max_drawdown,
        }
    }

    /// Failed checks, empty when the cell passes.
    pub fn evaluate(&self, m: &HarnessMetrics) -> Vec<String> {
        let mut reasons = Vec::new();
        if m.fitness < self.min_fitness {
            reasons.push(format!("fitness {:.3} < {:.3}", m.fitness, self.min_fitness));
        }
        if m.sharpe < self.min_sharpe {
            reasons.push(format!("sharpe {:.3} < {:.3}", m.sharpe, self.min_sharpe));
        }
        if m.max_drawdown > self.max_drawdown {
            reasons.push(format!(
                "max_drawdown {:.3} > {:.3}",
                m.max_drawdown, self.max_drawdown
            ));
        }
        reasons
    }
}

/// Aggregate verdict criteria.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerdictThresholds {
    pub min_markets_passed: usize,
    pub min_pass_rate: f64,
    pub min_mean_sharpe: f64,
    pub max_mean_drawdown: f64,
}

impl Default for VerdictThresholds {
    fn default() -> Self {
        Self {
            min_markets_passed: 4,
            min_pass_rate: 0.6,
            min_mean_sharpe: 0.5,
            max_mean_drawdown: 0.25,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarketsConfig {
    pub checklist: CellChecklist,
    pub verdict: VerdictThresholds,
    pub regime: RegimeConfig,
}

impl MarketsConfig {
    pub fn validate_into(&self, path: &str, v: &mut Violations) {
        let c = &self.checklist;
        v.finite(&format!("{path}.checklist.min_fitness"), c.min_fitness);
        v.finite(&format!("{path}.checklist.min_sharpe"), c.min_sharpe);
        v.fraction(&format!("{path}.checklist.max_drawdown"), c.max_drawdown);
        let vt = &self.verdict;
        v.at_least(&format!("{path}.verdict.min_markets_passed"), vt.min_markets_passed, 1);
        v.fraction(&format!("{path}.verdict.min_pass_rate"), vt.min_pass_rate);
        v.finite(&format!("{path}.verdict.min_mean_sharpe"), vt.min_mean_sharpe);
        v.fraction(&format!("{path}.verdict.max_mean_drawdown"), vt.max_mean_drawdown);
        self.regime.validate_into(&format!("{path}.regime"), v);
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarketCell {
    pub symbol: String,
    pub timeframe: Timeframe,
}

impl MarketCell {
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
        }
    }
}

/// Full symbol × timeframe grid, symbols outermost.
pub fn grid(symbols: &[String], timeframes: &[Timeframe]) -> Vec<MarketCell> {
    symbols
        .iter()
        .flat_map(|s| timeframes.iter().map(move |tf| MarketCell::new(s.clone(), *tf)))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum CellError {
    DataUnavailable(String),
    Harness(String),
}

impl std::fmt::Display for CellError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellError::DataUnavailable(r) => write!(f, "data unavailable: {}", r),
            CellError::Harness(r) => write!(f, "harness failed: {}", r),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketTestResult {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub candle_count: usize,
    pub regime: Option<MarketRegime>,
    pub metrics: Option<HarnessMetrics>,
    pub passed: bool,
    pub failure_reasons: Vec<String>,
    pub error: Option<CellError>,
}

impl MarketTestResult {
    pub fn failed(cell: &MarketCell, error: CellError) -> Self {
        Self {
            symbol: cell.symbol.clone(),
            timeframe: cell.timeframe,
            candle_count: 0,
            regime: None,
            metrics: None,
            passed: false,
            failure_reasons: vec![error.to_string()],
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeBreakdown {
    pub regime: String,
    pub tested: usize,
    pub passed: usize,
    pub pass_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiMarketAggregate {
    pub results: Vec<MarketTestResult>,
    pub markets_tested: usize,
    pub markets_passed: usize,
    pub pass_rate: f64,
    /// Over cells that produced metrics.
    pub mean_sharpe: f64,
    pub median_sharpe: f64,
    pub mean_drawdown: f64,
    /// Largest drawdown of any cell that produced metrics.
    pub worst_drawdown: f64,
    pub by_regime: Vec<RegimeBreakdown>,
    /// Advisory only; never gates the verdict.
    pub concentration_warnings: Vec<String>,
    pub verdict_passed: bool,
    pub verdict_reasons: Vec<String>,
}

impl MultiMarketAggregate {
    pub fn from_results(results: Vec<MarketTestResult>, thresholds: &VerdictThresholds) -> Self {
        let markets_tested = results.len();
        let markets_passed = results.iter().filter(|r| r.passed).count();
        let pass_rate = safe_div(markets_passed as f64, markets_tested as f64);

        let measured: Vec<&HarnessMetrics> = results.iter().filter_map(|r| r.metrics.as_ref()).collect();
        let sharpes: Vec<f64> = measured.iter().map(|m| m.sharpe).collect();
        let drawdowns: Vec<f64> = measured.iter().map(|m| m.max_drawdown).collect();
        let mean_sharpe = mean(&sharpes);
        let mean_drawdown = mean(&drawdowns);

        let mut buckets: BTreeMap<String, (usize, usize)> = BTreeMap::new();
        for r in &results {
            if let Some(regime) = r.regime {
                let e = buckets.entry(regime.label()).or_default();
                e.0 += 1;
                e.1 += usize::from(r.passed);
            }
        }
        let by_regime: Vec<RegimeBreakdown> = buckets
            .into_iter()
            .map(|(regime, (tested, passed))| RegimeBreakdown {
                regime,
                tested,
                passed,
                pass_rate: safe_div(passed as f64, tested as f64),
            })
            .collect();
        let concentration_warnings = by_regime
            .iter()
            .filter(|b| b.tested >= 2 && pass_rate > 0.0 && b.pass_rate < pass_rate / 2.0)
            .map(|b| {
                format!(
                    "regime {}: {}/{} cells passed (overall pass rate {:.2})",
                    b.regime, b.passed, b.tested, pass_rate
                )
            })
            .collect();

        let mut verdict_reasons = Vec::new();
        if markets_passed < thresholds.min_markets_passed {
            verdict_reasons.push(format!(
                "markets_passed {} < {}",
                markets_passed, thresholds.min_markets_passed
            ));
        }
        if pass_rate < thresholds.min_pass_rate {
            verdict_reasons.push(format!(
                "pass_rate {:.3} < {:.3}",
                pass_rate, thresholds.min_pass_rate
            ));
        }
        if mean_sharpe < thresholds.min_mean_sharpe {
            verdict_reasons.push(format!(
                "mean_sharpe {:.3} < {:.3}",
                mean_sharpe, thresholds.min_mean_sharpe
            ));
        }
        if mean_drawdown > thresholds.max_mean_drawdown {
            verdict_reasons.push(format!(
                "mean_drawdown {:.3} > {:.3}",
                mean_drawdown, thresholds.max_mean_drawdown
            ));
        }

        Self {
            markets_tested,
            markets_passed,
            pass_rate,
            mean_sharpe,
            median_sharpe: median(&sharpes),
            mean_drawdown,
            worst_drawdown: drawdowns.iter().copied().fold(0.0, f64::max),
            by_regime,
            concentration_warnings,
            verdict_passed: verdict_reasons.is_empty(),
            verdict_reasons,
            results,
        }
    }
}

// ---------------------------------------------------------------------------
// Tester
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct MultiMarketTester {
    config: MarketsConfig,
}

impl MultiMarketTester {
    pub fn new(config: MarketsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MarketsConfig {
        &self.config
    }

    /// Evaluate one cell. Never fails: problems become a failed result.
    pub fn test_cell(
        &self,
        harness: &Harness,
        factory: &dyn StrategyFactory,
        params: &ParamSet,
        source: &dyn MarketDataSource,
        cell: &MarketCell,
        lookback_days: u32,
    ) -> MarketTestResult {
        let candles = match source.candles(&cell.symbol, cell.timeframe, lookback_days) {
            Ok(c) => c,
            Err(e) => {
                warn!(symbol = %cell.symbol, timeframe = %cell.timeframe, error = %e, "cell data unavailable");
                return MarketTestResult::failed(cell, CellError::DataUnavailable(e.to_string()));
            }
        };
        let report = match harness.run(factory, params, &candles) {
            Ok(r) => r,
            Err(e) => {
                warn!(symbol = %cell.symbol, timeframe = %cell.timeframe, error = %e, "cell harness failed");
                return MarketTestResult::failed(cell, CellError::Harness(e.to_string()));
            }
        };

        let failure_reasons = self.config.checklist.evaluate(&report.metrics);
        let result = MarketTestResult {
            symbol: cell.symbol.clone(),
            timeframe: cell.timeframe,
            candle_count: candles.len(),
            regime: Some(infer_regime(&candles, cell.timeframe, &self.config.regime)),
            passed: failure_reasons.is_empty(),
            metrics: Some(report.metrics),
            failure_reasons,
            error: None,
        };
        debug!(
            symbol = %result.symbol,
            timeframe = %result.timeframe,
            passed = result.passed,
            "cell evaluated"
        );
        result
    }

    /// Run every cell on the ambient rayon pool. The guard is checked before
    /// each cell starts.
    #[allow(clippy::too_many_arguments)]
    pub fn run(
        &self,
        harness: &Harness,
        factory: &dyn StrategyFactory,
        params: &ParamSet,
        source: &dyn MarketDataSource,
        cells: &[MarketCell],
        lookback_days: u32,
        guard: &PhaseGuard,
    ) -> Result<MultiMarketAggregate, Interrupted> {
        let results = cells
            .par_iter()
            .map(|cell| {
                guard.checkpoint()?;
                Ok(self.test_cell(harness, factory, params, source, cell, lookback_days))
            })
            .collect::<Result<Vec<_>, Interrupted>>()?;

        let agg = MultiMarketAggregate::from_results(results, &self.config.verdict);
        info!(
            strategy_id = factory.strategy_id(),
            tested = agg.markets_tested,
            passed = agg.markets_passed,
            pass_rate = agg.pass_rate,
            verdict = agg.verdict_passed,
            "multi-market test complete"
        );
        Ok(agg)
    }
}
