//! rdk-profit
//!
//! Profit Analyzer: risk-adjusted ratios, trade statistics, a one-sample
//! significance test and a weighted quality score, computed for both the
//! gross and the net-of-cost trade list of a run.

pub mod quality;
pub mod ratios;
pub mod significance;

pub use quality::{QualityBands, QualityConfig, QualityLabel, QualityNormalizers, QualityWeights};
pub use significance::{t_test_zero_mean, TTest};

use rdk_config::Violations;
use rdk_costs::CostDrag;
use rdk_montecarlo::{bootstrap_ci, ConfidenceInterval};
use rdk_schemas::stats::{mean, safe_div};
use rdk_schemas::{EquityCurve, Trade};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::quality::{quality_score, QualityInputs};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfitConfig {
    /// Annual risk-free rate subtracted from periodic returns.
    pub risk_free_rate: f64,
    /// Per-period return threshold of the Omega ratio.
    pub omega_threshold: f64,
    pub omega_cap: f64,
    pub profit_factor_cap: f64,
    pub significance_alpha: f64,
    /// Below this many trades a result is never called significant.
    pub min_trades: usize,
    pub ci_runs: usize,
    pub ci_seed: u64,
    pub ci_confidence: f64,
    pub quality: QualityConfig,
}

impl Default for ProfitConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.0,
            omega_threshold: 0.0,
            omega_cap: 10.0,
            profit_factor_cap: 100.0,
            significance_alpha: 0.05,
            min_trades: 30,
            ci_runs: 500,
            ci_seed: 7,
            ci_confidence: 0.95,
            quality: QualityConfig::default(),
        }
    }
}

impl ProfitConfig {
    pub fn validate_into(&self, path: &str, v: &mut Violations) {
        v.finite(&format!("{path}.risk_free_rate"), self.risk_free_rate);
        v.finite(&format!("{path}.omega_threshold"), self.omega_threshold);
        v.positive(&format!("{path}.omega_cap"), self.omega_cap);
        v.positive(&format!("{path}.profit_factor_cap"), self.profit_factor_cap);
        v.open_fraction(&format!("{path}.significance_alpha"), self.significance_alpha);
        v.at_least(&format!("{path}.min_trades"), self.min_trades, 2);
        v.open_fraction(&format!("{path}.ci_confidence"), self.ci_confidence);
        self.quality.validate_into(&format!("{path}.quality"), v);
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitMetrics {
    pub trade_count: usize,
    pub final_equity: f64,
    pub total_return: f64,
    /// Mean periodic return × periods per year.
    pub annualized_return: f64,
    pub cagr: f64,
    pub periods_per_year: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub calmar: f64,
    pub omega: f64,
    pub kelly: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    /// Mean absolute loss.
    pub avg_loss: f64,
    /// Mean pnl per trade.
    pub expectancy: f64,
    /// Mean pnl_pct per trade.
    pub expectancy_pct: f64,
    pub t_stat: f64,
    pub p_value: f64,
    pub significant: bool,
    pub sharpe_ci: ConfidenceInterval,
    pub sortino_ci: ConfidenceInterval,
    pub quality_score: f64,
    pub quality_label: QualityLabel,
    /// Fewer than two trades: ratios are neutral zeros.
    pub degenerate: bool,
}

/// Gross and net-of-cost views of the same run, plus the cost between them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitReport {
    pub gross: ProfitMetrics,
    pub net: ProfitMetrics,
    pub cost_drag: CostDrag,
    /// `gross.total_return − net.total_return`.
    pub return_lost_to_costs: f64,
}

/// Inputs of [`ProfitAnalyzer::report`].
#[derive(Debug, Clone, Copy)]
pub struct ProfitInput<'a> {
    pub gross_trades: &'a [Trade],
    pub net_trades: &'a [Trade],
    pub initial_capital: f64,
    pub start_ts: i64,
    pub end_ts: i64,
    /// Used when the equity curve is too short to measure its own frequency.
    pub fallback_periods_per_year: f64,
}

/// Trade-exit equity curve, or a flat one over `[start_ts, end_ts]` when
/// there are no trades.
pub fn equity_curve_for(initial_capital: f64, start_ts: i64, end_ts: i64, trades: &[Trade]) -> EquityCurve {
    if trades.is_empty() {
        EquityCurve::flat(initial_capital, start_ts, end_ts)
    } else {
        EquityCurve::from_trades(initial_capital, start_ts, trades)
    }
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ProfitAnalyzer {
    config: ProfitConfig,
}

impl ProfitAnalyzer {
    pub fn new(config: ProfitConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProfitConfig {
        &self.config
    }

    pub fn analyze(&self, trades: &[Trade], curve: &EquityCurve, fallback_periods_per_year: f64) -> ProfitMetrics {
        let cfg = &self.config;
        let returns = curve.period_returns();
        let ppy = curve.periods_per_year(fallback_periods_per_year);
        let rf_per_period = safe_div(cfg.risk_free_rate, ppy);
        let excess: Vec<f64> = returns.iter().map(|r| r - rf_per_period).collect();

        let sharpe = ratios::sharpe(&excess, ppy);
        let sortino = ratios::sortino(&excess, ppy);
        let annualized_return = finite_or_zero(mean(&returns) * ppy);
        let max_drawdown = curve.max_drawdown();
        let calmar = ratios::calmar(annualized_return, max_drawdown);
        let omega = ratios::omega(&returns, cfg.omega_threshold, cfg.omega_cap);

        let n = trades.len();
        let wins: Vec<f64> = trades.iter().filter(|t| t.pnl > 0.0).map(|t| t.pnl).collect();
        let losses: Vec<f64> = trades.iter().filter(|t| t.pnl < 0.0).map(|t| -t.pnl).collect();
        let win_rate = safe_div(wins.len() as f64, n as f64);
        let avg_win = mean(&wins);
        let avg_loss = mean(&losses);
        let pnl_pcts: Vec<f64> = trades.iter().map(|t| t.pnl_pct).collect();
        let pnls: Vec<f64> = trades.iter().map(|t| t.pnl).collect();

        let test = t_test_zero_mean(&pnl_pcts);
        let significant = test.p_value < cfg.significance_alpha && n >= cfg.min_trades;

        let sharpe_ci = bootstrap_ci(&excess, cfg.ci_runs, cfg.ci_seed, cfg.ci_confidence, |s| {
            ratios::sharpe(s, ppy)
        });
        let sortino_ci = bootstrap_ci(&excess, cfg.ci_runs, cfg.ci_seed, cfg.ci_confidence, |s| {
            ratios::sortino(s, ppy)
        });

        let quality_score = quality_score(
            &QualityInputs {
                annualized_return,
                sharpe,
                sortino,
                calmar,
                win_rate,
                significant,
            },
            &cfg.quality,
        );

        let metrics = ProfitMetrics {
            trade_count: n,
            final_equity: curve.final_equity(),
            total_return: curve.total_return(),
            annualized_return,
            cagr: cagr(curve),
            periods_per_year: ppy,
            sharpe,
            sortino,
            calmar,
            omega,
            kelly: ratios::kelly(win_rate, avg_win, avg_loss),
            max_drawdown,
            win_rate,
            profit_factor: ratios::profit_factor(trades, cfg.profit_factor_cap),
            avg_win,
            avg_loss,
            expectancy: mean(&pnls),
            expectancy_pct: mean(&pnl_pcts),
            t_stat: test.t_stat,
            p_value: test.p_value,
            significant,
            sharpe_ci,
            sortino_ci,
            quality_score,
            quality_label: cfg.quality.bands.label(quality_score),
            degenerate: n < 2,
        };
        if metrics.degenerate {
            debug!(trades = n, "profit metrics degenerate; ratios are neutral");
        }
        metrics
    }

    /// Analyze gross and net trade lists over the same span.
    pub fn report(&self, input: ProfitInput<'_>, cost_drag: CostDrag) -> ProfitReport {
        let curve = |trades: &[Trade]| {
            equity_curve_for(input.initial_capital, input.start_ts, input.end_ts, trades)
        };
        let gross = self.analyze(
            input.gross_trades,
            &curve(input.gross_trades),
            input.fallback_periods_per_year,
        );
        let net = self.analyze(
            input.net_trades,
            &curve(input.net_trades),
            input.fallback_periods_per_year,
        );
        debug!(
            gross_sharpe = gross.sharpe,
            net_sharpe = net.sharpe,
            net_quality = net.quality_score,
            drag_pct = cost_drag.annualized_drag_pct,
            "profit report"
        );
        ProfitReport {
            return_lost_to_costs: gross.total_return - net.total_return,
            gross,
            net,
            cost_drag,
        }
    }
}

fn finite_or_zero(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

/// Compound annual growth over the curve's span. −1 once equity is wiped out.
fn cagr(curve: &EquityCurve) -> f64 {
    let years = curve.span_years();
    if years <= 0.0 || curve.initial_capital <= 0.0 {
        return 0.0;
    }
    let growth = curve.final_equity() / curve.initial_capital;
    if growth <= 0.0 {
        return -1.0;
    }
    finite_or_zero(growth.powf(1.0 / years) - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let mut v = Violations::new();
        ProfitConfig::default().validate_into("profit", &mut v);
        assert!(v.is_empty(), "{:?}", v.items());
    }

    #[test]
    fn cagr_of_flat_curve_is_zero() {
        let c = EquityCurve::flat(1_000.0, 0, 86_400 * 365);
        assert_eq!(cagr(&c), 0.0);
    }
}
