use rdk_backtest::{CostHook, FillContext};
use rdk_config::Violations;
use rdk_schemas::stats::{log_returns, safe_div, std_dev};
use rdk_schemas::{Candle, Timeframe, Trade, SECS_PER_YEAR};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{LatencyProfile, LiquidityClass, SessionBucket};

/// Tunable coefficients of the cost model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CostConfig {
    pub latency: LatencyProfile,
    /// `k` in the spread activity term `1 + k·ln(1 + trades/day)`.
    pub spread_activity_k: f64,
    pub impact_coefficient: f64,
    pub volatility_slippage_coefficient: f64,
    /// Floor on the reference volume used for impact.
    pub min_reference_notional: f64,
    /// Relative model uncertainty; the band is `± z × this × total` with the
    /// lower edge clipped at 0.
    pub relative_uncertainty: f64,
    pub ci_z: f64,
    /// Annualized drag (%) above which an advisory warning is raised.
    pub high_drag_pct: f64,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            latency: LatencyProfile::Standard,
            spread_activity_k: 0.1,
            impact_coefficient: 0.5,
            volatility_slippage_coefficient: 0.1,
            min_reference_notional: 1e5,
            relative_uncertainty: 0.25,
            ci_z: 1.96,
            high_drag_pct: 5.0,
        }
    }
}

impl CostConfig {
    pub fn validate_into(&self, path: &str, v: &mut Violations) {
        v.non_negative(&format!("{path}.spread_activity_k"), self.spread_activity_k);
        v.non_negative(&format!("{path}.impact_coefficient"), self.impact_coefficient);
        v.non_negative(
            &format!("{path}.volatility_slippage_coefficient"),
            self.volatility_slippage_coefficient,
        );
        v.positive(&format!("{path}.min_reference_notional"), self.min_reference_notional);
        v.fraction(&format!("{path}.relative_uncertainty"), self.relative_uncertainty);
        v.non_negative(&format!("{path}.ci_z"), self.ci_z);
        v.non_negative(&format!("{path}.high_drag_pct"), self.high_drag_pct);
    }
}

// ---------------------------------------------------------------------------
// Market profile
// ---------------------------------------------------------------------------

/// Standard deviation of close-to-close log returns.
pub fn realized_volatility(candles: &[Candle]) -> f64 {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    std_dev(&log_returns(&closes))
}

/// Market conditions the estimates are computed against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketProfile {
    pub liquidity: LiquidityClass,
    pub daily_notional: f64,
    pub daily_volatility: f64,
    pub bar_volatility: f64,
    pub bar_secs: i64,
    pub trades_per_day: f64,
}

impl MarketProfile {
    pub fn from_candles(candles: &[Candle], timeframe: Timeframe, daily_notional: f64) -> Self {
        let bar_volatility = realized_volatility(candles);
        Self {
            liquidity: LiquidityClass::from_daily_notional(daily_notional),
            daily_notional,
            daily_volatility: bar_volatility * timeframe.periods_per_day().sqrt(),
            bar_volatility,
            bar_secs: timeframe.secs(),
            trades_per_day: 0.0,
        }
    }

    pub fn with_trades_per_day(mut self, trades_per_day: f64) -> Self {
        self.trades_per_day = trades_per_day.max(0.0);
        self
    }

    /// Average round trips per day across the span of `trades`.
    pub fn trade_frequency(trades: &[Trade]) -> f64 {
        let (Some(first), Some(last)) = (trades.first(), trades.last()) else {
            return 0.0;
        };
        let days = ((last.exit_ts - first.entry_ts) as f64 / 86_400.0).max(1.0);
        trades.len() as f64 / days
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlippageEstimate {
    pub order_notional: f64,
    pub liquidity: LiquidityClass,
    pub session: SessionBucket,
    pub spread_bps: f64,
    pub impact_bps: f64,
    pub delay_bps: f64,
    pub volatility_bps: f64,
    pub total_bps: f64,
    /// `total − z × relative_uncertainty × total`, clipped at 0. Once the band
    /// exceeds the total the interval is no longer symmetric around it.
    pub ci_low_bps: f64,
    /// `total + z × relative_uncertainty × total`, never clipped.
    pub ci_high_bps: f64,
}

/// Aggregate execution cost of a trade list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostDrag {
    pub trade_count: usize,
    pub total_cost: f64,
    pub total_cost_low: f64,
    pub total_cost_high: f64,
    /// Mean round-trip cost relative to entry notional.
    pub avg_round_trip_bps: f64,
    /// Cost as a percentage of starting capital per year.
    pub annualized_drag_pct: f64,
    pub drag_low_pct: f64,
    pub drag_high_pct: f64,
    pub high_drag: bool,
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostModel {
    config: CostConfig,
}

struct RoundTrip {
    cost: f64,
    low: f64,
    high: f64,
}

impl CostModel {
    pub fn new(config: CostConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CostConfig {
        &self.config
    }

    /// One-way cost of an order of `order_notional` placed at `ts`.
    pub fn estimate(&self, profile: &MarketProfile, order_notional: f64, ts: i64) -> SlippageEstimate {
        let cfg = &self.config;
        let session = SessionBucket::from_ts(ts);
        let liquidity = profile.liquidity;

        let spread_bps = liquidity.base_spread_bps()
            * session.spread_multiplier()
            * (1.0 + cfg.spread_activity_k * (1.0 + profile.trades_per_day.max(0.0)).ln());

        let reference = profile.daily_notional.max(cfg.min_reference_notional);
        let impact_bps = cfg.impact_coefficient
            * profile.daily_volatility
            * (order_notional.max(0.0) / reference).sqrt()
            * 1e4;

        let delay_fraction = if profile.bar_secs > 0 {
            (cfg.latency.latency_ms() / 1_000.0 / profile.bar_secs as f64).min(1.0)
        } else {
            0.0
        };
        let delay_bps = profile.bar_volatility * delay_fraction.sqrt() * 0.5 * 1e4;

        let volatility_bps = cfg.volatility_slippage_coefficient * profile.daily_volatility * 1e4
            / liquidity.liquidity_factor();

        let total_bps = finite_or_zero(spread_bps + impact_bps + delay_bps + volatility_bps);
        let band = cfg.ci_z * cfg.relative_uncertainty * total_bps;

        SlippageEstimate {
            order_notional,
            liquidity,
            session,
            spread_bps: finite_or_zero(spread_bps),
            impact_bps: finite_or_zero(impact_bps),
            delay_bps: finite_or_zero(delay_bps),
            volatility_bps: finite_or_zero(volatility_bps),
            total_bps,
            ci_low_bps: (total_bps - band).max(0.0),
            ci_high_bps: total_bps + band,
        }
    }

    fn round_trip(&self, profile: &MarketProfile, trade: &Trade) -> RoundTrip {
        let entry = self.estimate(profile, trade.entry_notional(), trade.entry_ts);
        let exit = self.estimate(profile, trade.exit_notional(), trade.exit_ts);
        let cost = |e: &f64, x: &f64| {
            (e * trade.entry_notional() + x * trade.exit_notional()) / 1e4
        };
        RoundTrip {
            cost: cost(&entry.total_bps, &exit.total_bps),
            low: cost(&entry.ci_low_bps, &exit.ci_low_bps),
            high: cost(&entry.ci_high_bps, &exit.ci_high_bps),
        }
    }

    /// Round-trip cost of one trade in account currency.
    pub fn trade_cost(&self, profile: &MarketProfile, trade: &Trade) -> f64 {
        self.round_trip(profile, trade).cost
    }

    /// Trades with their round-trip cost deducted from pnl.
    pub fn net_trades(&self, profile: &MarketProfile, trades: &[Trade]) -> Vec<Trade> {
        trades
            .iter()
            .map(|t| t.net_of(self.trade_cost(profile, t)))
            .collect()
    }

    pub fn cost_drag(
        &self,
        profile: &MarketProfile,
        trades: &[Trade],
        initial_capital: f64,
    ) -> CostDrag {
        let (Some(first), Some(last)) = (trades.first(), trades.last()) else {
            return CostDrag::default();
        };

        let mut total = RoundTrip {
            cost: 0.0,
            low: 0.0,
            high: 0.0,
        };
        let mut entry_notional = 0.0;
        for t in trades {
            let rt = self.round_trip(profile, t);
            total.cost += rt.cost;
            total.low += rt.low;
            total.high += rt.high;
            entry_notional += t.entry_notional();
        }

        let years = ((last.exit_ts - first.entry_ts) as f64 / SECS_PER_YEAR).max(1.0 / 365.25);
        let annualize = |c: f64| safe_div(c, initial_capital) / years * 100.0;
        let annualized_drag_pct = annualize(total.cost);

        let drag = CostDrag {
            trade_count: trades.len(),
            total_cost: total.cost,
            total_cost_low: total.low,
            total_cost_high: total.high,
            avg_round_trip_bps: safe_div(total.cost, entry_notional) * 1e4,
            annualized_drag_pct,
            drag_low_pct: annualize(total.low),
            drag_high_pct: annualize(total.high),
            high_drag: annualized_drag_pct > self.config.high_drag_pct,
        };
        debug!(
            trades = drag.trade_count,
            total_cost = drag.total_cost,
            drag_pct = drag.annualized_drag_pct,
            liquidity = ?profile.liquidity,
            "cost drag computed"
        );
        drag
    }

    /// Harness hook pricing every fill with this model.
    pub fn hook(&self, profile: MarketProfile) -> CostModelHook {
        CostModelHook {
            model: self.clone(),
            profile,
        }
    }
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// [`CostHook`] adapter so the harness can fill at modelled prices.
#[derive(Debug, Clone)]
pub struct CostModelHook {
    model: CostModel,
    profile: MarketProfile,
}

impl CostHook for CostModelHook {
    fn fill_cost_bps(&self, fill: &FillContext) -> f64 {
        self.model
            .estimate(&self.profile, fill.notional(), fill.ts)
            .total_bps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> MarketProfile {
        MarketProfile {
            liquidity: LiquidityClass::Medium,
            daily_notional: 5e7,
            daily_volatility: 0.03,
            bar_volatility: 0.006,
            bar_secs: 3_600,
            trades_per_day: 2.0,
        }
    }

    #[test]
    fn components_sum_to_total() {
        let e = CostModel::default().estimate(&profile(), 50_000.0, 9 * 3_600);
        let sum = e.spread_bps + e.impact_bps + e.delay_bps + e.volatility_bps;
        assert!((e.total_bps - sum).abs() < 1e-9);
        assert!(e.ci_low_bps <= e.total_bps && e.total_bps <= e.ci_high_bps);
        assert_eq!(e.session, SessionBucket::Europe);
    }

    #[test]
    fn spread_term_matches_formula() {
        let e = CostModel::default().estimate(&profile(), 0.0, 9 * 3_600);
        let expected = 5.0 * 1.0 * (1.0 + 0.1 * 3.0_f64.ln());
        assert!((e.spread_bps - expected).abs() < 1e-9);
        assert_eq!(e.impact_bps, 0.0);
    }

    #[test]
    fn zero_volatility_leaves_only_spread() {
        let mut p = profile();
        p.daily_volatility = 0.0;
        p.bar_volatility = 0.0;
        let e = CostModel::default().estimate(&p, 1e6, 0);
        assert_eq!(e.impact_bps, 0.0);
        assert_eq!(e.delay_bps, 0.0);
        assert_eq!(e.volatility_bps, 0.0);
        assert!(e.spread_bps > 0.0);
    }

    #[test]
    fn wide_band_clips_low_edge_at_zero() {
        let model = CostModel::new(CostConfig {
            relative_uncertainty: 0.9,
            ..CostConfig::default()
        });
        let e = model.estimate(&profile(), 50_000.0, 9 * 3_600);
        assert!(e.total_bps > 0.0);
        assert_eq!(e.ci_low_bps, 0.0);
        let band = 1.96 * 0.9 * e.total_bps;
        assert!((e.ci_high_bps - (e.total_bps + band)).abs() < 1e-9);
        assert!(e.ci_high_bps - e.total_bps > e.total_bps - e.ci_low_bps);
    }
}
