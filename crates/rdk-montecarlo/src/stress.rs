//! Stress scenarios replayed through the harness on transformed candles.
//!
//! Every transform scales whole candles (or their log distance from the
//! close), so transformed candles stay structurally valid.

use rayon::prelude::*;
use rdk_config::Violations;
use rdk_schemas::{Candle, Interrupted, PhaseGuard, Side, Trade};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::StrategyUnderTest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StressScenario {
    FlashCrash,
    VolatilityExpansion,
    AdverseDrift,
}

impl StressScenario {
    pub const ALL: [StressScenario; 3] = [
        StressScenario::FlashCrash,
        StressScenario::VolatilityExpansion,
        StressScenario::AdverseDrift,
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StressConfig {
    /// Gap size of the flash crash as a fraction of price.
    pub flash_crash_drop: f64,
    /// Candles over which the crash is linearly recovered.
    pub recovery_bars: usize,
    pub volatility_multiplier: f64,
    /// Total log drift applied across the series against the strategy.
    pub adverse_drift: f64,
    pub max_drawdown: f64,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            flash_crash_drop: 0.2,
            recovery_bars: 20,
            volatility_multiplier: 2.0,
            adverse_drift: 0.2,
            max_drawdown: 0.5,
        }
    }
}

impl StressConfig {
    pub fn validate_into(&self, path: &str, v: &mut Violations) {
        v.open_fraction(&format!("{path}.flash_crash_drop"), self.flash_crash_drop);
        v.at_least(&format!("{path}.recovery_bars"), self.recovery_bars, 1);
        v.positive(&format!("{path}.volatility_multiplier"), self.volatility_multiplier);
        v.non_negative(&format!("{path}.adverse_drift"), self.adverse_drift);
        v.open_fraction(&format!("{path}.max_drawdown"), self.max_drawdown);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressResult {
    pub scenario: StressScenario,
    pub total_return: f64,
    pub max_drawdown: f64,
    pub trade_count: usize,
    pub ruined: bool,
    pub breached: bool,
    pub error: Option<String>,
}

impl StressResult {
    pub fn survived(&self) -> bool {
        self.error.is_none() && !self.ruined && !self.breached
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StressReport {
    pub adverse_direction: Option<Side>,
    pub scenarios: Vec<StressResult>,
    pub robust_to_stress: bool,
}

// ---------------------------------------------------------------------------
// Transforms
// ---------------------------------------------------------------------------

fn scale(c: &Candle, f: f64) -> Candle {
    Candle::new(c.ts, c.open * f, c.high * f, c.low * f, c.close * f, c.volume)
}

/// Gap down by `drop` at the middle candle, recovering linearly over
/// `recovery_bars`.
pub fn flash_crash(candles: &[Candle], drop: f64, recovery_bars: usize) -> Vec<Candle> {
    let mid = candles.len() / 2;
    let bars = recovery_bars.max(1) as f64;
    candles
        .iter()
        .enumerate()
        .map(|(i, c)| {
            if i < mid {
                return *c;
            }
            let remaining = (1.0 - (i - mid) as f64 / bars).max(0.0);
            scale(c, 1.0 - drop * remaining)
        })
        .collect()
}

/// Multiply every close-to-close log return and every intrabar log range by
/// `multiplier`.
pub fn volatility_expansion(candles: &[Candle], multiplier: f64) -> Vec<Candle> {
    let mut out = Vec::with_capacity(candles.len());
    let mut prev: Option<(f64, f64)> = None; // (original close, new close)
    for c in candles {
        let close = match prev {
            None => c.close,
            Some((orig_prev, new_prev)) => new_prev * ((c.close / orig_prev).ln() * multiplier).exp(),
        };
        let rel = |p: f64| close * (p / c.close).powf(multiplier);
        out.push(Candle::new(
            c.ts,
            rel(c.open),
            rel(c.high),
            rel(c.low),
            close,
            c.volume,
        ));
        prev = Some((c.close, close));
    }
    out
}

/// Apply a steady total log drift of `total` against `exposure`: down for a
/// long-biased strategy, up for a short-biased one.
pub fn adverse_drift(candles: &[Candle], total: f64, exposure: Side) -> Vec<Candle> {
    let n = candles.len();
    if n < 2 {
        return candles.to_vec();
    }
    let dir = -exposure.sign();
    candles
        .iter()
        .enumerate()
        .map(|(i, c)| scale(c, (dir * total * i as f64 / (n - 1) as f64).exp()))
        .collect()
}

/// Net exposure direction of a trade list, weighted by notional × holding
/// time. Ties and empty lists count as long.
pub fn exposure_bias(trades: &[Trade]) -> Side {
    let net: f64 = trades
        .iter()
        .map(|t| t.side.sign() * t.entry_notional() * (t.exit_ts - t.entry_ts) as f64)
        .sum();
    if net < 0.0 {
        Side::Short
    } else {
        Side::Long
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

pub fn run_stress(
    target: &StrategyUnderTest<'_>,
    gross_trades: &[Trade],
    config: &StressConfig,
    ruin_threshold: f64,
    guard: &PhaseGuard,
) -> Result<StressReport, Interrupted> {
    let exposure = exposure_bias(gross_trades);

    let scenarios: Vec<StressResult> = StressScenario::ALL
        .par_iter()
        .map(|scenario| {
            guard.checkpoint()?;
            let candles = match scenario {
                StressScenario::FlashCrash => {
                    flash_crash(target.candles, config.flash_crash_drop, config.recovery_bars)
                }
                StressScenario::VolatilityExpansion => {
                    volatility_expansion(target.candles, config.volatility_multiplier)
                }
                StressScenario::AdverseDrift => {
                    adverse_drift(target.candles, config.adverse_drift, exposure)
                }
            };
            Ok(
                match target.harness.run(target.factory, target.params, &candles) {
                    Ok(report) => {
                        let dd = report.metrics.max_drawdown;
                        StressResult {
                            scenario: *scenario,
                            total_return: report.metrics.total_return,
                            max_drawdown: dd,
                            trade_count: report.metrics.trade_count,
                            ruined: dd > ruin_threshold,
                            breached: dd > config.max_drawdown,
                            error: None,
                        }
                    }
                    Err(e) => StressResult {
                        scenario: *scenario,
                        total_return: 0.0,
                        max_drawdown: 0.0,
                        trade_count: 0,
                        ruined: false,
                        breached: false,
                        error: Some(e.to_string()),
                    },
                },
            )
        })
        .collect::<Result<Vec<_>, Interrupted>>()?;

    let robust_to_stress = scenarios.iter().all(StressResult::survived);
    debug!(robust = robust_to_stress, exposure = ?exposure, "stress scenarios complete");

    Ok(StressReport {
        adverse_direction: Some(exposure),
        scenarios,
        robust_to_stress,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let p = 100.0 + (i as f64 * 0.3).sin();
                Candle::new(i as i64 * 60, p, p * 1.01, p * 0.99, p * 1.002, 5.0)
            })
            .collect()
    }

    #[test]
    fn transforms_keep_candles_valid() {
        let base = series(100);
        for out in [
            flash_crash(&base, 0.3, 10),
            volatility_expansion(&base, 3.0),
            adverse_drift(&base, 0.5, Side::Long),
            adverse_drift(&base, 0.5, Side::Short),
        ] {
            assert_eq!(out.len(), base.len());
            assert!(out.iter().all(Candle::is_valid));
        }
    }

    #[test]
    fn flash_crash_gaps_then_recovers() {
        let base = series(100);
        let out = flash_crash(&base, 0.2, 10);
        assert_eq!(out[49], base[49]);
        assert!((out[50].close / base[50].close - 0.8).abs() < 1e-12);
        assert_eq!(out[60].close, base[60].close);
    }

    #[test]
    fn drift_opposes_exposure() {
        let base = series(50);
        let long = adverse_drift(&base, 0.2, Side::Long);
        let short = adverse_drift(&base, 0.2, Side::Short);
        assert!(long[49].close < base[49].close);
        assert!(short[49].close > base[49].close);
        assert_eq!(long[0], base[0]);
    }
}
