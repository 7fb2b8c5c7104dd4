use std::sync::Arc;

use rdk_schemas::stats::{annualized_sharpe, safe_div};
use rdk_schemas::{Candle, EquityCurve, ExitReason, Side, Trade, TradeError, SECS_PER_YEAR};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{ParamSet, Signal, Strategy, StrategyContext, StrategyFactory};

/// Harness error variants. Every variant names what was wrong with the input.
#[derive(Clone, Debug, PartialEq)]
pub enum HarnessError {
    EmptySeries,
    /// Timestamps must be strictly increasing.
    UnorderedCandles { index: usize, ts: i64, prev_ts: i64 },
    InvalidCandle { index: usize, ts: i64 },
    /// Warm-up must leave at least one tradable candle.
    WarmupTooLong { warmup: usize, len: usize },
    InvalidSpec { strategy_id: String, reason: String },
    InvalidParams { strategy_id: String, reason: String },
    /// Cost hooks must return a finite, non-negative cost. A negative value
    /// would fill at a better-than-market price.
    NegativeFillCost { ts: i64, bps: f64 },
    Trade(TradeError),
}

impl std::fmt::Display for HarnessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HarnessError::EmptySeries => write!(f, "candle series is empty"),
            HarnessError::UnorderedCandles { index, ts, prev_ts } => write!(
                f,
                "candle {} has ts={} not after previous ts={}",
                index, ts, prev_ts
            ),
            HarnessError::InvalidCandle { index, ts } => {
                write!(f, "candle {} at ts={} is malformed", index, ts)
            }
            HarnessError::WarmupTooLong { warmup, len } => write!(
                f,
                "warm-up of {} candles leaves nothing to trade in a series of {}",
                warmup, len
            ),
            HarnessError::InvalidSpec {
                strategy_id,
                reason,
            } => write!(f, "strategy '{}' spec invalid: {}", strategy_id, reason),
            HarnessError::InvalidParams {
                strategy_id,
                reason,
            } => write!(f, "strategy '{}' params invalid: {}", strategy_id, reason),
            HarnessError::NegativeFillCost { ts, bps } => {
                write!(f, "cost hook returned {} bps at ts={} (must be >= 0)", bps, ts)
            }
            HarnessError::Trade(e) => write!(f, "trade construction failed: {}", e),
        }
    }
}

impl std::error::Error for HarnessError {}

impl From<TradeError> for HarnessError {
    fn from(e: TradeError) -> Self {
        HarnessError::Trade(e)
    }
}

// ---------------------------------------------------------------------------
// Cost hook
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillSide {
    Buy,
    Sell,
}

/// Everything a cost model may inspect about one fill.
#[derive(Debug, Clone, Copy)]
pub struct FillContext {
    pub ts: i64,
    pub side: FillSide,
    /// Reference price before costs.
    pub price: f64,
    pub quantity: f64,
}

impl FillContext {
    pub fn notional(&self) -> f64 {
        self.price * self.quantity
    }
}

/// Per-fill execution cost in basis points, applied against the trader.
pub trait CostHook: Send + Sync {
    fn fill_cost_bps(&self, fill: &FillContext) -> f64;
}

// ---------------------------------------------------------------------------
// Config + report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HarnessConfig {
    pub initial_capital: f64,
    /// Trade count at which the activity factor of `fitness` reaches 1.
    pub full_activity_trades: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            full_activity_trades: 10,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HarnessMetrics {
    pub total_return: f64,
    pub sharpe: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub trade_count: usize,
    /// `max(sharpe, 0) × (1 − max_drawdown) × min(1, trades / full_activity_trades)`.
    pub fitness: f64,
}

/// Absolute pass thresholds applied to one harness run. Market cells and
/// walk-forward windows are judged by the same pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PassThresholds {
    pub min_sharpe: f64,
    pub max_drawdown: f64,
}

impl Default for PassThresholds {
    fn default() -> Self {
        Self {
            min_sharpe: 0.5,
            max_drawdown: 0.25,
        }
    }
}

impl PassThresholds {
    pub fn passes(&self, m: &HarnessMetrics) -> bool {
        m.sharpe >= self.min_sharpe && m.max_drawdown <= self.max_drawdown
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessReport {
    pub trades: Vec<Trade>,
    pub equity_curve: EquityCurve,
    pub metrics: HarnessMetrics,
}

impl HarnessReport {
    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct OpenPosition {
    side: Side,
    entry_ts: i64,
    entry_price: f64,
    entry_index: usize,
    quantity: f64,
}

/// Stateless runner; every call builds a fresh strategy instance.
#[derive(Clone, Default)]
pub struct Harness {
    config: HarnessConfig,
    cost_hook: Option<Arc<dyn CostHook>>,
}

impl Harness {
    pub fn new(config: HarnessConfig) -> Self {
        Self {
            config,
            cost_hook: None,
        }
    }

    pub fn with_cost_hook(mut self, hook: Arc<dyn CostHook>) -> Self {
        self.cost_hook = Some(hook);
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn run(
        &self,
        factory: &dyn StrategyFactory,
        params: &ParamSet,
        candles: &[Candle],
    ) -> Result<HarnessReport, HarnessError> {
        self.run_with_warmup(factory, params, candles, 0)
    }

    /// Run with the first `warmup` candles visible to the strategy but closed
    /// to trading. Trades, equity and metrics cover the remaining candles.
    pub fn run_with_warmup(
        &self,
        factory: &dyn StrategyFactory,
        params: &ParamSet,
        candles: &[Candle],
        warmup: usize,
    ) -> Result<HarnessReport, HarnessError> {
        validate_candles(candles)?;
        if warmup >= candles.len() {
            return Err(HarnessError::WarmupTooLong {
                warmup,
                len: candles.len(),
            });
        }
        let mut strategy = factory.build(params)?;
        strategy.spec().validate()?;

        let trades = self.replay(strategy.as_mut(), candles, warmup)?;

        let start_ts = candles[warmup].ts;
        let end_ts = candles[candles.len() - 1].ts;
        let equity_curve = if trades.is_empty() {
            EquityCurve::flat(self.config.initial_capital, start_ts, end_ts)
        } else {
            EquityCurve::from_trades(self.config.initial_capital, start_ts, &trades)
        };
        let metrics = self.metrics(&trades, &equity_curve, &candles[warmup..]);

        debug!(
            strategy_id = factory.strategy_id(),
            candles = candles.len(),
            warmup,
            trades = metrics.trade_count,
            sharpe = metrics.sharpe,
            "harness run complete"
        );

        Ok(HarnessReport {
            trades,
            equity_curve,
            metrics,
        })
    }

    fn replay(
        &self,
        strategy: &mut dyn Strategy,
        candles: &[Candle],
        warmup: usize,
    ) -> Result<Vec<Trade>, HarnessError> {
        let spec = strategy.spec().clone();
        let last = candles.len() - 1;
        let mut trades = Vec::new();
        let mut equity = self.config.initial_capital;
        let mut position: Option<OpenPosition> = None;
        let mut pending: Option<Signal> = None;

        for (i, c) in candles.iter().enumerate() {
            // 1. Fill the previous close's signal at this open.
            if let Some(signal) = pending.take() {
                let wants = match signal {
                    Signal::EnterLong => Some(Side::Long),
                    Signal::EnterShort => Some(Side::Short),
                    Signal::Exit | Signal::Hold => None,
                };
                let reverse_or_exit = match (&position, signal) {
                    (Some(_), Signal::Exit) => true,
                    (Some(p), _) => wants.is_some_and(|w| w != p.side),
                    (None, _) => false,
                };
                if reverse_or_exit {
                    if let Some(p) = position.take() {
                        let t = self.close(&p, c.ts, c.open, ExitReason::Signal)?;
                        equity += t.pnl;
                        trades.push(t);
                    }
                }
                // No entries on the final candle: nothing could close them later.
                if position.is_none() && i < last {
                    if let Some(side) = wants {
                        position =
                            self.open(side, i, c.ts, c.open, equity, spec.position_fraction)?;
                    }
                }
            }

            // 2. Protective exits from the candle after entry onwards.
            let exit = position
                .as_ref()
                .filter(|p| i > p.entry_index)
                .and_then(|p| protective_exit(p, c, spec.stop_loss_pct, spec.take_profit_pct));
            if let Some((price, reason)) = exit {
                if let Some(p) = position.take() {
                    let t = self.close(&p, c.ts, price, reason)?;
                    equity += t.pnl;
                    trades.push(t);
                }
            }

            // 3. Strategy decides at the close.
            let ctx = StrategyContext {
                history: &candles[..=i],
                position: position.as_ref().map(|p| p.side),
                tradable: i + 1 >= warmup,
            };
            let signal = strategy.on_candle(&ctx);
            if ctx.tradable && i < last && signal != Signal::Hold {
                pending = Some(signal);
            }
        }

        if let Some(p) = position.take() {
            let c = &candles[last];
            trades.push(self.close(&p, c.ts, c.close, ExitReason::EndOfData)?);
        }
        Ok(trades)
    }

    fn open(
        &self,
        side: Side,
        index: usize,
        ts: i64,
        ref_price: f64,
        equity: f64,
        position_fraction: f64,
    ) -> Result<Option<OpenPosition>, HarnessError> {
        if equity <= 0.0 {
            return Ok(None);
        }
        let quantity = equity * position_fraction / ref_price;
        let fill_side = match side {
            Side::Long => FillSide::Buy,
            Side::Short => FillSide::Sell,
        };
        let entry_price = self.fill_price(ts, fill_side, ref_price, quantity)?;
        Ok(Some(OpenPosition {
            side,
            entry_ts: ts,
            entry_price,
            entry_index: index,
            quantity,
        }))
    }

    fn close(
        &self,
        p: &OpenPosition,
        ts: i64,
        ref_price: f64,
        reason: ExitReason,
    ) -> Result<Trade, HarnessError> {
        let fill_side = match p.side {
            Side::Long => FillSide::Sell,
            Side::Short => FillSide::Buy,
        };
        let exit_price = self.fill_price(ts, fill_side, ref_price, p.quantity)?;
        Ok(Trade::new(
            p.side,
            p.entry_ts,
            p.entry_price,
            ts,
            exit_price,
            p.quantity,
            reason,
        )?)
    }

    /// Apply the cost hook against the trader: buys fill higher, sells lower.
    fn fill_price(
        &self,
        ts: i64,
        side: FillSide,
        price: f64,
        quantity: f64,
    ) -> Result<f64, HarnessError> {
        let Some(hook) = &self.cost_hook else {
            return Ok(price);
        };
        let bps = hook.fill_cost_bps(&FillContext {
            ts,
            side,
            price,
            quantity,
        });
        if !bps.is_finite() || bps < 0.0 {
            return Err(HarnessError::NegativeFillCost { ts, bps });
        }
        let adj = bps / 10_000.0;
        Ok(match side {
            FillSide::Buy => price * (1.0 + adj),
            FillSide::Sell => price * (1.0 - adj),
        })
    }

    fn metrics(&self, trades: &[Trade], curve: &EquityCurve, traded: &[Candle]) -> HarnessMetrics {
        if trades.is_empty() {
            return HarnessMetrics::default();
        }
        let fallback_ppy = bar_periods_per_year(traded);
        let sharpe = annualized_sharpe(&curve.period_returns(), curve.periods_per_year(fallback_ppy));
        let max_drawdown = curve.max_drawdown();
        let wins = trades.iter().filter(|t| t.is_win()).count();
        let activity = if self.config.full_activity_trades == 0 {
            1.0
        } else {
            (trades.len() as f64 / self.config.full_activity_trades as f64).min(1.0)
        };
        HarnessMetrics {
            total_return: curve.total_return(),
            sharpe,
            max_drawdown,
            win_rate: safe_div(wins as f64, trades.len() as f64),
            trade_count: trades.len(),
            fitness: sharpe.max(0.0) * (1.0 - max_drawdown) * activity,
        }
    }
}

impl std::fmt::Debug for Harness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harness")
            .field("config", &self.config)
            .field("cost_hook", &self.cost_hook.is_some())
            .finish()
    }
}

fn validate_candles(candles: &[Candle]) -> Result<(), HarnessError> {
    if candles.is_empty() {
        return Err(HarnessError::EmptySeries);
    }
    for (index, c) in candles.iter().enumerate() {
        if !c.is_valid() {
            return Err(HarnessError::InvalidCandle { index, ts: c.ts });
        }
        if index > 0 && c.ts <= candles[index - 1].ts {
            return Err(HarnessError::UnorderedCandles {
                index,
                ts: c.ts,
                prev_ts: candles[index - 1].ts,
            });
        }
    }
    Ok(())
}

/// Stop / target check against the candle range. Gaps through a level fill
/// at the open. When both levels are inside the range the stop is assumed.
fn protective_exit(
    p: &OpenPosition,
    c: &Candle,
    stop_loss_pct: Option<f64>,
    take_profit_pct: Option<f64>,
) -> Option<(f64, ExitReason)> {
    match p.side {
        Side::Long => {
            if let Some(sl) = stop_loss_pct {
                let stop = p.entry_price * (1.0 - sl);
                if c.low <= stop {
                    return Some((stop.min(c.open), ExitReason::StopLoss));
                }
            }
            if let Some(tp) = take_profit_pct {
                let target = p.entry_price * (1.0 + tp);
                if c.high >= target {
                    return Some((target.max(c.open), ExitReason::TakeProfit));
                }
            }
        }
        Side::Short => {
            if let Some(sl) = stop_loss_pct {
                let stop = p.entry_price * (1.0 + sl);
                if c.high >= stop {
                    return Some((stop.max(c.open), ExitReason::StopLoss));
                }
            }
            if let Some(tp) = take_profit_pct {
                let target = p.entry_price * (1.0 - tp);
                if c.low <= target {
                    return Some((target.min(c.open), ExitReason::TakeProfit));
                }
            }
        }
    }
    None
}

/// Candles per year implied by the average spacing of the series.
fn bar_periods_per_year(candles: &[Candle]) -> f64 {
    match (candles.first(), candles.last()) {
        (Some(a), Some(b)) if candles.len() >= 2 && b.ts > a.ts => {
            let spacing = (b.ts - a.ts) as f64 / (candles.len() - 1) as f64;
            SECS_PER_YEAR / spacing
        }
        _ => 365.0,
    }
}
