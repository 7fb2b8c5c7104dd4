//! rdk-backtest
//!
//! Evaluation Harness: replays one candle series through one strategy and
//! returns the closed trades, the equity curve and summary metrics.
//!
//! Pipeline per candle: FILL PENDING -> STOP/TARGET -> STRATEGY
//!
//! - Deterministic replay (same candles + params => identical report)
//! - No lookahead: the strategy sees candles up to and including the current one
//! - No same-bar fills: a signal at close `i` fills at the open of `i + 1`
//! - Worst-case ambiguity: when a candle touches both stop and target, the stop wins
//! - Optional cost hook adjusts every fill adversely

mod engine;
pub mod reference;
mod registry;
mod strategy;

pub use engine::{
    CostHook, FillContext, FillSide, Harness, HarnessConfig, HarnessError, HarnessMetrics,
    HarnessReport, PassThresholds,
};
pub use registry::{RegistryError, StrategyRegistry};
pub use strategy::{
    ParamRange, ParamSet, Signal, Strategy, StrategyContext, StrategyFactory, StrategySpec,
};
