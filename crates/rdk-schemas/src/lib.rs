//! rdk-schemas
//!
//! Shared data model for the validation pipeline.
//!
//! - `Candle`, `Timeframe`: immutable market input.
//! - `Trade`, `EquityCurve`: harness output, immutable once produced.
//! - `stats`: small deterministic statistics helpers shared by every analyzer.
//! - `control`: run-scoped cancellation flag and per-phase deadline guard.
//!
//! Result entities of the individual analyzers live in their owning crates;
//! only the types every crate needs are defined here.

pub mod control;
mod market;
pub mod stats;
mod trade;

pub use control::{Interrupted, Phase, PhaseGuard, RunControl};
pub use market::{Candle, Timeframe, TimeframeParseError};
pub use trade::{EquityCurve, EquityPoint, ExitReason, Side, Trade, TradeError};

/// Seconds in the 365.25-day year used for CAGR and span computations.
pub const SECS_PER_YEAR: f64 = 365.25 * 86_400.0;
