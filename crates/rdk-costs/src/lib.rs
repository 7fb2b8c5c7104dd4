//! rdk-costs
//!
//! Execution Cost Model.
//!
//! Per-fill cost in basis points is the sum of four components:
//!
//! - spread: `base(class) × session × (1 + k·ln(1 + trades/day))`
//! - impact: `coef × σ_daily × sqrt(order / reference volume) × 10⁴`
//! - delay: `σ_bar × sqrt(min(1, latency / bar)) × 0.5 × 10⁴`
//! - volatility slippage: `coef × σ_daily × 10⁴ / liquidity factor`
//!
//! Impact is sub-linear in order size, so total cost grows with size while
//! the per-dollar cost never decreases.

mod classes;
mod model;

pub use classes::{LatencyProfile, LiquidityClass, SessionBucket};
pub use model::{
    realized_volatility, CostConfig, CostDrag, CostModel, CostModelHook, MarketProfile,
    SlippageEstimate,
};
