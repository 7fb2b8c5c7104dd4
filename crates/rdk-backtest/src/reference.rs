//! Reference strategies shipped with the harness.
//!
//! Used by the CLI and daemon as ready-made registry entries, and by tests as
//! realistic workloads. Both are deterministic and keep no state beyond what
//! the context already exposes.

use std::sync::Arc;

use rdk_schemas::Side;

use crate::{
    HarnessError, ParamRange, ParamSet, RegistryError, Signal, Strategy, StrategyContext,
    StrategyFactory, StrategyRegistry, StrategySpec,
};

/// Registry holding every reference strategy.
pub fn registry() -> Result<StrategyRegistry, RegistryError> {
    let mut r = StrategyRegistry::new();
    r.register(Arc::new(SmaCrossFactory))?;
    r.register(Arc::new(BreakoutFactory))?;
    Ok(r)
}

fn spec_from(strategy_id: &str, params: &ParamSet) -> StrategySpec {
    let mut spec = StrategySpec::new(strategy_id, params.clone());
    spec.position_fraction = params.get_or("position_fraction", 0.1);
    spec.stop_loss_pct = params.get("stop_loss_pct").filter(|v| *v > 0.0);
    spec.take_profit_pct = params.get("take_profit_pct").filter(|v| *v > 0.0);
    spec
}

fn lookback(strategy_id: &str, params: &ParamSet, name: &str, default: f64) -> Result<usize, HarnessError> {
    let v = params.get_or(name, default);
    if !(v.is_finite() && v >= 1.0) {
        return Err(HarnessError::InvalidParams {
            strategy_id: strategy_id.to_string(),
            reason: format!("{} must be >= 1, got {}", name, v),
        });
    }
    Ok(v.round() as usize)
}

// ---------------------------------------------------------------------------
// SMA crossover
// ---------------------------------------------------------------------------

/// Long while the fast SMA is above the slow SMA, flat otherwise.
pub struct SmaCross {
    spec: StrategySpec,
    fast: usize,
    slow: usize,
}

impl Strategy for SmaCross {
    fn spec(&self) -> &StrategySpec {
        &self.spec
    }

    fn on_candle(&mut self, ctx: &StrategyContext<'_>) -> Signal {
        let (Some(fast), Some(slow)) = (ctx.sma(self.fast), ctx.sma(self.slow)) else {
            return Signal::Hold;
        };
        match (ctx.position, fast > slow) {
            (None, true) => Signal::EnterLong,
            (Some(Side::Long), false) => Signal::Exit,
            _ => Signal::Hold,
        }
    }
}

pub struct SmaCrossFactory;

impl StrategyFactory for SmaCrossFactory {
    fn strategy_id(&self) -> &str {
        "sma_cross"
    }

    fn default_params(&self) -> ParamSet {
        ParamSet::new()
            .with("fast", 10.0)
            .with("slow", 30.0)
            .with("position_fraction", 0.1)
            .with("stop_loss_pct", 0.05)
    }

    fn tunable_params(&self) -> Vec<ParamRange> {
        vec![
            ParamRange::new("fast", 2.0, 50.0, true),
            ParamRange::new("slow", 5.0, 200.0, true),
        ]
    }

    fn build(&self, params: &ParamSet) -> Result<Box<dyn Strategy>, HarnessError> {
        let fast = lookback(self.strategy_id(), params, "fast", 10.0)?;
        let slow = lookback(self.strategy_id(), params, "slow", 30.0)?;
        if fast >= slow {
            return Err(HarnessError::InvalidParams {
                strategy_id: self.strategy_id().to_string(),
                reason: format!("fast ({}) must be shorter than slow ({})", fast, slow),
            });
        }
        Ok(Box::new(SmaCross {
            spec: spec_from(self.strategy_id(), params),
            fast,
            slow,
        }))
    }
}

// ---------------------------------------------------------------------------
// Channel breakout
// ---------------------------------------------------------------------------

/// Enters in the direction of a close outside the prior `lookback` range and
/// reverses on the opposite break.
pub struct Breakout {
    spec: StrategySpec,
    lookback: usize,
}

impl Strategy for Breakout {
    fn spec(&self) -> &StrategySpec {
        &self.spec
    }

    fn on_candle(&mut self, ctx: &StrategyContext<'_>) -> Signal {
        let i = ctx.index();
        if i < self.lookback {
            return Signal::Hold;
        }
        let prior = &ctx.history[i - self.lookback..i];
        let hi = prior.iter().map(|c| c.high).fold(f64::MIN, f64::max);
        let lo = prior.iter().map(|c| c.low).fold(f64::MAX, f64::min);
        let close = ctx.current().close;
        match ctx.position {
            Some(Side::Long) if close < lo => Signal::EnterShort,
            Some(Side::Short) if close > hi => Signal::EnterLong,
            None if close > hi => Signal::EnterLong,
            None if close < lo => Signal::EnterShort,
            _ => Signal::Hold,
        }
    }
}

pub struct BreakoutFactory;

impl StrategyFactory for BreakoutFactory {
    fn strategy_id(&self) -> &str {
        "breakout"
    }

    fn default_params(&self) -> ParamSet {
        ParamSet::new()
            .with("lookback", 20.0)
            .with("position_fraction", 0.1)
            .with("stop_loss_pct", 0.04)
            .with("take_profit_pct", 0.08)
    }

    fn tunable_params(&self) -> Vec<ParamRange> {
        vec![
            ParamRange::new("lookback", 5.0, 100.0, true),
            ParamRange::new("stop_loss_pct", 0.01, 0.2, false),
            ParamRange::new("take_profit_pct", 0.02, 0.4, false),
        ]
    }

    fn build(&self, params: &ParamSet) -> Result<Box<dyn Strategy>, HarnessError> {
        Ok(Box::new(Breakout {
            spec: spec_from(self.strategy_id(), params),
            lookback: lookback(self.strategy_id(), params, "lookback", 20.0)?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_lists_reference_strategies() {
        let r = registry().unwrap();
        assert_eq!(r.list(), vec!["sma_cross", "breakout"]);
    }
}
