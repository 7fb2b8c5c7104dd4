use std::collections::BTreeMap;

use rdk_schemas::{Candle, Side};
use serde::{Deserialize, Serialize};

use crate::HarnessError;

/// Strategy decision at a candle close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    EnterLong,
    EnterShort,
    Exit,
    Hold,
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Ordered name -> value parameter map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamSet(BTreeMap<String, f64>);

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: f64) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn get_or(&self, name: &str, default: f64) -> f64 {
        self.get(name).unwrap_or(default)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Tunable range of one parameter, used by the sensitivity sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamRange {
    pub name: String,
    pub min: f64,
    pub max: f64,
    /// Values are rounded to whole numbers (lookback lengths etc.).
    pub integer: bool,
}

impl ParamRange {
    pub fn new(name: impl Into<String>, min: f64, max: f64, integer: bool) -> Self {
        Self {
            name: name.into(),
            min,
            max,
            integer,
        }
    }

    /// Clamp into `[min, max]`, rounding integer parameters.
    pub fn clamp(&self, value: f64) -> f64 {
        let v = value.clamp(self.min, self.max);
        if self.integer {
            v.round()
        } else {
            v
        }
    }
}

// ---------------------------------------------------------------------------
// Spec + context
// ---------------------------------------------------------------------------

/// Strategy identity and trade-management settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySpec {
    pub strategy_id: String,
    pub params: ParamSet,
    /// Fraction of current equity committed per entry, in (0, 1].
    pub position_fraction: f64,
    pub stop_loss_pct: Option<f64>,
    pub take_profit_pct: Option<f64>,
}

impl StrategySpec {
    pub fn new(strategy_id: impl Into<String>, params: ParamSet) -> Self {
        Self {
            strategy_id: strategy_id.into(),
            params,
            position_fraction: 0.1,
            stop_loss_pct: None,
            take_profit_pct: None,
        }
    }

    pub fn validate(&self) -> Result<(), HarnessError> {
        let invalid = |reason: String| HarnessError::InvalidSpec {
            strategy_id: self.strategy_id.clone(),
            reason,
        };
        if !(self.position_fraction > 0.0 && self.position_fraction <= 1.0) {
            return Err(invalid(format!(
                "position_fraction {} outside (0, 1]",
                self.position_fraction
            )));
        }
        if let Some(sl) = self.stop_loss_pct {
            if !(sl > 0.0 && sl < 1.0) {
                return Err(invalid(format!("stop_loss_pct {} outside (0, 1)", sl)));
            }
        }
        if let Some(tp) = self.take_profit_pct {
            if !(tp > 0.0 && tp.is_finite()) {
                return Err(invalid(format!("take_profit_pct {} must be > 0", tp)));
            }
        }
        Ok(())
    }
}

/// What a strategy may look at when deciding. `history` ends at the current
/// candle, so there is no way to read ahead.
#[derive(Debug, Clone, Copy)]
pub struct StrategyContext<'a> {
    pub history: &'a [Candle],
    pub position: Option<Side>,
    /// False during the warm-up prefix; signals are ignored there.
    pub tradable: bool,
}

impl<'a> StrategyContext<'a> {
    pub fn current(&self) -> &'a Candle {
        // history always holds at least the current candle.
        &self.history[self.history.len() - 1]
    }

    pub fn index(&self) -> usize {
        self.history.len() - 1
    }

    /// Simple moving average of the last `n` closes, if that many exist.
    pub fn sma(&self, n: usize) -> Option<f64> {
        if n == 0 || self.history.len() < n {
            return None;
        }
        let tail = &self.history[self.history.len() - n..];
        Some(tail.iter().map(|c| c.close).sum::<f64>() / n as f64)
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// A single strategy instance. Instances carry run state and are never shared
/// between runs; build a fresh one through its factory.
pub trait Strategy: Send {
    fn spec(&self) -> &StrategySpec;

    fn on_candle(&mut self, ctx: &StrategyContext<'_>) -> Signal;
}

/// Produces strategy instances for a parameter set.
pub trait StrategyFactory: Send + Sync {
    fn strategy_id(&self) -> &str;

    fn default_params(&self) -> ParamSet;

    /// Parameters the sensitivity sweep may perturb. Empty means none.
    fn tunable_params(&self) -> Vec<ParamRange>;

    fn build(&self, params: &ParamSet) -> Result<Box<dyn Strategy>, HarnessError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_range_rounds_and_clamps() {
        let r = ParamRange::new("lookback", 5.0, 50.0, true);
        assert_eq!(r.clamp(12.4), 12.0);
        assert_eq!(r.clamp(80.0), 50.0);
        assert_eq!(r.clamp(1.0), 5.0);
    }

    #[test]
    fn spec_validation() {
        let mut spec = StrategySpec::new("s", ParamSet::new());
        assert!(spec.validate().is_ok());
        spec.position_fraction = 0.0;
        assert!(spec.validate().is_err());
        spec.position_fraction = 0.5;
        spec.stop_loss_pct = Some(1.5);
        assert!(spec.validate().is_err());
    }

    #[test]
    fn param_set_is_ordered() {
        let p = ParamSet::new().with("slow", 30.0).with("fast", 10.0);
        let names: Vec<&str> = p.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["fast", "slow"]);
    }
}
