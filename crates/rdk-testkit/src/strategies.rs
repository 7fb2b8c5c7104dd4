use std::collections::BTreeMap;

use rdk_backtest::{
    HarnessError, ParamRange, ParamSet, Signal, Strategy, StrategyContext, StrategyFactory,
    StrategySpec,
};
use rdk_schemas::Side;

// ---------------------------------------------------------------------------
// Scripted
// ---------------------------------------------------------------------------

/// Emits fixed signals at fixed candle indices, `Hold` everywhere else.
#[derive(Debug, Clone)]
pub struct ScriptedFactory {
    pub id: String,
    pub script: Vec<(usize, Signal)>,
    pub position_fraction: f64,
    pub stop_loss_pct: Option<f64>,
    pub take_profit_pct: Option<f64>,
}

impl ScriptedFactory {
    pub fn new(id: impl Into<String>, script: Vec<(usize, Signal)>) -> Self {
        Self {
            id: id.into(),
            script,
            position_fraction: 0.1,
            stop_loss_pct: None,
            take_profit_pct: None,
        }
    }

    /// Never signals.
    pub fn silent(id: impl Into<String>) -> Self {
        Self::new(id, Vec::new())
    }
}

struct Scripted {
    spec: StrategySpec,
    script: BTreeMap<usize, Signal>,
}

impl Strategy for Scripted {
    fn spec(&self) -> &StrategySpec {
        &self.spec
    }

    fn on_candle(&mut self, ctx: &StrategyContext<'_>) -> Signal {
        self.script.get(&ctx.index()).copied().unwrap_or(Signal::Hold)
    }
}

impl StrategyFactory for ScriptedFactory {
    fn strategy_id(&self) -> &str {
        &self.id
    }

    fn default_params(&self) -> ParamSet {
        ParamSet::new()
    }

    fn tunable_params(&self) -> Vec<ParamRange> {
        Vec::new()
    }

    fn build(&self, params: &ParamSet) -> Result<Box<dyn Strategy>, HarnessError> {
        let mut spec = StrategySpec::new(self.id.clone(), params.clone());
        spec.position_fraction = self.position_fraction;
        spec.stop_loss_pct = self.stop_loss_pct;
        spec.take_profit_pct = self.take_profit_pct;
        Ok(Box::new(Scripted {
            spec,
            script: self.script.iter().copied().collect(),
        }))
    }
}

// ---------------------------------------------------------------------------
// Periodic
// ---------------------------------------------------------------------------

/// Enters `side` every `every` candles (when flat) and exits after `hold`
/// candles. On a noise-free trend every trade has the same sign.
#[derive(Debug, Clone)]
pub struct PeriodicFactory {
    pub id: String,
    pub side: Side,
    pub position_fraction: f64,
}

impl PeriodicFactory {
    pub fn new(id: impl Into<String>, side: Side) -> Self {
        Self {
            id: id.into(),
            side,
            position_fraction: 0.1,
        }
    }
}

struct Periodic {
    spec: StrategySpec,
    side: Side,
    every: usize,
    hold: usize,
    entered_at: Option<usize>,
}

impl Strategy for Periodic {
    fn spec(&self) -> &StrategySpec {
        &self.spec
    }

    fn on_candle(&mut self, ctx: &StrategyContext<'_>) -> Signal {
        let i = ctx.index();
        match (ctx.position, self.entered_at) {
            (Some(_), Some(at)) if i >= at + self.hold => {
                self.entered_at = None;
                Signal::Exit
            }
            (Some(_), _) => Signal::Hold,
            (None, _) if ctx.tradable && i % self.every == 0 => {
                self.entered_at = Some(i);
                match self.side {
                    Side::Long => Signal::EnterLong,
                    Side::Short => Signal::EnterShort,
                }
            }
            _ => Signal::Hold,
        }
    }
}

impl StrategyFactory for PeriodicFactory {
    fn strategy_id(&self) -> &str {
        &self.id
    }

    fn default_params(&self) -> ParamSet {
        ParamSet::new().with("every", 10.0).with("hold", 5.0)
    }

    fn tunable_params(&self) -> Vec<ParamRange> {
        vec![ParamRange::new("hold", 1.0, 50.0, true)]
    }

    fn build(&self, params: &ParamSet) -> Result<Box<dyn Strategy>, HarnessError> {
        let every = params.get_or("every", 10.0).round();
        let hold = params.get_or("hold", 5.0).round();
        if every < 1.0 || hold < 1.0 {
            return Err(HarnessError::InvalidParams {
                strategy_id: self.id.clone(),
                reason: format!("every ({every}) and hold ({hold}) must be >= 1"),
            });
        }
        let mut spec = StrategySpec::new(self.id.clone(), params.clone());
        spec.position_fraction = self.position_fraction;
        Ok(Box::new(Periodic {
            spec,
            side: self.side,
            every: every as usize,
            hold: hold as usize,
            entered_at: None,
        }))
    }
}
