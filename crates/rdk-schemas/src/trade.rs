use serde::{Deserialize, Serialize};

use crate::SECS_PER_YEAR;

// ---------------------------------------------------------------------------
// Trade
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1 for long, -1 for short.
    pub fn sign(&self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    Signal,
    StopLoss,
    TakeProfit,
    EndOfData,
}

/// A closed round-trip. Immutable once produced; build with [`Trade::new`] or
/// [`Trade::with_pnl`] so the `exit_ts > entry_ts` invariant holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub entry_ts: i64,
    pub exit_ts: i64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub side: Side,
    pub quantity: f64,
    /// Realized PnL in account currency.
    pub pnl: f64,
    /// PnL as a fraction of entry notional.
    pub pnl_pct: f64,
    pub exit_reason: ExitReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TradeError {
    /// exit_ts must be strictly after entry_ts.
    NonPositiveDuration { entry_ts: i64, exit_ts: i64 },
    /// Prices and quantity must be finite and > 0.
    InvalidValue { field: &'static str, value: f64 },
}

impl std::fmt::Display for TradeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeError::NonPositiveDuration { entry_ts, exit_ts } => write!(
                f,
                "trade exit_ts {} must be after entry_ts {}",
                exit_ts, entry_ts
            ),
            TradeError::InvalidValue { field, value } => {
                write!(f, "trade field {} has invalid value {}", field, value)
            }
        }
    }
}

impl std::error::Error for TradeError {}

impl Trade {
    /// Build a trade from prices; pnl is derived from side, prices and quantity.
    pub fn new(
        side: Side,
        entry_ts: i64,
        entry_price: f64,
        exit_ts: i64,
        exit_price: f64,
        quantity: f64,
        exit_reason: ExitReason,
    ) -> Result<Self, TradeError> {
        let pnl = side.sign() * (exit_price - entry_price) * quantity;
        Self::with_pnl(
            side,
            entry_ts,
            entry_price,
            exit_ts,
            exit_price,
            quantity,
            pnl,
            exit_reason,
        )
    }

    /// Build a trade with an explicit pnl (e.g. after costs were deducted).
    #[allow(clippy::too_many_arguments)]
    pub fn with_pnl(
        side: Side,
        entry_ts: i64,
        entry_price: f64,
        exit_ts: i64,
        exit_price: f64,
        quantity: f64,
        pnl: f64,
        exit_reason: ExitReason,
    ) -> Result<Self, TradeError> {
        if exit_ts <= entry_ts {
            return Err(TradeError::NonPositiveDuration { entry_ts, exit_ts });
        }
        for (field, value) in [
            ("entry_price", entry_price),
            ("exit_price", exit_price),
            ("quantity", quantity),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(TradeError::InvalidValue { field, value });
            }
        }
        if !pnl.is_finite() {
            return Err(TradeError::InvalidValue { field: "pnl", value: pnl });
        }
        let notional = entry_price * quantity;
        Ok(Self {
            entry_ts,
            exit_ts,
            entry_price,
            exit_price,
            side,
            quantity,
            pnl,
            pnl_pct: pnl / notional,
            exit_reason,
        })
    }

    pub fn entry_notional(&self) -> f64 {
        self.entry_price * self.quantity
    }

    pub fn exit_notional(&self) -> f64 {
        self.exit_price * self.quantity
    }

    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }

    /// Copy of this trade with `cost` deducted from pnl. `exit_ts > entry_ts`
    /// already holds, so this cannot fail.
    pub fn net_of(&self, cost: f64) -> Trade {
        let pnl = self.pnl - cost;
        Trade {
            pnl,
            pnl_pct: pnl / self.entry_notional(),
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Equity curve
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub ts: i64,
    pub equity: f64,
}

/// Ordered (ts, equity) points derived from trades and starting capital.
///
/// The first point is the series start at `initial_capital`; every trade adds
/// one point at its exit time. For any trade list the final equity equals
/// `initial_capital + Σ pnl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityCurve {
    pub initial_capital: f64,
    pub points: Vec<EquityPoint>,
}

impl EquityCurve {
    pub fn from_trades(initial_capital: f64, start_ts: i64, trades: &[Trade]) -> Self {
        let mut points = Vec::with_capacity(trades.len() + 1);
        points.push(EquityPoint {
            ts: start_ts,
            equity: initial_capital,
        });
        let mut equity = initial_capital;
        for t in trades {
            equity += t.pnl;
            points.push(EquityPoint {
                ts: t.exit_ts,
                equity,
            });
        }
        Self {
            initial_capital,
            points,
        }
    }

    /// Flat curve spanning `[start_ts, end_ts]` (zero-activity result).
    pub fn flat(initial_capital: f64, start_ts: i64, end_ts: i64) -> Self {
        let mut points = vec![EquityPoint {
            ts: start_ts,
            equity: initial_capital,
        }];
        if end_ts > start_ts {
            points.push(EquityPoint {
                ts: end_ts,
                equity: initial_capital,
            });
        }
        Self {
            initial_capital,
            points,
        }
    }

    pub fn final_equity(&self) -> f64 {
        self.points
            .last()
            .map(|p| p.equity)
            .unwrap_or(self.initial_capital)
    }

    /// `final / initial - 1`, 0 for a non-positive starting capital.
    pub fn total_return(&self) -> f64 {
        if self.initial_capital <= 0.0 {
            return 0.0;
        }
        self.final_equity() / self.initial_capital - 1.0
    }

    /// Simple returns between consecutive points. Steps starting from a
    /// non-positive equity are skipped.
    pub fn period_returns(&self) -> Vec<f64> {
        self.points
            .windows(2)
            .filter(|w| w[0].equity > 0.0)
            .map(|w| w[1].equity / w[0].equity - 1.0)
            .collect()
    }

    /// Peak-to-trough drawdown as a fraction in [0, 1].
    pub fn max_drawdown(&self) -> f64 {
        let Some(first) = self.points.first() else {
            return 0.0;
        };
        let mut peak = first.equity;
        let mut max_dd = 0.0_f64;
        for p in &self.points {
            if p.equity > peak {
                peak = p.equity;
            }
            if peak > 0.0 {
                max_dd = max_dd.max((peak - p.equity) / peak);
            }
        }
        max_dd.min(1.0)
    }

    pub fn span_secs(&self) -> i64 {
        match (self.points.first(), self.points.last()) {
            (Some(a), Some(b)) => (b.ts - a.ts).max(0),
            _ => 0,
        }
    }

    pub fn span_years(&self) -> f64 {
        self.span_secs() as f64 / SECS_PER_YEAR
    }

    /// Observed return periods per year. Falls back to `fallback` when the
    /// curve is too short to measure its own frequency.
    pub fn periods_per_year(&self, fallback: f64) -> f64 {
        let n = self.points.len().saturating_sub(1);
        let years = self.span_years();
        if n >= 2 && years > 0.0 {
            n as f64 / years
        } else {
            fallback
        }
    }
}
