//! rdk-testkit
//!
//! Deterministic fixtures for scenario tests across the workspace:
//!
//! - candle generators (`trending_candles`, `flat_candles`, `random_walk_candles`)
//! - scripted and periodic strategies with fully predictable trades
//! - trade-list builders for analyzer tests
//! - an in-memory market data builder

mod candles;
mod strategies;

pub use candles::{
    flat_candles, linear_candles, random_walk_candles, trending_candles, BASE_TS,
};
pub use strategies::{PeriodicFactory, ScriptedFactory};

use anyhow::{Context, Result};
use rdk_md::{parse_candles_csv, InMemorySource};
use rdk_schemas::{Candle, ExitReason, Side, Timeframe, Trade};

/// Load candles from a CSV file with the `ts,open,high,low,close,volume` header.
pub fn load_candles_csv(path: &str) -> Result<Vec<Candle>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("read candles csv: {path}"))?;
    let candles = parse_candles_csv(path, &text).with_context(|| format!("parse candles csv: {path}"))?;
    for w in candles.windows(2) {
        if w[0].ts >= w[1].ts {
            anyhow::bail!("candles not strictly increasing in {path}");
        }
    }
    Ok(candles)
}

/// Long trades with the given pnls, one per day, each on `notional` at 100.
pub fn trades_from_pnls(pnls: &[f64], notional: f64) -> Vec<Trade> {
    let qty = notional / 100.0;
    pnls.iter()
        .enumerate()
        .filter_map(|(i, pnl)| {
            let entry_ts = BASE_TS + i as i64 * 86_400;
            let exit_price = 100.0 + pnl / qty;
            Trade::with_pnl(
                Side::Long,
                entry_ts,
                100.0,
                entry_ts + 3_600,
                exit_price.max(0.01),
                qty,
                *pnl,
                ExitReason::Signal,
            )
            .ok()
        })
        .collect()
}

/// Build an in-memory source where every (symbol, timeframe) pair gets the
/// series produced by `gen`.
pub fn memory_source<F>(symbols: &[&str], timeframes: &[Timeframe], mut gen: F) -> Result<InMemorySource>
where
    F: FnMut(&str, Timeframe) -> Vec<Candle>,
{
    let mut src = InMemorySource::new();
    for s in symbols {
        for tf in timeframes {
            src.insert(*s, *tf, gen(s, *tf))
                .with_context(|| format!("fixture series for {s} {tf}"))?;
        }
    }
    Ok(src)
}
