//! rdk-md
//!
//! Market Data collaborator boundary.
//!
//! The pipeline never fetches data itself; it asks a [`MarketDataSource`] for
//! ordered candles per (symbol, timeframe, lookback) and for trailing notional
//! volume (used by the execution cost model to pick a liquidity class).
//!
//! Sources are synchronous: the harness is CPU-bound and runs on worker
//! threads, so a source is called from inside the pool.

mod csv_dir;
mod memory;

pub use csv_dir::{parse_candles_csv, CsvDirSource};
pub use memory::InMemorySource;

use rdk_schemas::{Candle, Timeframe};

/// Default window for trailing notional volume.
pub const TRAILING_VOLUME_DAYS: i64 = 30;

/// Market data boundary consumed by the pipeline.
pub trait MarketDataSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    /// Ordered candles covering at most the last `lookback_days` of history.
    fn candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        lookback_days: u32,
    ) -> Result<Vec<Candle>, DataError>;

    /// Average daily traded notional over the trailing window.
    fn trailing_notional_volume(&self, symbol: &str) -> Result<f64, DataError>;
}

/// Why data could not be produced for a (symbol, timeframe) cell.
#[derive(Debug, Clone, PartialEq)]
pub enum DataError {
    NotFound { symbol: String, timeframe: String },
    Empty { symbol: String, timeframe: String },
    Io { path: String, message: String },
    Parse { path: String, line: u64, message: String },
    Invalid { symbol: String, timeframe: String, reason: String },
}

impl std::fmt::Display for DataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataError::NotFound { symbol, timeframe } => {
                write!(f, "no data for {} {}", symbol, timeframe)
            }
            DataError::Empty { symbol, timeframe } => {
                write!(f, "no candles in lookback window for {} {}", symbol, timeframe)
            }
            DataError::Io { path, message } => write!(f, "io error reading {}: {}", path, message),
            DataError::Parse {
                path,
                line,
                message,
            } => write!(f, "parse error in {} at line {}: {}", path, line, message),
            DataError::Invalid {
                symbol,
                timeframe,
                reason,
            } => write!(f, "invalid data for {} {}: {}", symbol, timeframe, reason),
        }
    }
}

impl std::error::Error for DataError {}

/// Reject unordered or malformed series before they reach the harness.
pub fn validate_series(symbol: &str, timeframe: Timeframe, candles: &[Candle]) -> Result<(), DataError> {
    for (i, c) in candles.iter().enumerate() {
        if !c.is_valid() {
            return Err(DataError::Invalid {
                symbol: symbol.to_string(),
                timeframe: timeframe.to_string(),
                reason: format!("malformed candle at ts={}", c.ts),
            });
        }
        if i > 0 && c.ts <= candles[i - 1].ts {
            return Err(DataError::Invalid {
                symbol: symbol.to_string(),
                timeframe: timeframe.to_string(),
                reason: format!("timestamps not strictly increasing at ts={}", c.ts),
            });
        }
    }
    Ok(())
}

/// Keep candles with `ts >= last.ts - lookback_days`. Input must be ordered.
pub fn apply_lookback(candles: Vec<Candle>, lookback_days: u32) -> Vec<Candle> {
    let Some(last) = candles.last() else {
        return candles;
    };
    let cutoff = last.ts - i64::from(lookback_days) * 86_400;
    candles.into_iter().filter(|c| c.ts >= cutoff).collect()
}

/// Average daily notional (close × volume) over the trailing `days`.
pub fn trailing_daily_notional(candles: &[Candle], days: i64) -> f64 {
    let Some(last) = candles.last() else {
        return 0.0;
    };
    let cutoff = last.ts - days * 86_400;
    let window: Vec<&Candle> = candles.iter().filter(|c| c.ts > cutoff).collect();
    let Some(first) = window.first() else {
        return 0.0;
    };
    let span_days = (((last.ts - first.ts) as f64) / 86_400.0).max(1.0);
    window.iter().map(|c| c.notional()).sum::<f64>() / span_days
}
