//! CSV directory source.
//!
//! Layout: `<root>/<SYMBOL>_<timeframe>.csv`, e.g. `BTCUSDT_1h.csv`.
//!
//! Required columns: `ts` (epoch seconds), `open`, `high`, `low`, `close`,
//! `volume`. Rows must be strictly increasing in `ts`.

use std::path::{Path, PathBuf};

use rdk_schemas::{Candle, Timeframe};
use serde::Deserialize;
use tracing::debug;

use crate::{
    apply_lookback, trailing_daily_notional, validate_series, DataError, MarketDataSource,
    TRAILING_VOLUME_DAYS,
};

#[derive(Debug, Deserialize)]
struct CsvRow {
    ts: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Parse candles from CSV text. `origin` names the input in error messages.
pub fn parse_candles_csv(origin: &str, text: &str) -> Result<Vec<Candle>, DataError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(text.as_bytes());

    let mut out = Vec::new();
    for row in reader.deserialize::<CsvRow>() {
        let row = row.map_err(|e| DataError::Parse {
            path: origin.to_string(),
            line: e.position().map(|p| p.line()).unwrap_or(0),
            message: e.to_string(),
        })?;
        out.push(Candle::new(
            row.ts, row.open, row.high, row.low, row.close, row.volume,
        ));
    }
    Ok(out)
}

#[derive(Debug, Clone)]
pub struct CsvDirSource {
    root: PathBuf,
}

impl CsvDirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, symbol: &str, timeframe: Timeframe) -> PathBuf {
        self.root
            .join(format!("{}_{}.csv", symbol, timeframe.as_str()))
    }

    fn load_all(&self, symbol: &str, timeframe: Timeframe) -> Result<Vec<Candle>, DataError> {
        let path = self.path_for(symbol, timeframe);
        if !path.exists() {
            return Err(DataError::NotFound {
                symbol: symbol.to_string(),
                timeframe: timeframe.to_string(),
            });
        }
        let origin = path.display().to_string();
        let text = std::fs::read_to_string(&path).map_err(|e| DataError::Io {
            path: origin.clone(),
            message: e.to_string(),
        })?;
        let candles = parse_candles_csv(&origin, &text)?;
        validate_series(symbol, timeframe, &candles)?;
        debug!(symbol, timeframe = %timeframe, rows = candles.len(), "loaded csv candles");
        Ok(candles)
    }
}

impl MarketDataSource for CsvDirSource {
    fn source_name(&self) -> &'static str {
        "csv_dir"
    }

    fn candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        lookback_days: u32,
    ) -> Result<Vec<Candle>, DataError> {
        let candles = apply_lookback(self.load_all(symbol, timeframe)?, lookback_days);
        if candles.is_empty() {
            return Err(DataError::Empty {
                symbol: symbol.to_string(),
                timeframe: timeframe.to_string(),
            });
        }
        Ok(candles)
    }

    /// Uses the coarsest timeframe file available for the symbol.
    fn trailing_notional_volume(&self, symbol: &str) -> Result<f64, DataError> {
        for tf in Timeframe::ALL.iter().rev() {
            match self.load_all(symbol, *tf) {
                Ok(candles) => return Ok(trailing_daily_notional(&candles, TRAILING_VOLUME_DAYS)),
                Err(DataError::NotFound { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(DataError::NotFound {
            symbol: symbol.to_string(),
            timeframe: "any".to_string(),
        })
    }
}
