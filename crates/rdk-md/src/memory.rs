use std::collections::BTreeMap;
use std::sync::Arc;

use rdk_schemas::{Candle, Timeframe};

use crate::{
    apply_lookback, trailing_daily_notional, validate_series, DataError, MarketDataSource,
    TRAILING_VOLUME_DAYS,
};

/// In-memory source keyed by (symbol, timeframe). Series are validated on insert.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    series: BTreeMap<(String, Timeframe), Arc<[Candle]>>,
    volumes: BTreeMap<String, f64>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        symbol: impl Into<String>,
        timeframe: Timeframe,
        candles: Vec<Candle>,
    ) -> Result<(), DataError> {
        let symbol = symbol.into();
        validate_series(&symbol, timeframe, &candles)?;
        self.series.insert((symbol, timeframe), candles.into());
        Ok(())
    }

    /// Builder form of [`InMemorySource::insert`].
    pub fn with_series(
        mut self,
        symbol: impl Into<String>,
        timeframe: Timeframe,
        candles: Vec<Candle>,
    ) -> Result<Self, DataError> {
        self.insert(symbol, timeframe, candles)?;
        Ok(self)
    }

    /// Override the trailing notional volume reported for `symbol`.
    pub fn with_notional_volume(mut self, symbol: impl Into<String>, daily_notional: f64) -> Self {
        self.volumes.insert(symbol.into(), daily_notional);
        self
    }
}

impl MarketDataSource for InMemorySource {
    fn source_name(&self) -> &'static str {
        "in_memory"
    }

    fn candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        lookback_days: u32,
    ) -> Result<Vec<Candle>, DataError> {
        let series = self
            .series
            .get(&(symbol.to_string(), timeframe))
            .ok_or_else(|| DataError::NotFound {
                symbol: symbol.to_string(),
                timeframe: timeframe.to_string(),
            })?;
        let candles = apply_lookback(series.to_vec(), lookback_days);
        if candles.is_empty() {
            return Err(DataError::Empty {
                symbol: symbol.to_string(),
                timeframe: timeframe.to_string(),
            });
        }
        Ok(candles)
    }

    fn trailing_notional_volume(&self, symbol: &str) -> Result<f64, DataError> {
        if let Some(v) = self.volumes.get(symbol) {
            return Ok(*v);
        }
        // Coarsest available series for the symbol.
        self.series
            .iter()
            .filter(|((s, _), _)| s == symbol)
            .max_by_key(|((_, tf), _)| *tf)
            .map(|(_, candles)| trailing_daily_notional(candles, TRAILING_VOLUME_DAYS))
            .ok_or_else(|| DataError::NotFound {
                symbol: symbol.to_string(),
                timeframe: "any".to_string(),
            })
    }
}
