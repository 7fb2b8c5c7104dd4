use rdk_config::Violations;
use rdk_schemas::stats::{log_returns, ols_slope, std_dev};
use rdk_schemas::{Candle, Timeframe};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendRegime {
    Bull,
    Bear,
    Sideways,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolatilityRegime {
    Low,
    Normal,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MarketRegime {
    pub trend: TrendRegime,
    pub volatility: VolatilityRegime,
}

impl MarketRegime {
    /// Bucket key, e.g. `bull/high_vol`.
    pub fn label(&self) -> String {
        let trend = match self.trend {
            TrendRegime::Bull => "bull",
            TrendRegime::Bear => "bear",
            TrendRegime::Sideways => "sideways",
        };
        let vol = match self.volatility {
            VolatilityRegime::Low => "low_vol",
            VolatilityRegime::Normal => "normal_vol",
            VolatilityRegime::High => "high_vol",
        };
        format!("{trend}/{vol}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegimeConfig {
    /// Absolute fitted log drift over the whole series that separates a
    /// trend from a sideways market.
    pub trend_threshold: f64,
    /// Annualized realized volatility bounds.
    pub low_volatility: f64,
    pub high_volatility: f64,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            trend_threshold: 0.05,
            low_volatility: 0.35,
            high_volatility: 0.8,
        }
    }
}

impl RegimeConfig {
    pub fn validate_into(&self, path: &str, v: &mut Violations) {
        v.positive(&format!("{path}.trend_threshold"), self.trend_threshold);
        v.positive(&format!("{path}.low_volatility"), self.low_volatility);
        v.positive(&format!("{path}.high_volatility"), self.high_volatility);
        if self.low_volatility >= self.high_volatility {
            v.push(
                &format!("{path}.low_volatility"),
                "must be below high_volatility",
            );
        }
    }
}

/// Trend from the least-squares slope of ln(close) scaled to the series
/// length; volatility from annualized log-return deviation.
pub fn infer_regime(candles: &[Candle], timeframe: Timeframe, cfg: &RegimeConfig) -> MarketRegime {
    let log_closes: Vec<f64> = candles
        .iter()
        .filter(|c| c.close > 0.0)
        .map(|c| c.close.ln())
        .collect();
    let drift = ols_slope(&log_closes) * log_closes.len().saturating_sub(1) as f64;
    let trend = if drift > cfg.trend_threshold {
        TrendRegime::Bull
    } else if drift < -cfg.trend_threshold {
        TrendRegime::Bear
    } else {
        TrendRegime::Sideways
    };

    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let annual_vol = std_dev(&log_returns(&closes)) * timeframe.periods_per_year().sqrt();
    let volatility = if annual_vol < cfg.low_volatility {
        VolatilityRegime::Low
    } else if annual_vol > cfg.high_volatility {
        VolatilityRegime::High
    } else {
        VolatilityRegime::Normal
    };

    MarketRegime { trend, volatility }
}
