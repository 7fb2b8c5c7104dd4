use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Candle
// ---------------------------------------------------------------------------

/// A single OHLCV candle. `ts` is the candle open time in UTC epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub ts: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(ts: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            ts,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Structural sanity: finite positive prices, `high`/`low` bracket the body,
    /// non-negative volume.
    pub fn is_valid(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return false;
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return false;
        }
        self.high >= self.open.max(self.close) && self.low <= self.open.min(self.close)
    }

    /// Notional traded in this candle (close × volume).
    pub fn notional(&self) -> f64 {
        self.close * self.volume
    }
}

// ---------------------------------------------------------------------------
// Timeframe
// ---------------------------------------------------------------------------

/// Supported candle timeframes.
///
/// Canonical user-facing values: `1m`, `5m`, `15m`, `1h`, `4h`, `1d`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 6] = [
        Timeframe::M1,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::H1,
        Timeframe::H4,
        Timeframe::D1,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
        }
    }

    pub fn secs(&self) -> i64 {
        match self {
            Timeframe::M1 => 60,
            Timeframe::M5 => 300,
            Timeframe::M15 => 900,
            Timeframe::H1 => 3_600,
            Timeframe::H4 => 14_400,
            Timeframe::D1 => 86_400,
        }
    }

    /// Candles per 365-day year (markets trade around the clock).
    pub fn periods_per_year(&self) -> f64 {
        365.0 * 86_400.0 / self.secs() as f64
    }

    /// Candles per calendar day.
    pub fn periods_per_day(&self) -> f64 {
        86_400.0 / self.secs() as f64
    }

    pub fn parse(s: &str) -> Result<Self, TimeframeParseError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1m" | "1min" => Ok(Timeframe::M1),
            "5m" | "5min" => Ok(Timeframe::M5),
            "15m" | "15min" => Ok(Timeframe::M15),
            "1h" | "60m" => Ok(Timeframe::H1),
            "4h" | "240m" => Ok(Timeframe::H4),
            "1d" | "1day" | "d" => Ok(Timeframe::D1),
            _ => Err(TimeframeParseError {
                value: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Timeframe {
    type Err = TimeframeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Timeframe::parse(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeframeParseError {
    pub value: String,
}

impl std::fmt::Display for TimeframeParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid timeframe '{}'. expected one of: 1m | 5m | 15m | 1h | 4h | 1d",
            self.value
        )
    }
}

impl std::error::Error for TimeframeParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeframe_parse_and_display_agree() {
        for tf in Timeframe::ALL {
            assert_eq!(Timeframe::parse(tf.as_str()).unwrap(), tf);
        }
        assert_eq!(Timeframe::parse("1D").unwrap(), Timeframe::D1);
        assert!(Timeframe::parse("2h").is_err());
    }

    #[test]
    fn candle_validity() {
        assert!(Candle::new(0, 100.0, 101.0, 99.0, 100.5, 10.0).is_valid());
        assert!(!Candle::new(0, 100.0, 99.0, 98.0, 100.5, 10.0).is_valid());
        assert!(!Candle::new(0, 0.0, 1.0, 0.0, 0.5, 10.0).is_valid());
        assert!(!Candle::new(0, 100.0, 101.0, 99.0, f64::NAN, 10.0).is_valid());
    }
}
