use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Liquidity
// ---------------------------------------------------------------------------

/// Liquidity bucket from average daily traded notional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LiquidityClass {
    VeryHigh,
    High,
    Medium,
    Low,
    VeryLow,
}

impl LiquidityClass {
    pub fn from_daily_notional(notional: f64) -> Self {
        if !notional.is_finite() || notional < 1e6 {
            LiquidityClass::VeryLow
        } else if notional < 1e7 {
            LiquidityClass::Low
        } else if notional < 1e8 {
            LiquidityClass::Medium
        } else if notional < 1e9 {
            LiquidityClass::High
        } else {
            LiquidityClass::VeryHigh
        }
    }

    pub fn base_spread_bps(&self) -> f64 {
        match self {
            LiquidityClass::VeryHigh => 1.0,
            LiquidityClass::High => 2.0,
            LiquidityClass::Medium => 5.0,
            LiquidityClass::Low => 10.0,
            LiquidityClass::VeryLow => 25.0,
        }
    }

    /// Divides volatility slippage; deeper books absorb more.
    pub fn liquidity_factor(&self) -> f64 {
        match self {
            LiquidityClass::VeryHigh => 4.0,
            LiquidityClass::High => 2.0,
            LiquidityClass::Medium => 1.0,
            LiquidityClass::Low => 0.5,
            LiquidityClass::VeryLow => 0.25,
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Trading session by UTC hour.
///
/// | hours (UTC) | bucket            |
/// |-------------|-------------------|
/// | 00–06       | Asia              |
/// | 07–12       | Europe            |
/// | 13–15       | EuropeUsOverlap   |
/// | 16–20       | Us                |
/// | 21–23       | OffHours          |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionBucket {
    Asia,
    Europe,
    EuropeUsOverlap,
    Us,
    OffHours,
}

impl SessionBucket {
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            0..=6 => SessionBucket::Asia,
            7..=12 => SessionBucket::Europe,
            13..=15 => SessionBucket::EuropeUsOverlap,
            16..=20 => SessionBucket::Us,
            _ => SessionBucket::OffHours,
        }
    }

    /// Out-of-range timestamps fall back to `OffHours`.
    pub fn from_ts(ts: i64) -> Self {
        DateTime::<Utc>::from_timestamp(ts, 0)
            .map(|dt| Self::from_hour(dt.hour()))
            .unwrap_or(SessionBucket::OffHours)
    }

    pub fn spread_multiplier(&self) -> f64 {
        match self {
            SessionBucket::Asia => 1.2,
            SessionBucket::Europe => 1.0,
            SessionBucket::EuropeUsOverlap => 0.8,
            SessionBucket::Us => 0.9,
            SessionBucket::OffHours => 1.5,
        }
    }
}

// ---------------------------------------------------------------------------
// Latency
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatencyProfile {
    Colocated,
    Fast,
    Standard,
    Slow,
}

impl LatencyProfile {
    /// Signal-to-fill delay in milliseconds.
    pub fn latency_ms(&self) -> f64 {
        match self {
            LatencyProfile::Colocated => 1.0,
            LatencyProfile::Fast => 50.0,
            LatencyProfile::Standard => 250.0,
            LatencyProfile::Slow => 1_000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn liquidity_thresholds() {
        assert_eq!(LiquidityClass::from_daily_notional(5e9), LiquidityClass::VeryHigh);
        assert_eq!(LiquidityClass::from_daily_notional(1e9), LiquidityClass::VeryHigh);
        assert_eq!(LiquidityClass::from_daily_notional(5e8), LiquidityClass::High);
        assert_eq!(LiquidityClass::from_daily_notional(5e7), LiquidityClass::Medium);
        assert_eq!(LiquidityClass::from_daily_notional(5e6), LiquidityClass::Low);
        assert_eq!(LiquidityClass::from_daily_notional(10.0), LiquidityClass::VeryLow);
        assert_eq!(LiquidityClass::from_daily_notional(f64::NAN), LiquidityClass::VeryLow);
    }

    #[test]
    fn sessions_from_timestamp() {
        // 1970-01-01 14:00 UTC
        assert_eq!(SessionBucket::from_ts(14 * 3_600), SessionBucket::EuropeUsOverlap);
        assert_eq!(SessionBucket::from_ts(3 * 3_600), SessionBucket::Asia);
        assert_eq!(SessionBucket::from_ts(22 * 3_600), SessionBucket::OffHours);
        assert_eq!(SessionBucket::from_hour(18), SessionBucket::Us);
        assert_eq!(SessionBucket::from_hour(9), SessionBucket::Europe);
    }
}
