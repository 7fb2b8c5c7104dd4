use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rdk_schemas::{Candle, Timeframe};

/// 2024-01-01 00:00:00 UTC.
pub const BASE_TS: i64 = 1_704_067_200;

fn candle_from(ts: i64, open: f64, close: f64, wick: f64, volume: f64) -> Candle {
    let high = open.max(close) * (1.0 + wick);
    let low = open.min(close) * (1.0 - wick);
    Candle::new(ts, open, high, low, close, volume)
}

/// Constant price, no range. Strategies that need movement never trade.
pub fn flat_candles(n: usize, timeframe: Timeframe, price: f64) -> Vec<Candle> {
    (0..n)
        .map(|i| Candle::new(BASE_TS + i as i64 * timeframe.secs(), price, price, price, price, 1_000.0))
        .collect()
}

/// Noise-free geometric path: close grows by `drift` (log) every candle.
pub fn linear_candles(n: usize, timeframe: Timeframe, start: f64, drift: f64) -> Vec<Candle> {
    let mut close = start;
    (0..n)
        .map(|i| {
            let open = close;
            close = open * drift.exp();
            candle_from(BASE_TS + i as i64 * timeframe.secs(), open, close, 0.001, 1_000.0)
        })
        .collect()
}

/// Log drift per candle plus uniform noise of half-width `noise`.
pub fn trending_candles(
    n: usize,
    timeframe: Timeframe,
    start: f64,
    drift: f64,
    noise: f64,
    seed: u64,
) -> Vec<Candle> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut close = start;
    (0..n)
        .map(|i| {
            let open = close;
            let shock: f64 = rng.gen_range(-1.0..=1.0);
            close = open * (drift + noise * shock).exp();
            let wick = noise * rng.gen_range(0.0..=0.5);
            let volume = 1_000.0 * rng.gen_range(0.5..=1.5);
            candle_from(BASE_TS + i as i64 * timeframe.secs(), open, close, wick, volume)
        })
        .collect()
}

/// Driftless random walk.
pub fn random_walk_candles(n: usize, timeframe: Timeframe, start: f64, noise: f64, seed: u64) -> Vec<Candle> {
    trending_candles(n, timeframe, start, 0.0, noise, seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generators_produce_valid_ordered_series() {
        for series in [
            flat_candles(50, Timeframe::H1, 100.0),
            linear_candles(50, Timeframe::H1, 100.0, 0.01),
            trending_candles(500, Timeframe::M15, 100.0, 0.001, 0.01, 9),
            random_walk_candles(500, Timeframe::D1, 50.0, 0.03, 3),
        ] {
            assert!(series.iter().all(Candle::is_valid));
            assert!(series.windows(2).all(|w| w[0].ts < w[1].ts));
        }
    }

    #[test]
    fn same_seed_same_series() {
        let a = trending_candles(100, Timeframe::H1, 100.0, 0.0, 0.02, 5);
        let b = trending_candles(100, Timeframe::H1, 100.0, 0.0, 0.02, 5);
        assert_eq!(a, b);
    }
}
