//! Seeded resampling shared by the bootstrap simulator and the profit
//! analyzer's confidence intervals.
//!
//! Run `i` draws from `ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(i))`,
//! so output is identical for any worker count or scheduling order.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use rdk_schemas::stats::{percentile_sorted, sort_f64};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resampler {
    base_seed: u64,
}

impl Resampler {
    pub fn new(base_seed: u64) -> Self {
        Self { base_seed }
    }

    pub fn rng_for(&self, run: usize) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.base_seed.wrapping_add(run as u64))
    }

    /// Fill `out` with `values.len()` draws with replacement.
    pub fn resample_into(&self, rng: &mut ChaCha8Rng, values: &[f64], out: &mut Vec<f64>) {
        out.clear();
        let n = values.len();
        if n == 0 {
            return;
        }
        out.extend((0..n).map(|_| values[rng.gen_range(0..n)]));
    }

    pub fn resample(&self, run: usize, values: &[f64]) -> Vec<f64> {
        let mut rng = self.rng_for(run);
        let mut out = Vec::with_capacity(values.len());
        self.resample_into(&mut rng, values, &mut out);
        out
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
    pub confidence: f64,
}

/// Percentile bootstrap interval of `stat` over `values`.
///
/// Fewer than two observations give a zero-width interval at 0.
pub fn bootstrap_ci<F>(
    values: &[f64],
    runs: usize,
    seed: u64,
    confidence: f64,
    stat: F,
) -> ConfidenceInterval
where
    F: Fn(&[f64]) -> f64 + Sync,
{
    if values.len() < 2 || runs == 0 {
        return ConfidenceInterval {
            lower: 0.0,
            upper: 0.0,
            confidence,
        };
    }
    let resampler = Resampler::new(seed);
    let mut stats: Vec<f64> = (0..runs)
        .into_par_iter()
        .map(|i| stat(&resampler.resample(i, values)))
        .filter(|v| v.is_finite())
        .collect();
    sort_f64(&mut stats);
    let alpha = (1.0 - confidence).clamp(0.0, 1.0);
    ConfidenceInterval {
        lower: percentile_sorted(&stats, alpha / 2.0),
        upper: percentile_sorted(&stats, 1.0 - alpha / 2.0),
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdk_schemas::stats::mean;

    #[test]
    fn same_run_index_gives_same_draws() {
        let r = Resampler::new(7);
        let values: Vec<f64> = (0..50).map(|i| i as f64).collect();
        assert_eq!(r.resample(3, &values), r.resample(3, &values));
        assert_ne!(r.resample(3, &values), r.resample(4, &values));
    }

    #[test]
    fn ci_brackets_the_mean() {
        let values: Vec<f64> = (0..200).map(|i| (i % 10) as f64).collect();
        let ci = bootstrap_ci(&values, 500, 1, 0.95, mean);
        assert!(ci.lower < 4.5 && ci.upper > 4.5, "{:?}", ci);
        assert_eq!(ci, bootstrap_ci(&values, 500, 1, 0.95, mean));
    }

    #[test]
    fn degenerate_input_gives_zero_interval() {
        let ci = bootstrap_ci(&[1.0], 100, 1, 0.95, mean);
        assert_eq!((ci.lower, ci.upper), (0.0, 0.0));
    }
}
