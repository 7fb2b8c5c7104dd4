use rdk_schemas::stats::{mean, std_dev};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TTest {
    pub sample_size: usize,
    pub t_stat: f64,
    pub p_value: f64,
}

impl TTest {
    fn degenerate(sample_size: usize) -> Self {
        Self {
            sample_size,
            t_stat: 0.0,
            p_value: 1.0,
        }
    }
}

/// Two-sided one-sample t-test of `sample` against a zero mean.
///
/// Fewer than two observations or zero spread give t = 0, p = 1.
pub fn t_test_zero_mean(sample: &[f64]) -> TTest {
    let n = sample.len();
    if n < 2 {
        return TTest::degenerate(n);
    }
    let s = std_dev(sample);
    if s <= 0.0 || !s.is_finite() {
        return TTest::degenerate(n);
    }
    let t = mean(sample) / (s / (n as f64).sqrt());
    if !t.is_finite() {
        return TTest::degenerate(n);
    }
    let Ok(dist) = StudentsT::new(0.0, 1.0, (n - 1) as f64) else {
        return TTest::degenerate(n);
    };
    let p = (2.0 * (1.0 - dist.cdf(t.abs()))).clamp(0.0, 1.0);
    TTest {
        sample_size: n,
        t_stat: t,
        p_value: p,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_samples() {
        assert_eq!(t_test_zero_mean(&[]).p_value, 1.0);
        assert_eq!(t_test_zero_mean(&[0.5]).t_stat, 0.0);
        let flat = t_test_zero_mean(&[0.01; 50]);
        assert_eq!(flat.t_stat, 0.0);
        assert_eq!(flat.p_value, 1.0);
    }

    #[test]
    fn symmetric_sample_is_not_significant() {
        let r = t_test_zero_mean(&[0.01, -0.01, 0.02, -0.02]);
        assert!(r.t_stat.abs() < 1e-12);
        assert!((r.p_value - 1.0).abs() < 1e-9);
    }

    #[test]
    fn strong_positive_mean_is_significant() {
        let sample: Vec<f64> = (0..40).map(|i| 0.01 + (i % 3) as f64 * 0.001).collect();
        let r = t_test_zero_mean(&sample);
        assert!(r.t_stat > 10.0);
        assert!(r.p_value < 1e-6);
    }
}
