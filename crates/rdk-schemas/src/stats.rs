//! Deterministic statistics helpers.
//!
//! Every function returns a finite value for degenerate input (empty slices,
//! single observations, zero variance) instead of NaN.

pub fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Sample variance (n - 1 denominator). 0 for fewer than two observations
/// and exactly 0 for a constant sample.
pub fn variance(xs: &[f64]) -> f64 {
    if xs.len() < 2 || xs.iter().all(|x| *x == xs[0]) {
        return 0.0;
    }
    let m = mean(xs);
    xs.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / (xs.len() - 1) as f64
}

pub fn std_dev(xs: &[f64]) -> f64 {
    variance(xs).sqrt()
}

/// Percentile with linear interpolation between closest ranks; `q` in [0, 1].
pub fn percentile(xs: &[f64], q: f64) -> f64 {
    let mut sorted = xs.to_vec();
    sort_f64(&mut sorted);
    percentile_sorted(&sorted, q)
}

/// Same as [`percentile`] for an already ascending slice.
pub fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let q = q.clamp(0.0, 1.0);
            let rank = q * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            let frac = rank - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

pub fn median(xs: &[f64]) -> f64 {
    percentile(xs, 0.5)
}

/// Ascending sort with NaN treated as equal (NaN never reaches here in practice).
pub fn sort_f64(xs: &mut [f64]) {
    xs.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
}

/// `num / den`, 0 when the denominator is zero or the result is not finite.
pub fn safe_div(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        return 0.0;
    }
    let v = num / den;
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// Clamp into [0, 1]; NaN maps to 0.
pub fn clamp01(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

/// Clamp into the [0, 100] score range; NaN maps to 0.
pub fn clamp_score(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 100.0)
    }
}

/// Mean over sample standard deviation, scaled by `sqrt(periods_per_year)`.
/// 0 when the deviation is 0.
pub fn annualized_sharpe(returns: &[f64], periods_per_year: f64) -> f64 {
    let sd = std_dev(returns);
    if sd == 0.0 {
        return 0.0;
    }
    let v = mean(returns) / sd * periods_per_year.max(0.0).sqrt();
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// Natural-log returns of a price series; non-positive prices are skipped.
pub fn log_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .filter(|w| w[0] > 0.0 && w[1] > 0.0)
        .map(|w| (w[1] / w[0]).ln())
        .collect()
}

/// Least-squares slope of `ys` against their index.
pub fn ols_slope(ys: &[f64]) -> f64 {
    let n = ys.len();
    if n < 2 {
        return 0.0;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = mean(ys);
    let mut num = 0.0;
    let mut den = 0.0;
    for (i, y) in ys.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }
    safe_div(num, den)
}
