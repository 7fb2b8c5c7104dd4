//! Risk-adjusted ratios over periodic returns and trade lists.
//!
//! Every ratio is exactly 0 when its denominator is 0. Ratios that are
//! unbounded when there are no losses are capped by the caller's limit.

use rdk_schemas::stats::{annualized_sharpe, mean, safe_div};
use rdk_schemas::Trade;

pub fn sharpe(excess: &[f64], periods_per_year: f64) -> f64 {
    annualized_sharpe(excess, periods_per_year)
}

/// Root mean square of the negative part of `excess`.
pub fn downside_deviation(excess: &[f64]) -> f64 {
    if excess.is_empty() {
        return 0.0;
    }
    let sq: f64 = excess.iter().map(|r| r.min(0.0).powi(2)).sum();
    (sq / excess.len() as f64).sqrt()
}

pub fn sortino(excess: &[f64], periods_per_year: f64) -> f64 {
    let dd = downside_deviation(excess);
    if dd == 0.0 {
        return 0.0;
    }
    safe_div(mean(excess), dd) * periods_per_year.max(0.0).sqrt()
}

pub fn calmar(annualized_return: f64, max_drawdown: f64) -> f64 {
    safe_div(annualized_return, max_drawdown)
}

/// Σ gains over `threshold` / Σ shortfalls below it. 0 without gains,
/// `cap` without shortfalls.
pub fn omega(returns: &[f64], threshold: f64, cap: f64) -> f64 {
    let gains: f64 = returns.iter().map(|r| (r - threshold).max(0.0)).sum();
    let losses: f64 = returns.iter().map(|r| (threshold - r).max(0.0)).sum();
    if gains <= 0.0 {
        0.0
    } else if losses <= 0.0 {
        cap
    } else {
        safe_div(gains, losses).min(cap)
    }
}

/// Gross profit / gross loss of closed trades. 0 without profits, `cap`
/// without losses.
pub fn profit_factor(trades: &[Trade], cap: f64) -> f64 {
    let profit: f64 = trades.iter().filter(|t| t.pnl > 0.0).map(|t| t.pnl).sum();
    let loss: f64 = trades.iter().filter(|t| t.pnl < 0.0).map(|t| -t.pnl).sum();
    if profit <= 0.0 {
        0.0
    } else if loss <= 0.0 {
        cap
    } else {
        safe_div(profit, loss).min(cap)
    }
}

/// `W − (1 − W) / R` clipped to [0, 1], with `R` the win/loss size ratio.
pub fn kelly(win_rate: f64, avg_win: f64, avg_loss: f64) -> f64 {
    let w = win_rate.clamp(0.0, 1.0);
    if w == 0.0 || avg_win <= 0.0 {
        return 0.0;
    }
    if avg_loss <= 0.0 {
        return w;
    }
    let k = w - (1.0 - w) / (avg_win / avg_loss);
    if k.is_finite() {
        k.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_denominators_give_zero() {
        assert_eq!(sharpe(&[0.01, 0.01, 0.01], 252.0), 0.0);
        assert_eq!(sortino(&[0.01, 0.02], 252.0), 0.0);
        assert_eq!(calmar(0.3, 0.0), 0.0);
        assert_eq!(omega(&[-0.01, -0.02], 0.0, 10.0), 0.0);
    }

    #[test]
    fn omega_caps_without_losses() {
        assert_eq!(omega(&[0.01, 0.02], 0.0, 10.0), 10.0);
        assert!((omega(&[0.02, -0.01], 0.0, 10.0) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn kelly_is_clipped() {
        assert_eq!(kelly(0.3, 1.0, 2.0), 0.0);
        assert_eq!(kelly(1.0, 1.0, 0.0), 1.0);
        assert_eq!(kelly(0.0, 0.0, 1.0), 0.0);
        assert!((kelly(0.6, 1.0, 1.0) - 0.2).abs() < 1e-12);
    }
}
