//! Bootstrap Monte Carlo outcomes.
//!
//! GREEN when:
//! - Identical returns r give probability_of_profit 1 if r > 0 else 0.
//! - A 60% win-rate, positive-expectancy, small-sized strategy has
//!   probability_of_profit > 0.5 and probability_of_ruin near 0.
//! - Results do not depend on the worker count.
//! - A cancelled run stops with `Interrupted::Cancelled`.

use rdk_montecarlo::{run_bootstrap, BootstrapConfig};
use rdk_schemas::{Interrupted, Phase, PhaseGuard, RunControl};

fn cfg(runs: usize) -> BootstrapConfig {
    BootstrapConfig {
        runs,
        ..BootstrapConfig::default()
    }
}

fn guard() -> PhaseGuard {
    PhaseGuard::detached(Phase::MonteCarlo)
}

#[test]
fn identical_positive_returns_always_profit() {
    let agg = run_bootstrap(&[0.01; 40], &cfg(200), &guard()).unwrap();
    assert_eq!(agg.probability_of_profit, 1.0);
    assert_eq!(agg.probability_of_ruin, 0.0);
    assert_eq!(agg.run_count, 200);
    assert!((agg.std_return).abs() < 1e-12);
}

#[test]
fn identical_negative_or_zero_returns_never_profit() {
    let neg = run_bootstrap(&[-0.01; 40], &cfg(200), &guard()).unwrap();
    assert_eq!(neg.probability_of_profit, 0.0);
    let zero = run_bootstrap(&[0.0; 40], &cfg(200), &guard()).unwrap();
    assert_eq!(zero.probability_of_profit, 0.0);
}

#[test]
fn sixty_percent_winner_with_small_size_is_safe() {
    // 60 wins of +1%, 40 losses of -0.8%: positive expectancy, small sizing.
    let mut returns = vec![0.01; 60];
    returns.extend(vec![-0.008; 40]);
    let agg = run_bootstrap(&returns, &cfg(1_000), &guard()).unwrap();

    assert_eq!(agg.run_count, 1_000);
    assert_eq!(agg.sample_size, 100);
    assert!(agg.probability_of_profit > 0.5, "p={}", agg.probability_of_profit);
    assert!(agg.probability_of_ruin < 0.01, "ruin={}", agg.probability_of_ruin);
    assert!(agg.cvar_95 <= agg.var_95);
    assert!(agg.ci_lower <= agg.median_return && agg.median_return <= agg.ci_upper);
}

#[test]
fn results_do_not_depend_on_worker_count() {
    let returns: Vec<f64> = (0..80).map(|i| ((i * 37) % 11) as f64 / 100.0 - 0.05).collect();
    let one = rayon::ThreadPoolBuilder::new()
        .num_threads(1)
        .build()
        .unwrap()
        .install(|| run_bootstrap(&returns, &cfg(300), &guard()).unwrap());
    let four = rayon::ThreadPoolBuilder::new()
        .num_threads(4)
        .build()
        .unwrap()
        .install(|| run_bootstrap(&returns, &cfg(300), &guard()).unwrap());
    assert_eq!(one, four);
}

#[test]
fn cancelled_run_stops() {
    let ctl = RunControl::new();
    let guard = ctl.guard(Phase::MonteCarlo, None);
    ctl.cancel();
    let err = run_bootstrap(&[0.01, -0.01], &cfg(100), &guard).unwrap_err();
    assert_eq!(
        err,
        Interrupted::Cancelled {
            phase: Phase::MonteCarlo
        }
    );
}
