//! Parameter sensitivity and stress analyses.
//!
//! GREEN when:
//! - A long strategy on a steady uptrend stays above the floor across its grid.
//! - The same strategy on a downtrend is flagged as not robust.
//! - A fully-sized position caught by a flash crash is ruined and breaches.
//! - The full simulator blends everything into a bounded score.

use rdk_backtest::{Harness, HarnessConfig, ParamSet, Signal, StrategyFactory};
use rdk_montecarlo::{
    run_sensitivity, run_stress, MonteCarloConfig, MonteCarloSimulator, SensitivityConfig,
    StrategyUnderTest, StressConfig, StressScenario,
};
use rdk_schemas::{Phase, PhaseGuard, Side, Timeframe};
use rdk_testkit::{linear_candles, trending_candles, PeriodicFactory, ScriptedFactory};

fn guard() -> PhaseGuard {
    PhaseGuard::detached(Phase::MonteCarlo)
}

fn floor() -> SensitivityConfig {
    SensitivityConfig {
        min_sharpe: 0.5,
        ..SensitivityConfig::default()
    }
}

#[test]
fn uptrend_long_is_robust_to_parameters() {
    let candles = trending_candles(2_000, Timeframe::H1, 100.0, 0.002, 0.004, 11);
    let factory = PeriodicFactory::new("periodic_long", Side::Long);
    let params = factory.default_params();
    let harness = Harness::default();
    let target = StrategyUnderTest {
        harness: &harness,
        factory: &factory,
        params: &params,
        candles: &candles,
    };

    let report = run_sensitivity(&target, &floor(), &guard()).unwrap();
    assert_eq!(report.tested_params, vec!["hold".to_string()]);
    assert!(!report.points.is_empty());
    assert!(report.points.iter().all(|p| p.error.is_none()));
    assert!(report.robust_to_parameters, "{:?}", report.worst_point);
}

#[test]
fn downtrend_long_is_not_robust_to_parameters() {
    let candles = trending_candles(2_000, Timeframe::H1, 100.0, -0.002, 0.004, 11);
    let factory = PeriodicFactory::new("periodic_long", Side::Long);
    let params = factory.default_params();
    let harness = Harness::default();
    let target = StrategyUnderTest {
        harness: &harness,
        factory: &factory,
        params: &params,
        candles: &candles,
    };

    let report = run_sensitivity(&target, &floor(), &guard()).unwrap();
    assert!(!report.robust_to_parameters);
    let worst = report.worst_point.unwrap();
    assert!(!worst.above_floor);
}

#[test]
fn flash_crash_ruins_fully_sized_position() {
    // Flat market; one long from the start with a 5% stop and full sizing.
    let candles = linear_candles(400, Timeframe::H1, 100.0, 0.0);
    let mut factory = ScriptedFactory::new("all_in", vec![(0, Signal::EnterLong)]);
    factory.position_fraction = 1.0;
    factory.stop_loss_pct = Some(0.05);
    let params = ParamSet::new();
    let harness = Harness::new(HarnessConfig::default());
    let target = StrategyUnderTest {
        harness: &harness,
        factory: &factory,
        params: &params,
        candles: &candles,
    };
    let gross = harness.run(&factory, &params, &candles).unwrap().trades;

    let config = StressConfig {
        flash_crash_drop: 0.6,
        ..StressConfig::default()
    };
    let report = run_stress(&target, &gross, &config, 0.5, &guard()).unwrap();

    assert_eq!(report.adverse_direction, Some(Side::Long));
    assert_eq!(report.scenarios.len(), 3);
    let crash = report
        .scenarios
        .iter()
        .find(|s| s.scenario == StressScenario::FlashCrash)
        .unwrap();
    assert!(crash.ruined && crash.breached, "{:?}", crash);
    assert!((crash.max_drawdown - 0.6).abs() < 0.01);
    assert!(!report.robust_to_stress);
}

#[test]
fn simulator_blends_analyses_into_bounded_score() {
    let candles = trending_candles(1_500, Timeframe::H1, 100.0, 0.002, 0.004, 5);
    let factory = PeriodicFactory::new("periodic_long", Side::Long);
    let params = factory.default_params();
    let harness = Harness::default();
    let report = harness.run(&factory, &params, &candles).unwrap();
    let returns = report.equity_curve.period_returns();

    let sim = MonteCarloSimulator::new(MonteCarloConfig::default());
    let target = StrategyUnderTest {
        harness: &harness,
        factory: &factory,
        params: &params,
        candles: &candles,
    };
    let agg = sim.run(&target, &returns, &report.trades, &guard()).unwrap();

    assert_eq!(agg.bootstrap.run_count, 1_000);
    assert!(agg.bootstrap.probability_of_profit > 0.9);
    assert!((0.0..=100.0).contains(&agg.robustness_score));
    assert!(agg.robustness_score > 50.0, "score={}", agg.robustness_score);
}
