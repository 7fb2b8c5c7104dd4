//! Multi-market grid aggregation.
//!
//! GREEN when:
//! - 3 symbols × 2 timeframes with 4 passing cells give pass_rate 4/6.
//! - pass_rate = passed / tested and passed <= tested for every aggregate.
//! - A cell without data is kept as a failed cell with its reason.
//! - A bear-regime bucket that always fails raises an advisory warning.
//! - A cancelled phase dispatches no cells.

use rdk_backtest::{Harness, HarnessMetrics, StrategyFactory};
use rdk_markets::{
    grid, CellError, MarketCell, MarketTestResult, MarketsConfig, MultiMarketAggregate,
    MultiMarketTester, TrendRegime, VerdictThresholds,
};
use rdk_schemas::{Interrupted, Phase, PhaseGuard, RunControl, Side, Timeframe};
use rdk_testkit::{memory_source, trending_candles, PeriodicFactory};

fn metrics(sharpe: f64, dd: f64) -> HarnessMetrics {
    HarnessMetrics {
        sharpe,
        max_drawdown: dd,
        fitness: sharpe.max(0.0) * (1.0 - dd),
        trade_count: 20,
        ..HarnessMetrics::default()
    }
}

fn result(symbol: &str, tf: Timeframe, passed: bool) -> MarketTestResult {
    MarketTestResult {
        symbol: symbol.to_string(),
        timeframe: tf,
        candle_count: 500,
        regime: None,
        metrics: Some(if passed { metrics(1.5, 0.1) } else { metrics(0.2, 0.2) }),
        passed,
        failure_reasons: Vec::new(),
        error: None,
    }
}

#[test]
fn scenario_b_four_of_six_cells_pass() {
    let results = vec![
        result("BTC", Timeframe::H1, true),
        result("BTC", Timeframe::H4, true),
        result("ETH", Timeframe::H1, true),
        result("ETH", Timeframe::H4, false),
        result("SOL", Timeframe::H1, true),
        result("SOL", Timeframe::H4, false),
    ];
    let agg = MultiMarketAggregate::from_results(results, &VerdictThresholds::default());

    assert_eq!(agg.markets_tested, 6);
    assert_eq!(agg.markets_passed, 4);
    assert!((agg.pass_rate - 4.0 / 6.0).abs() < 1e-12);
    assert!((agg.pass_rate - 0.667).abs() < 1e-3);
    // mean sharpe (4×1.5 + 2×0.2)/6 ≈ 1.067, mean dd ≈ 0.133
    assert!(agg.verdict_passed, "{:?}", agg.verdict_reasons);
}

#[test]
fn verdict_lists_every_failed_criterion() {
    let results = vec![
        result("BTC", Timeframe::H1, true),
        result("ETH", Timeframe::H1, false),
        result("SOL", Timeframe::H1, false),
    ];
    let agg = MultiMarketAggregate::from_results(results, &VerdictThresholds::default());
    assert!(!agg.verdict_passed);
    assert_eq!(agg.verdict_reasons.len(), 2, "{:?}", agg.verdict_reasons);
    assert!(agg.verdict_reasons[0].starts_with("markets_passed 1 < 4"));
    assert!(agg.verdict_reasons[1].starts_with("pass_rate"));
}

#[test]
fn errored_cells_count_as_tested_but_not_in_means() {
    let missing = MarketCell::new("XRP", Timeframe::D1);
    let results = vec![
        result("BTC", Timeframe::H1, true),
        MarketTestResult::failed(&missing, CellError::DataUnavailable("no data".into())),
    ];
    let agg = MultiMarketAggregate::from_results(results, &VerdictThresholds::default());
    assert_eq!(agg.markets_tested, 2);
    assert_eq!(agg.markets_passed, 1);
    assert_eq!(agg.pass_rate, 0.5);
    assert!((agg.mean_sharpe - 1.5).abs() < 1e-12);
}

#[test]
fn harness_grid_end_to_end() {
    let symbols: Vec<String> = ["UP1", "UP2", "DOWN"].iter().map(|s| s.to_string()).collect();
    let timeframes = [Timeframe::H1, Timeframe::H4];
    let source = memory_source(&["UP1", "UP2", "DOWN"], &timeframes, |symbol, tf| {
        let drift = if symbol == "DOWN" { -0.002 } else { 0.002 };
        let seed = symbol.bytes().map(u64::from).sum::<u64>() + tf.secs() as u64;
        trending_candles(600, tf, 100.0, drift, 0.004, seed)
    })
    .unwrap();

    let mut cells = grid(&symbols, &timeframes);
    cells.push(MarketCell::new("MISSING", Timeframe::H1));

    let factory = PeriodicFactory::new("periodic_long", Side::Long);
    let params = factory.default_params();
    let tester = MultiMarketTester::new(MarketsConfig::default());
    let agg = tester
        .run(
            &Harness::default(),
            &factory,
            &params,
            &source,
            &cells,
            365,
            &PhaseGuard::detached(Phase::MultiMarket),
        )
        .unwrap();

    assert_eq!(agg.markets_tested, 7);
    assert_eq!(agg.markets_passed, 4, "{:#?}", agg.results);
    assert!(agg.markets_passed <= agg.markets_tested);
    assert!((agg.pass_rate - 4.0 / 7.0).abs() < 1e-12);

    let missing = agg.results.iter().find(|r| r.symbol == "MISSING").unwrap();
    assert!(!missing.passed);
    assert!(matches!(missing.error, Some(CellError::DataUnavailable(_))));
    assert_eq!(missing.failure_reasons.len(), 1);

    for r in agg.results.iter().filter(|r| r.symbol == "DOWN") {
        assert_eq!(r.regime.unwrap().trend, TrendRegime::Bear);
        assert!(!r.passed);
    }
    assert!(agg
        .concentration_warnings
        .iter()
        .any(|w| w.starts_with("regime bear/")));
}

#[test]
fn cancelled_phase_runs_no_cells() {
    let source = memory_source(&["UP1"], &[Timeframe::H1], |_, tf| {
        trending_candles(200, tf, 100.0, 0.001, 0.004, 1)
    })
    .unwrap();
    let ctl = RunControl::new();
    ctl.cancel();
    let factory = PeriodicFactory::new("periodic_long", Side::Long);
    let err = MultiMarketTester::default()
        .run(
            &Harness::default(),
            &factory,
            &factory.default_params(),
            &source,
            &[MarketCell::new("UP1", Timeframe::H1)],
            365,
            &ctl.guard(Phase::MultiMarket, None),
        )
        .unwrap_err();
    assert_eq!(
        err,
        Interrupted::Cancelled {
            phase: Phase::MultiMarket
        }
    );
}
