//! Readiness scoring, gates and status.
//!
//! GREEN when:
//! - Strong components with every gate comfortable are Approved with Low risk.
//! - Breaking any single gate gives Rejected regardless of the blended score.
//! - Soft warnings cap the status at NeedsImprovement; advisory ones do not.
//! - Risk level follows max drawdown and maps to the sizing table.
//! - The assessment artifact round-trips through JSON.

use rdk_costs::CostDrag;
use rdk_markets::MultiMarketAggregate;
use rdk_montecarlo::{BootstrapAggregate, MonteCarloAggregate};
use rdk_profit::{equity_curve_for, ProfitAnalyzer, ProfitReport};
use rdk_readiness::{
    evaluate_readiness, recommendation, write_assessment_json, Gate, GateMargin, PhaseIssue,
    ReadinessAssessment, ReadinessConfig, ReadinessInput, ReadinessStatus, RiskBands, RiskLevel,
    WarningSeverity,
};
use rdk_schemas::Phase;
use rdk_testkit::{trades_from_pnls, BASE_TS};
use rdk_walkforward::{Diagnosis, WalkForwardAggregate, WindowMode};

struct Fixture {
    markets: MultiMarketAggregate,
    profit: ProfitReport,
    walk_forward: WalkForwardAggregate,
    monte_carlo: MonteCarloAggregate,
    issues: Vec<PhaseIssue>,
}

impl Fixture {
    fn strong() -> Self {
        let markets = MultiMarketAggregate {
            markets_tested: 6,
            markets_passed: 6,
            pass_rate: 1.0,
            mean_sharpe: 1.8,
            median_sharpe: 1.8,
            mean_drawdown: 0.06,
            worst_drawdown: 0.08,
            verdict_passed: true,
            ..MultiMarketAggregate::default()
        };

        let trades = trades_from_pnls(&[20.0; 40], 1_000.0);
        let end = trades.last().map(|t| t.exit_ts).unwrap_or(BASE_TS);
        let curve = equity_curve_for(10_000.0, BASE_TS, end, &trades);
        let mut metrics = ProfitAnalyzer::default().analyze(&trades, &curve, 365.0);
        metrics.sharpe = 2.0;
        metrics.quality_score = 95.0;
        metrics.max_drawdown = 0.08;
        metrics.significant = true;
        let profit = ProfitReport {
            gross: metrics.clone(),
            net: metrics,
            cost_drag: CostDrag::default(),
            return_lost_to_costs: 0.0,
        };

        let mut walk_forward = WalkForwardAggregate::insufficient(WindowMode::Rolling);
        walk_forward.overfitting_score = 10.0;
        walk_forward.out_of_sample_pass_rate = 1.0;
        walk_forward.in_sample_pass_rate = 1.0;
        walk_forward.diagnosis = Diagnosis::Robust;
        walk_forward.stable = true;

        let mut monte_carlo = MonteCarloAggregate {
            bootstrap: BootstrapAggregate {
                probability_of_profit: 0.97,
                probability_of_ruin: 0.0,
                ..BootstrapAggregate::default()
            },
            robustness_score: 95.0,
            ..MonteCarloAggregate::default()
        };
        monte_carlo.sensitivity.robust_to_parameters = true;
        monte_carlo.stress.robust_to_stress = true;

        Self {
            markets,
            profit,
            walk_forward,
            monte_carlo,
            issues: Vec::new(),
        }
    }

    fn assess(&self) -> ReadinessAssessment {
        self.assess_with(&ReadinessConfig::default())
    }

    fn assess_with(&self, config: &ReadinessConfig) -> ReadinessAssessment {
        evaluate_readiness(
            config,
            &ReadinessInput {
                strategy_id: "candidate",
                markets: Some(&self.markets),
                profit: Some(&self.profit),
                walk_forward: Some(&self.walk_forward),
                monte_carlo: Some(&self.monte_carlo),
                phase_issues: &self.issues,
            },
        )
    }
}

#[test]
fn strong_candidate_is_approved() {
    let a = Fixture::strong().assess();
    assert!(a.critical_failures.is_empty(), "{:?}", a.critical_failures);
    // 0.3×100 + 0.3×95 + 0.2×90 + 0.2×95
    assert!((a.readiness_score - 95.5).abs() < 1e-9);
    assert_eq!(a.status, ReadinessStatus::Approved);
    assert_eq!(a.risk_level, RiskLevel::Low);
    assert_eq!(a.sizing.position_size_pct, 5.0);

    let deploy = a.deployment_risk_config();
    assert!(deploy.deployable);
    assert_eq!(deploy.max_exposure_pct, 50.0);
    assert_eq!(deploy.daily_loss_limit_pct, 3.0);
}

#[test]
fn any_failed_gate_rejects_regardless_of_score() {
    type Breaker = fn(&mut Fixture);
    let breakers: [(Gate, Breaker); 7] = [
        (Gate::PhasesCompleted, |f| {
            f.issues.push(PhaseIssue {
                phase: Phase::WalkForward,
                reason: "exceeded time budget".into(),
            })
        }),
        (Gate::MarketsPassed, |f| f.markets.markets_passed = 3),
        (Gate::MarketVerdict, |f| {
            f.markets.verdict_passed = false;
            f.markets.verdict_reasons = vec!["mean_sharpe 0.1 < 0.5".into()];
        }),
        (Gate::OverfittingScore, |f| f.walk_forward.overfitting_score = 61.0),
        (Gate::ProbabilityOfRuin, |f| f.monte_carlo.bootstrap.probability_of_ruin = 0.2),
        (Gate::NetSharpe, |f| f.profit.net.sharpe = 0.1),
        (Gate::MaxDrawdown, |f| f.profit.net.max_drawdown = 0.6),
    ];

    for (gate, brk) in breakers {
        let mut f = Fixture::strong();
        brk(&mut f);
        let a = f.assess();
        assert_eq!(a.status, ReadinessStatus::Rejected, "{gate:?}");
        assert_eq!(a.critical_failures.len(), 1, "{gate:?}: {:?}", a.critical_failures);
        let check = a.gates.iter().find(|g| g.gate == gate).unwrap();
        assert_eq!(check.margin, GateMargin::Failed);
        assert!(a
            .recommendations
            .contains(&recommendation(gate, GateMargin::Failed).to_string()));
        assert!(!a.deployment_risk_config().deployable);
    }
}

#[test]
fn rejection_even_with_perfect_scores() {
    let mut f = Fixture::strong();
    f.profit.net.quality_score = 100.0;
    f.monte_carlo.robustness_score = 100.0;
    f.walk_forward.overfitting_score = 0.0;
    f.monte_carlo.bootstrap.probability_of_ruin = 0.06;
    let a = f.assess();
    assert_eq!(a.readiness_score, 100.0);
    assert_eq!(a.status, ReadinessStatus::Rejected);
    assert!(a.critical_failures[0].starts_with("Probability of ruin"));
}

#[test]
fn soft_warning_caps_status() {
    let mut f = Fixture::strong();
    f.walk_forward.stable = false;
    let a = f.assess();
    assert!(a.critical_failures.is_empty());
    assert!(a.readiness_score >= 85.0);
    assert_eq!(a.status, ReadinessStatus::NeedsImprovement);
    assert!(a.warnings.iter().any(|w| w.severity == WarningSeverity::Soft));

    let mut f = Fixture::strong();
    f.monte_carlo.stress.robust_to_stress = false;
    assert_eq!(f.assess().status, ReadinessStatus::NeedsImprovement);
}

#[test]
fn advisory_warnings_do_not_change_status() {
    let mut f = Fixture::strong();
    f.markets.concentration_warnings = vec!["regime bear/high_vol: 0/2 cells passed".into()];
    f.profit.net.significant = false;
    f.profit.cost_drag.high_drag = true;
    let a = f.assess();
    assert_eq!(a.status, ReadinessStatus::Approved);
    assert_eq!(a.warnings.len(), 3);
    assert!(a.warnings.iter().all(|w| w.severity == WarningSeverity::Advisory));
}

#[test]
fn conditional_band() {
    let mut f = Fixture::strong();
    f.profit.net.quality_score = 50.0;
    let a = f.assess();
    // 30 + 15 + 18 + 19
    assert!((a.readiness_score - 82.0).abs() < 1e-9);
    assert_eq!(a.status, ReadinessStatus::Conditional);
}

#[test]
fn never_worked_caps_walk_forward_component() {
    let mut f = Fixture::strong();
    f.walk_forward.diagnosis = Diagnosis::NeverWorked;
    f.walk_forward.overfitting_score = 15.0;
    f.walk_forward.out_of_sample_pass_rate = 0.0;
    let a = f.assess();
    assert_eq!(a.component_scores.walk_forward, 0.0);
}

#[test]
fn marginal_gate_gets_marginal_recommendation() {
    let mut f = Fixture::strong();
    f.markets.markets_passed = 4;
    let a = f.assess();
    let check = a.gates.iter().find(|g| g.gate == Gate::MarketsPassed).unwrap();
    assert_eq!(check.margin, GateMargin::Marginal);
    assert!(a
        .recommendations
        .contains(&recommendation(Gate::MarketsPassed, GateMargin::Marginal).to_string()));
}

#[test]
fn risk_level_bands_and_sizing() {
    let bands = RiskBands::default();
    assert_eq!(bands.level(0.149), RiskLevel::Low);
    assert_eq!(bands.level(0.15), RiskLevel::Medium);
    assert_eq!(bands.level(0.3), RiskLevel::High);
    assert_eq!(bands.level(0.5), RiskLevel::Extreme);

    let mut f = Fixture::strong();
    f.markets.worst_drawdown = 0.35;
    let a = f.assess();
    assert_eq!(a.risk_level, RiskLevel::High);
    assert_eq!(a.sizing.position_size_pct, 1.5);
    assert_eq!(a.sizing.max_exposure_pct, 15.0);
    assert_eq!(a.sizing.daily_loss_limit_pct, 1.0);
}

#[test]
fn assessment_artifact_round_trips() {
    let a = Fixture::strong().assess();
    let dir = tempfile::tempdir().unwrap();
    let path = write_assessment_json(dir.path(), &a).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("\"status\": \"APPROVED\""));
    let back: ReadinessAssessment = serde_json::from_str(&text).unwrap();
    assert_eq!(back, a);
}

#[test]
fn assessment_write_failure_names_the_path() {
    let a = Fixture::strong().assess();
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not_a_dir");
    std::fs::write(&blocker, "x").unwrap();

    let err = write_assessment_json(&blocker, &a).unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("create assessment dir failed"), "{msg}");
    assert!(msg.contains("not_a_dir"), "{msg}");
}
