use rdk_markets::MultiMarketAggregate;
use rdk_montecarlo::MonteCarloAggregate;
use rdk_profit::ProfitReport;
use rdk_schemas::stats::clamp_score;
use rdk_schemas::Phase;
use rdk_walkforward::{Diagnosis, WalkForwardAggregate};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::{
    ComponentScores, Gate, GateCheck, GateMargin, ReadinessAssessment, ReadinessConfig,
    ReadinessStatus, ReadinessWarning, WarningSeverity,
};

// ============================================================================
// Input
// ============================================================================

/// A phase that failed or never produced a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseIssue {
    pub phase: Phase,
    pub reason: String,
}

/// Component outputs for one strategy. `None` means the phase produced
/// nothing, which fails the phases-completed gate.
#[derive(Debug, Clone, Copy)]
pub struct ReadinessInput<'a> {
    pub strategy_id: &'a str,
    pub markets: Option<&'a MultiMarketAggregate>,
    pub profit: Option<&'a ProfitReport>,
    pub walk_forward: Option<&'a WalkForwardAggregate>,
    pub monte_carlo: Option<&'a MonteCarloAggregate>,
    pub phase_issues: &'a [PhaseIssue],
}

// ============================================================================
// Public API
// ============================================================================

pub fn evaluate_readiness(config: &ReadinessConfig, input: &ReadinessInput<'_>) -> ReadinessAssessment {
    let component_scores = component_scores(input);
    let w = &config.weights;
    let readiness_score = clamp_score(
        w.markets * component_scores.markets
            + w.profit * component_scores.profit
            + w.walk_forward * component_scores.walk_forward
            + w.robustness * component_scores.robustness,
    );

    let gates = check_gates(config, input);
    let critical_failures: Vec<String> = gates
        .iter()
        .filter(|g| !g.passed())
        .map(|g| describe_failure(g, input))
        .collect();
    let warnings = collect_warnings(input);

    let has_soft = warnings.iter().any(|w| w.severity == WarningSeverity::Soft);
    let status = if !critical_failures.is_empty() {
        ReadinessStatus::Rejected
    } else if has_soft || readiness_score < config.status.conditional {
        ReadinessStatus::NeedsImprovement
    } else if readiness_score >= config.status.approved {
        ReadinessStatus::Approved
    } else {
        ReadinessStatus::Conditional
    };

    let max_observed_drawdown = max_observed_drawdown(input);
    let risk_level = config.risk.level(max_observed_drawdown);
    let recommendations = gates
        .iter()
        .map(|g| recommendation(g.gate, g.margin).to_string())
        .collect();

    info!(
        strategy_id = input.strategy_id,
        readiness_score,
        status = ?status,
        risk_level = ?risk_level,
        critical_failures = critical_failures.len(),
        "readiness assessed"
    );

    ReadinessAssessment {
        strategy_id: input.strategy_id.to_string(),
        component_scores,
        readiness_score,
        status,
        risk_level,
        max_observed_drawdown,
        sizing: config.sizing.for_level(risk_level),
        gates,
        critical_failures,
        warnings,
        recommendations,
    }
}

/// Each component mapped to 0–100. Missing components score 0.
pub fn component_scores(input: &ReadinessInput<'_>) -> ComponentScores {
    let markets = input.markets.map(|m| 100.0 * m.pass_rate).unwrap_or(0.0);
    let profit = input.profit.map(|p| p.net.quality_score).unwrap_or(0.0);
    let walk_forward = input
        .walk_forward
        .map(|wf| {
            let s = 100.0 - wf.overfitting_score;
            if wf.diagnosis == Diagnosis::NeverWorked {
                s.min(100.0 * wf.out_of_sample_pass_rate)
            } else {
                s
            }
        })
        .unwrap_or(0.0);
    let robustness = input.monte_carlo.map(|mc| mc.robustness_score).unwrap_or(0.0);
    ComponentScores {
        markets: clamp_score(markets),
        profit: clamp_score(profit),
        walk_forward: clamp_score(walk_forward),
        robustness: clamp_score(robustness),
    }
}

/// Largest drawdown any historical run showed: gross and net primary
/// curves, every market cell, every out-of-sample window.
pub fn max_observed_drawdown(input: &ReadinessInput<'_>) -> f64 {
    let mut dd = 0.0_f64;
    if let Some(p) = input.profit {
        dd = dd.max(p.gross.max_drawdown).max(p.net.max_drawdown);
    }
    if let Some(m) = input.markets {
        dd = dd.max(m.worst_drawdown);
    }
    if let Some(wf) = input.walk_forward {
        for p in &wf.periods {
            dd = dd.max(p.out_metrics.max_drawdown);
        }
    }
    dd
}

// ============================================================================
// Gates
// ============================================================================

fn at_least(value: f64, threshold: f64, band: f64) -> GateMargin {
    if value.is_nan() || value < threshold {
        GateMargin::Failed
    } else if value - threshold <= band * threshold.abs() {
        GateMargin::Marginal
    } else {
        GateMargin::Comfortable
    }
}

fn at_most(value: f64, threshold: f64, band: f64) -> GateMargin {
    if value.is_nan() || value > threshold {
        GateMargin::Failed
    } else if threshold - value <= band * threshold.abs() {
        GateMargin::Marginal
    } else {
        GateMargin::Comfortable
    }
}

fn flag(ok: bool) -> GateMargin {
    if ok {
        GateMargin::Comfortable
    } else {
        GateMargin::Failed
    }
}

fn check(gate: Gate, value: f64, threshold: f64, margin: GateMargin) -> GateCheck {
    GateCheck {
        gate,
        value,
        threshold,
        margin,
    }
}

/// Stable-ordered gate checks. Component gates are only checked when the
/// component produced a result; a missing result fails `PhasesCompleted`.
pub fn check_gates(config: &ReadinessConfig, input: &ReadinessInput<'_>) -> Vec<GateCheck> {
    let g = &config.gates;
    let band = config.marginal_band;
    let mut gates = Vec::with_capacity(7);

    let missing = [
        input.markets.is_none(),
        input.profit.is_none(),
        input.walk_forward.is_none(),
        input.monte_carlo.is_none(),
    ]
    .iter()
    .filter(|m| **m)
    .count();
    let incomplete = (missing + input.phase_issues.len()) as f64;
    gates.push(check(Gate::PhasesCompleted, incomplete, 0.0, flag(incomplete == 0.0)));

    if let Some(m) = input.markets {
        gates.push(check(
            Gate::MarketsPassed,
            m.markets_passed as f64,
            g.min_markets_passed as f64,
            at_least(m.markets_passed as f64, g.min_markets_passed as f64, band),
        ));
        if g.require_market_verdict {
            let ok = m.verdict_passed;
            gates.push(check(Gate::MarketVerdict, f64::from(u8::from(ok)), 1.0, flag(ok)));
        }
    }
    if let Some(wf) = input.walk_forward {
        gates.push(check(
            Gate::OverfittingScore,
            wf.overfitting_score,
            g.max_overfitting_score,
            at_most(wf.overfitting_score, g.max_overfitting_score, band),
        ));
    }
    if let Some(mc) = input.monte_carlo {
        let ruin = mc.probability_of_ruin();
        gates.push(check(
            Gate::ProbabilityOfRuin,
            ruin,
            g.max_probability_of_ruin,
            at_most(ruin, g.max_probability_of_ruin, band),
        ));
    }
    if let Some(p) = input.profit {
        gates.push(check(
            Gate::NetSharpe,
            p.net.sharpe,
            g.min_net_sharpe,
            at_least(p.net.sharpe, g.min_net_sharpe, band),
        ));
    }
    if input.profit.is_some() || input.markets.is_some() || input.walk_forward.is_some() {
        let dd = max_observed_drawdown(input);
        let margin = if dd >= g.max_drawdown {
            GateMargin::Failed
        } else {
            at_most(dd, g.max_drawdown, band)
        };
        gates.push(check(Gate::MaxDrawdown, dd, g.max_drawdown, margin));
    }
    gates
}

fn describe_failure(check: &GateCheck, input: &ReadinessInput<'_>) -> String {
    match check.gate {
        Gate::PhasesCompleted => {
            let mut parts: Vec<String> = input
                .phase_issues
                .iter()
                .map(|i| format!("{}: {}", i.phase, i.reason))
                .collect();
            for (absent, phase) in [
                (input.markets.is_none(), Phase::MultiMarket),
                (input.profit.is_none(), Phase::ProfitAnalysis),
                (input.walk_forward.is_none(), Phase::WalkForward),
                (input.monte_carlo.is_none(), Phase::MonteCarlo),
            ] {
                if absent && !input.phase_issues.iter().any(|i| i.phase == phase) {
                    parts.push(format!("{}: no result", phase));
                }
            }
            format!("Incomplete phases: {}", parts.join("; "))
        }
        Gate::MarketsPassed => format!(
            "Markets passed {} < min {}",
            check.value as usize, check.threshold as usize
        ),
        Gate::MarketVerdict => {
            let reasons = input
                .markets
                .map(|m| m.verdict_reasons.join("; "))
                .unwrap_or_default();
            format!("Multi-market verdict failed: {}", reasons)
        }
        Gate::OverfittingScore => format!(
            "Overfitting score {:.2} > max {:.2}",
            check.value, check.threshold
        ),
        Gate::ProbabilityOfRuin => format!(
            "Probability of ruin {:.4} > max {:.4}",
            check.value, check.threshold
        ),
        Gate::NetSharpe => format!(
            "Net Sharpe {:.4} < min {:.4}",
            check.value, check.threshold
        ),
        Gate::MaxDrawdown => format!(
            "Max drawdown {:.4} >= limit {:.4}",
            check.value, check.threshold
        ),
    }
}

// ============================================================================
// Warnings
// ============================================================================

fn soft(message: String) -> ReadinessWarning {
    ReadinessWarning {
        severity: WarningSeverity::Soft,
        message,
    }
}

fn advisory(message: String) -> ReadinessWarning {
    ReadinessWarning {
        severity: WarningSeverity::Advisory,
        message,
    }
}

fn collect_warnings(input: &ReadinessInput<'_>) -> Vec<ReadinessWarning> {
    let mut out = Vec::new();

    if let Some(wf) = input.walk_forward {
        if !wf.stable {
            out.push(soft(format!(
                "Walk-forward unstable: diagnosis {:?}, overfitting score {:.1}, out-of-sample pass rate {:.2}",
                wf.diagnosis, wf.overfitting_score, wf.out_of_sample_pass_rate
            )));
        }
    }
    if let Some(mc) = input.monte_carlo {
        if !mc.sensitivity.robust_to_parameters {
            let worst = mc
                .sensitivity
                .worst_point
                .as_ref()
                .map(|p| format!(" (worst: {}={:.4}, sharpe {:.3})", p.param, p.value, p.sharpe))
                .unwrap_or_default();
            out.push(soft(format!("Not robust to parameter perturbation{}", worst)));
        }
        if !mc.stress.robust_to_stress {
            let failed: Vec<String> = mc
                .stress
                .scenarios
                .iter()
                .filter(|s| !s.survived())
                .map(|s| format!("{:?}", s.scenario))
                .collect();
            out.push(soft(format!("Not robust to stress: {}", failed.join(", "))));
        }
    }

    if let Some(m) = input.markets {
        out.extend(m.concentration_warnings.iter().cloned().map(advisory));
    }
    if let Some(p) = input.profit {
        if !p.net.significant {
            out.push(advisory(format!(
                "Net returns not statistically significant (p = {:.4}, trades = {})",
                p.net.p_value, p.net.trade_count
            )));
        }
        if p.cost_drag.high_drag {
            out.push(advisory(format!(
                "High execution cost drag: {:.2}% per year",
                p.cost_drag.annualized_drag_pct
            )));
        }
    }
    out
}

// ============================================================================
// Recommendations
// ============================================================================

/// Fixed recommendation text per gate and margin.
pub fn recommendation(gate: Gate, margin: GateMargin) -> &'static str {
    use GateMargin::*;
    match (gate, margin) {
        (Gate::PhasesCompleted, Failed) => {
            "Re-run validation: one or more phases produced no result, so the assessment is partial."
        }
        (Gate::PhasesCompleted, _) => "All validation phases completed.",

        (Gate::MarketsPassed, Failed) => {
            "Strategy does not generalize: redesign or restrict it before testing on more markets."
        }
        (Gate::MarketsPassed, Marginal) => {
            "Market breadth is at the minimum: add symbols or timeframes to confirm generalization."
        }
        (Gate::MarketsPassed, Comfortable) => "Market breadth is comfortably above the minimum.",

        (Gate::MarketVerdict, Failed) => {
            "Cross-market aggregate fails its criteria: review per-cell failure reasons."
        }
        (Gate::MarketVerdict, _) => "Cross-market aggregate meets its criteria.",

        (Gate::OverfittingScore, Failed) => {
            "Likely overfit: reduce tunable parameters and re-validate on unseen data."
        }
        (Gate::OverfittingScore, Marginal) => {
            "Overfitting score is close to the limit: prefer simpler parameterizations."
        }
        (Gate::OverfittingScore, Comfortable) => "Out-of-sample behaviour tracks in-sample behaviour.",

        (Gate::ProbabilityOfRuin, Failed) => {
            "Ruin risk too high: cut position size or add a hard stop before deploying."
        }
        (Gate::ProbabilityOfRuin, Marginal) => {
            "Ruin risk is near the limit: deploy at reduced size and monitor drawdown daily."
        }
        (Gate::ProbabilityOfRuin, Comfortable) => "Simulated ruin risk is low.",

        (Gate::NetSharpe, Failed) => {
            "Net-of-cost Sharpe below minimum: lower trade frequency or target more liquid markets."
        }
        (Gate::NetSharpe, Marginal) => {
            "Net-of-cost Sharpe is marginal: execution costs could erase the edge."
        }
        (Gate::NetSharpe, Comfortable) => "Net-of-cost risk-adjusted return is healthy.",

        (Gate::MaxDrawdown, Failed) => {
            "Historical drawdown is extreme: not deployable at any size."
        }
        (Gate::MaxDrawdown, Marginal) => {
            "Historical drawdown is close to the limit: use the smallest sizing tier."
        }
        (Gate::MaxDrawdown, Comfortable) => "Historical drawdown is within limits.",
    }
}
