use rayon::prelude::*;
use rdk_config::Violations;
use rdk_schemas::stats::{mean, median, percentile_sorted, safe_div, sort_f64, std_dev};
use rdk_schemas::{Interrupted, PhaseGuard};
use serde::{Deserialize, Serialize};

use crate::resample::Resampler;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BootstrapConfig {
    pub runs: usize,
    pub seed: u64,
    /// A run is ruined once its running drawdown exceeds this fraction.
    pub ruin_threshold: f64,
    pub confidence: f64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            runs: 1_000,
            seed: 42,
            ruin_threshold: 0.5,
            confidence: 0.95,
        }
    }
}

impl BootstrapConfig {
    pub fn validate_into(&self, path: &str, v: &mut Violations) {
        v.at_least(&format!("{path}.runs"), self.runs, 1);
        v.open_fraction(&format!("{path}.ruin_threshold"), self.ruin_threshold);
        v.open_fraction(&format!("{path}.confidence"), self.confidence);
    }
}

/// Outcome of one resampled path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloRun {
    pub run_index: usize,
    pub terminal_return: f64,
    pub max_drawdown: f64,
    pub ruined: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BootstrapAggregate {
    pub run_count: usize,
    pub sample_size: usize,
    pub mean_return: f64,
    pub median_return: f64,
    pub std_return: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub probability_of_profit: f64,
    pub probability_of_ruin: f64,
    /// 5th percentile of terminal returns.
    pub var_95: f64,
    /// Mean of terminal returns at or below `var_95`.
    pub cvar_95: f64,
    pub mean_max_drawdown: f64,
    pub runs: Vec<MonteCarloRun>,
}

/// Compound one path of per-trade returns from equity 1.0.
fn simulate_path(run_index: usize, returns: &[f64], ruin_threshold: f64) -> MonteCarloRun {
    let mut equity = 1.0_f64;
    let mut peak = 1.0_f64;
    let mut max_dd = 0.0_f64;
    for r in returns {
        equity *= 1.0 + r;
        if equity <= 0.0 {
            equity = 0.0;
            max_dd = 1.0;
            break;
        }
        peak = peak.max(equity);
        max_dd = max_dd.max((peak - equity) / peak);
    }
    MonteCarloRun {
        run_index,
        terminal_return: equity - 1.0,
        max_drawdown: max_dd,
        ruined: max_dd > ruin_threshold,
    }
}

/// Resample `returns` with replacement `config.runs` times.
///
/// Empty input yields the neutral zero aggregate. Each run checks `guard`
/// before it starts.
pub fn run_bootstrap(
    returns: &[f64],
    config: &BootstrapConfig,
    guard: &PhaseGuard,
) -> Result<BootstrapAggregate, Interrupted> {
    if returns.is_empty() || config.runs == 0 {
        return Ok(BootstrapAggregate::default());
    }
    let resampler = Resampler::new(config.seed);

    let runs: Vec<MonteCarloRun> = (0..config.runs)
        .into_par_iter()
        .map(|i| {
            guard.checkpoint()?;
            let path = resampler.resample(i, returns);
            Ok(simulate_path(i, &path, config.ruin_threshold))
        })
        .collect::<Result<Vec<_>, Interrupted>>()?;

    Ok(aggregate(returns.len(), runs, config.confidence))
}

fn aggregate(sample_size: usize, runs: Vec<MonteCarloRun>, confidence: f64) -> BootstrapAggregate {
    let n = runs.len() as f64;
    let terminal: Vec<f64> = runs.iter().map(|r| r.terminal_return).collect();
    let mut sorted = terminal.clone();
    sort_f64(&mut sorted);

    let alpha = 1.0 - confidence;
    let var_95 = percentile_sorted(&sorted, 0.05);
    let tail: Vec<f64> = sorted.iter().copied().filter(|r| *r <= var_95).collect();
    let drawdowns: Vec<f64> = runs.iter().map(|r| r.max_drawdown).collect();

    BootstrapAggregate {
        run_count: runs.len(),
        sample_size,
        mean_return: mean(&terminal),
        median_return: median(&terminal),
        std_return: std_dev(&terminal),
        ci_lower: percentile_sorted(&sorted, alpha / 2.0),
        ci_upper: percentile_sorted(&sorted, 1.0 - alpha / 2.0),
        probability_of_profit: safe_div(
            terminal.iter().filter(|r| **r > 0.0).count() as f64,
            n,
        ),
        probability_of_ruin: safe_div(runs.iter().filter(|r| r.ruined).count() as f64, n),
        var_95,
        cvar_95: if tail.is_empty() { var_95 } else { mean(&tail) },
        mean_max_drawdown: mean(&drawdowns),
        runs,
    }
}
