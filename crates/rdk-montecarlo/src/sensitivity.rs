use rayon::prelude::*;
use rdk_config::Violations;
use rdk_schemas::{Interrupted, PhaseGuard};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::StrategyUnderTest;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SensitivityConfig {
    /// Relative half-width of the grid, e.g. 0.3 for ±30%.
    pub perturbation: f64,
    /// Grid points per parameter (including both ends).
    pub steps: usize,
    /// Floor every grid point must clear.
    pub min_sharpe: f64,
    pub max_drawdown: f64,
}

impl Default for SensitivityConfig {
    fn default() -> Self {
        Self {
            perturbation: 0.3,
            steps: 5,
            min_sharpe: 0.0,
            max_drawdown: 0.5,
        }
    }
}

impl SensitivityConfig {
    pub fn validate_into(&self, path: &str, v: &mut Violations) {
        v.open_fraction(&format!("{path}.perturbation"), self.perturbation);
        v.at_least(&format!("{path}.steps"), self.steps, 2);
        v.finite(&format!("{path}.min_sharpe"), self.min_sharpe);
        v.open_fraction(&format!("{path}.max_drawdown"), self.max_drawdown);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityPoint {
    pub param: String,
    pub base_value: f64,
    pub value: f64,
    pub sharpe: f64,
    pub max_drawdown: f64,
    pub above_floor: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensitivityReport {
    pub tested_params: Vec<String>,
    pub points: Vec<SensitivityPoint>,
    /// True when every grid point clears the floor (vacuously with no tunables).
    pub robust_to_parameters: bool,
    /// Lowest-Sharpe point, failed points first.
    pub worst_point: Option<SensitivityPoint>,
}

/// Evenly spaced multipliers over `[1 − p, 1 + p]`.
fn grid(perturbation: f64, steps: usize) -> Vec<f64> {
    if steps < 2 {
        return vec![1.0];
    }
    (0..steps)
        .map(|k| 1.0 - perturbation + 2.0 * perturbation * k as f64 / (steps - 1) as f64)
        .collect()
}

/// Perturb each tunable parameter independently over the grid, holding the
/// others at their base values.
pub fn run_sensitivity(
    target: &StrategyUnderTest<'_>,
    config: &SensitivityConfig,
    guard: &PhaseGuard,
) -> Result<SensitivityReport, Interrupted> {
    let defaults = target.factory.default_params();
    let mut tested_params = Vec::new();
    let mut cells: Vec<(String, f64, f64)> = Vec::new();

    for range in target.factory.tunable_params() {
        let Some(base) = target.params.get(&range.name).or(defaults.get(&range.name)) else {
            continue;
        };
        let mut values: Vec<f64> = grid(config.perturbation, config.steps)
            .into_iter()
            .map(|m| range.clamp(base * m))
            .collect();
        values.dedup();
        tested_params.push(range.name.clone());
        cells.extend(values.into_iter().map(|v| (range.name.clone(), base, v)));
    }

    let points: Vec<SensitivityPoint> = cells
        .into_par_iter()
        .map(|(param, base_value, value)| {
            guard.checkpoint()?;
            let mut params = target.params.clone();
            params.set(param.clone(), value);
            Ok(
                match target
                    .harness
                    .run(target.factory, &params, target.candles)
                {
                    Ok(report) => {
                        let m = report.metrics;
                        SensitivityPoint {
                            param,
                            base_value,
                            value,
                            sharpe: m.sharpe,
                            max_drawdown: m.max_drawdown,
                            above_floor: m.sharpe >= config.min_sharpe
                                && m.max_drawdown <= config.max_drawdown,
                            error: None,
                        }
                    }
                    Err(e) => SensitivityPoint {
                        param,
                        base_value,
                        value,
                        sharpe: 0.0,
                        max_drawdown: 0.0,
                        above_floor: false,
                        error: Some(e.to_string()),
                    },
                },
            )
        })
        .collect::<Result<Vec<_>, Interrupted>>()?;

    let robust_to_parameters = points.iter().all(|p| p.above_floor);
    let worst_point = points
        .iter()
        .min_by(|a, b| {
            (a.above_floor, a.sharpe)
                .partial_cmp(&(b.above_floor, b.sharpe))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .cloned();

    debug!(
        params = tested_params.len(),
        points = points.len(),
        robust = robust_to_parameters,
        "parameter sensitivity complete"
    );

    Ok(SensitivityReport {
        tested_params,
        points,
        robust_to_parameters,
        worst_point,
    })
}
