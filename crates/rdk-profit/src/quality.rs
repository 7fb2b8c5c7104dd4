use rdk_config::Violations;
use rdk_schemas::stats::{clamp01, clamp_score};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityLabel {
    Excellent,
    Good,
    Fair,
    Poor,
    Unacceptable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QualityWeights {
    pub annualized_return: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub calmar: f64,
    pub win_rate: f64,
    pub significance: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            annualized_return: 0.30,
            sharpe: 0.25,
            sortino: 0.15,
            calmar: 0.15,
            win_rate: 0.10,
            significance: 0.05,
        }
    }
}

/// Value at which each sub-term reaches 100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QualityNormalizers {
    pub annualized_return: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub calmar: f64,
    pub win_rate: f64,
}

impl Default for QualityNormalizers {
    fn default() -> Self {
        Self {
            annualized_return: 0.30,
            sharpe: 2.0,
            sortino: 3.0,
            calmar: 3.0,
            win_rate: 0.7,
        }
    }
}

/// Lower score bound of each label, descending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QualityBands {
    pub excellent: f64,
    pub good: f64,
    pub fair: f64,
    pub poor: f64,
}

impl Default for QualityBands {
    fn default() -> Self {
        Self {
            excellent: 80.0,
            good: 65.0,
            fair: 50.0,
            poor: 35.0,
        }
    }
}

impl QualityBands {
    pub fn label(&self, score: f64) -> QualityLabel {
        if score >= self.excellent {
            QualityLabel::Excellent
        } else if score >= self.good {
            QualityLabel::Good
        } else if score >= self.fair {
            QualityLabel::Fair
        } else if score >= self.poor {
            QualityLabel::Poor
        } else {
            QualityLabel::Unacceptable
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QualityConfig {
    pub weights: QualityWeights,
    pub normalizers: QualityNormalizers,
    pub bands: QualityBands,
}

impl QualityConfig {
    pub fn validate_into(&self, path: &str, v: &mut Violations) {
        let w = &self.weights;
        v.weights(
            &format!("{path}.weights"),
            &[
                ("annualized_return", w.annualized_return),
                ("sharpe", w.sharpe),
                ("sortino", w.sortino),
                ("calmar", w.calmar),
                ("win_rate", w.win_rate),
                ("significance", w.significance),
            ],
        );
        let n = &self.normalizers;
        v.positive(&format!("{path}.normalizers.annualized_return"), n.annualized_return);
        v.positive(&format!("{path}.normalizers.sharpe"), n.sharpe);
        v.positive(&format!("{path}.normalizers.sortino"), n.sortino);
        v.positive(&format!("{path}.normalizers.calmar"), n.calmar);
        v.open_fraction(&format!("{path}.normalizers.win_rate"), n.win_rate);

        let b = &self.bands;
        for (name, val) in [
            ("excellent", b.excellent),
            ("good", b.good),
            ("fair", b.fair),
            ("poor", b.poor),
        ] {
            v.score(&format!("{path}.bands.{name}"), val);
        }
        if !(b.excellent > b.good && b.good > b.fair && b.fair > b.poor) {
            v.push(
                &format!("{path}.bands"),
                "must be strictly descending (excellent > good > fair > poor)",
            );
        }
    }
}

pub(crate) struct QualityInputs {
    pub annualized_return: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub calmar: f64,
    pub win_rate: f64,
    pub significant: bool,
}

pub(crate) fn quality_score(inputs: &QualityInputs, cfg: &QualityConfig) -> f64 {
    let n = &cfg.normalizers;
    let w = &cfg.weights;
    let term = |value: f64, full: f64| 100.0 * clamp01(value / full);
    let bonus = if inputs.significant { 100.0 } else { 0.0 };
    clamp_score(
        w.annualized_return * term(inputs.annualized_return, n.annualized_return)
            + w.sharpe * term(inputs.sharpe, n.sharpe)
            + w.sortino * term(inputs.sortino, n.sortino)
            + w.calmar * term(inputs.calmar, n.calmar)
            + w.win_rate * term(inputs.win_rate, n.win_rate)
            + w.significance * bonus,
    )
}
