//! Range validation for typed config sections.
//!
//! Each section pushes violations with its dotted path so one load reports
//! every problem at once.

/// Collected config violations. Empty means valid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Violations {
    items: Vec<String>,
}

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: &str, msg: impl AsRef<str>) {
        self.items.push(format!("{}: {}", path, msg.as_ref()));
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    /// Value must lie in [0, 1].
    pub fn fraction(&mut self, path: &str, v: f64) {
        if !(v.is_finite() && (0.0..=1.0).contains(&v)) {
            self.push(path, format!("must be within [0, 1], got {}", v));
        }
    }

    /// Value must lie strictly inside (0, 1).
    pub fn open_fraction(&mut self, path: &str, v: f64) {
        if !(v.is_finite() && v > 0.0 && v < 1.0) {
            self.push(path, format!("must be within (0, 1), got {}", v));
        }
    }

    pub fn positive(&mut self, path: &str, v: f64) {
        if !(v.is_finite() && v > 0.0) {
            self.push(path, format!("must be > 0, got {}", v));
        }
    }

    pub fn non_negative(&mut self, path: &str, v: f64) {
        if !(v.is_finite() && v >= 0.0) {
            self.push(path, format!("must be >= 0, got {}", v));
        }
    }

    pub fn finite(&mut self, path: &str, v: f64) {
        if !v.is_finite() {
            self.push(path, format!("must be finite, got {}", v));
        }
    }

    pub fn at_least(&mut self, path: &str, v: usize, min: usize) {
        if v < min {
            self.push(path, format!("must be >= {}, got {}", min, v));
        }
    }

    pub fn score(&mut self, path: &str, v: f64) {
        if !(v.is_finite() && (0.0..=100.0).contains(&v)) {
            self.push(path, format!("must be within [0, 100], got {}", v));
        }
    }

    /// Weights must be non-negative and sum to 1 (± 1e-6).
    pub fn weights(&mut self, path: &str, weights: &[(&str, f64)]) {
        let mut sum = 0.0;
        for (name, w) in weights {
            if !(w.is_finite() && *w >= 0.0) {
                self.push(&format!("{}.{}", path, name), format!("weight must be >= 0, got {}", w));
            }
            sum += w;
        }
        if (sum - 1.0).abs() > 1e-6 {
            self.push(path, format!("weights must sum to 1.0, got {:.6}", sum));
        }
    }

    pub fn into_result(self) -> Result<(), ConfigError> {
        if self.items.is_empty() {
            Ok(())
        } else {
            Err(ConfigError {
                violations: self.items,
            })
        }
    }
}

/// One or more invalid config values. Fatal: raised before any harness call.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError {
    pub violations: Vec<String>,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "CONFIG_INVALID: {} violation(s): {}",
            self.violations.len(),
            self.violations.join("; ")
        )
    }
}

impl std::error::Error for ConfigError {}
