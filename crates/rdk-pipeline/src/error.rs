use rdk_config::ConfigError;
use rdk_schemas::{Interrupted, Phase};
use serde::{Deserialize, Serialize};

/// Fatal pipeline errors. Raised before any harness call, or when the
/// worker runtime itself fails.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    ConfigurationInvalid(String),
    UnknownStrategy(String),
    /// Worker pool could not be built or a blocking task panicked.
    Runtime(String),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::ConfigurationInvalid(msg) => write!(f, "CONFIG_INVALID: {}", msg),
            PipelineError::UnknownStrategy(id) => {
                write!(f, "CONFIG_INVALID: unknown strategy_id '{}'", id)
            }
            PipelineError::Runtime(msg) => write!(f, "RUNTIME: {}", msg),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<ConfigError> for PipelineError {
    fn from(e: ConfigError) -> Self {
        PipelineError::ConfigurationInvalid(e.violations.join("; "))
    }
}

/// Why a single phase produced no result. Never fatal to the run, except
/// `Cancelled`, which stops every later phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PhaseFailure {
    DataUnavailable { reason: String },
    Harness { reason: String },
    PhaseTimeout { budget_ms: u64 },
    Cancelled,
}

impl PhaseFailure {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PhaseFailure::Cancelled)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, PhaseFailure::PhaseTimeout { .. })
    }

    /// Stage-qualified message for logs, events and readiness issues.
    pub fn describe(&self, phase: Phase) -> String {
        format!("{}: {}", phase, self)
    }
}

impl std::fmt::Display for PhaseFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhaseFailure::DataUnavailable { reason } => write!(f, "data unavailable: {}", reason),
            PhaseFailure::Harness { reason } => write!(f, "harness error: {}", reason),
            PhaseFailure::PhaseTimeout { budget_ms } => {
                write!(f, "exceeded time budget of {} ms", budget_ms)
            }
            PhaseFailure::Cancelled => f.write_str("cancelled by caller"),
        }
    }
}

impl From<Interrupted> for PhaseFailure {
    fn from(i: Interrupted) -> Self {
        match i {
            Interrupted::Cancelled { .. } => PhaseFailure::Cancelled,
            Interrupted::TimedOut { budget_ms, .. } => PhaseFailure::PhaseTimeout { budget_ms },
        }
    }
}
