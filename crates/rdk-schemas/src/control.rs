//! Run-scoped cancellation and per-phase deadlines.
//!
//! Work units (market cells, walk-forward windows, simulations) call
//! [`PhaseGuard::checkpoint`] before starting. In-flight harness calls are not
//! interrupted; the guard only stops further units from being dispatched.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Pipeline phases in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    MultiMarket,
    PrimaryBacktest,
    ExecutionCost,
    ProfitAnalysis,
    WalkForward,
    MonteCarlo,
    Readiness,
}

impl Phase {
    pub const ALL: [Phase; 7] = [
        Phase::MultiMarket,
        Phase::PrimaryBacktest,
        Phase::ExecutionCost,
        Phase::ProfitAnalysis,
        Phase::WalkForward,
        Phase::MonteCarlo,
        Phase::Readiness,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::MultiMarket => "multi_market",
            Phase::PrimaryBacktest => "primary_backtest",
            Phase::ExecutionCost => "execution_cost",
            Phase::ProfitAnalysis => "profit_analysis",
            Phase::WalkForward => "walk_forward",
            Phase::MonteCarlo => "monte_carlo",
            Phase::Readiness => "readiness",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a phase stopped dispatching work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Interrupted {
    Cancelled { phase: Phase },
    TimedOut { phase: Phase, budget_ms: u64 },
}

impl Interrupted {
    pub fn phase(&self) -> Phase {
        match self {
            Interrupted::Cancelled { phase } | Interrupted::TimedOut { phase, .. } => *phase,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Interrupted::Cancelled { .. })
    }
}

impl std::fmt::Display for Interrupted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Interrupted::Cancelled { phase } => write!(f, "{}: cancelled by caller", phase),
            Interrupted::TimedOut { phase, budget_ms } => {
                write!(f, "{}: exceeded time budget of {} ms", phase, budget_ms)
            }
        }
    }
}

impl std::error::Error for Interrupted {}

// ---------------------------------------------------------------------------
// RunControl
// ---------------------------------------------------------------------------

/// Cloneable cancellation handle shared by the caller and one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    cancelled: Arc<AtomicBool>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Start a phase. `budget = None` means no deadline.
    pub fn guard(&self, phase: Phase, budget: Option<Duration>) -> PhaseGuard {
        PhaseGuard {
            phase,
            cancelled: Arc::clone(&self.cancelled),
            deadline: budget.map(|b| (Instant::now() + b, b)),
        }
    }
}

// ---------------------------------------------------------------------------
// PhaseGuard
// ---------------------------------------------------------------------------

/// Per-phase view of the run control plus an optional deadline.
#[derive(Debug, Clone)]
pub struct PhaseGuard {
    phase: Phase,
    cancelled: Arc<AtomicBool>,
    deadline: Option<(Instant, Duration)>,
}

impl PhaseGuard {
    /// A guard with its own never-cancelled flag and no deadline, for direct
    /// component use outside a pipeline run.
    pub fn detached(phase: Phase) -> Self {
        RunControl::new().guard(phase, None)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Ok when the next unit of work may start.
    pub fn checkpoint(&self) -> Result<(), Interrupted> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(Interrupted::Cancelled { phase: self.phase });
        }
        if let Some((deadline, budget)) = self.deadline {
            if Instant::now() >= deadline {
                return Err(Interrupted::TimedOut {
                    phase: self.phase,
                    budget_ms: budget.as_millis() as u64,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_observed_by_existing_guards() {
        let ctl = RunControl::new();
        let guard = ctl.guard(Phase::MonteCarlo, None);
        assert!(guard.checkpoint().is_ok());
        ctl.cancel();
        assert_eq!(
            guard.checkpoint(),
            Err(Interrupted::Cancelled {
                phase: Phase::MonteCarlo
            })
        );
    }

    #[test]
    fn zero_budget_times_out_immediately() {
        let ctl = RunControl::new();
        let guard = ctl.guard(Phase::WalkForward, Some(Duration::ZERO));
        assert!(matches!(
            guard.checkpoint(),
            Err(Interrupted::TimedOut {
                phase: Phase::WalkForward,
                ..
            })
        ));
    }
}
