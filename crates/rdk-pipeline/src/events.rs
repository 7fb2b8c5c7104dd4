//! Typed progress events. The pipeline only sends; whoever holds the
//! receiver decides how progress is shown.

use rdk_schemas::Phase;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PhaseEvent {
    PhaseStarted {
        run_id: Uuid,
        phase: Phase,
    },
    PhaseCompleted {
        run_id: Uuid,
        phase: Phase,
        elapsed_ms: u64,
    },
    PhaseFailed {
        run_id: Uuid,
        phase: Phase,
        reason: String,
    },
}

impl PhaseEvent {
    pub fn run_id(&self) -> Uuid {
        match self {
            PhaseEvent::PhaseStarted { run_id, .. }
            | PhaseEvent::PhaseCompleted { run_id, .. }
            | PhaseEvent::PhaseFailed { run_id, .. } => *run_id,
        }
    }

    pub fn phase(&self) -> Phase {
        match self {
            PhaseEvent::PhaseStarted { phase, .. }
            | PhaseEvent::PhaseCompleted { phase, .. }
            | PhaseEvent::PhaseFailed { phase, .. } => *phase,
        }
    }

    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            PhaseEvent::PhaseStarted { .. } => "phase_started",
            PhaseEvent::PhaseCompleted { .. } => "phase_completed",
            PhaseEvent::PhaseFailed { .. } => "phase_failed",
        }
    }
}

/// Sending half handed to a run. A dropped receiver is not an error.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<PhaseEvent>>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PhaseEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Discards every event.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn send(&self, event: PhaseEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
