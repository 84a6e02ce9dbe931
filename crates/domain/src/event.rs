use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{ModelMetrics, StepRecord};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Run events
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Everything the event bus fans out to `/live/{run_id}` subscribers.
/// Tagged by `type` so a thin JS client can `switch` on it without a
/// second parse pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// Emitted the moment a run is registered, before any subscriber has connected.
    RunCreated { run_id: Uuid },
    /// Emitted once the late-subscriber handshake settles (see `EventBus::start_run`).
    ReadyToStart { run_id: Uuid },
    /// Orchestration has begun; mirrors the first line of `run_benchmark`.
    RunStart {
        run_id: Uuid,
        start_page: String,
        target_page: String,
        models: Vec<String>,
    },
    /// A model's turn has begun.
    ModelStart { run_id: Uuid, model: String },
    /// A step was recorded — success, hallucination, or 404 backtrack.
    Step {
        run_id: Uuid,
        model: String,
        step: Box<StepRecord>,
    },
    /// A hallucinated concept id was rejected; `retry` is the 1-based retry count.
    Hallucination {
        run_id: Uuid,
        model: String,
        page_title: String,
        retry: u32,
    },
    /// A model's turn ended before reaching a terminal state because the run was stopped.
    ModelStopped { run_id: Uuid, model: String },
    /// A model's turn has ended, terminal or not.
    ModelComplete {
        run_id: Uuid,
        model: String,
        metrics: Box<ModelMetrics>,
    },
    /// Emitted once per model immediately after `model_complete`, carrying the
    /// same metrics under the name clients historically polled for.
    ModelFinal {
        run_id: Uuid,
        model: String,
        metrics: Box<ModelMetrics>,
    },
    /// The whole run was cancelled via the run registry.
    RunStopped { run_id: Uuid },
    /// Every model in the roster has finished (successfully or not).
    RunCompleted { run_id: Uuid },
    /// Acknowledges a stop request before the orchestration loop observes it.
    StopRequested { run_id: Uuid },
    /// An unrecoverable error aborted the run.
    Error { run_id: Uuid, message: String },
}

impl RunEvent {
    pub fn run_id(&self) -> Uuid {
        match self {
            RunEvent::RunCreated { run_id }
            | RunEvent::ReadyToStart { run_id }
            | RunEvent::RunStart { run_id, .. }
            | RunEvent::ModelStart { run_id, .. }
            | RunEvent::Step { run_id, .. }
            | RunEvent::Hallucination { run_id, .. }
            | RunEvent::ModelStopped { run_id, .. }
            | RunEvent::ModelComplete { run_id, .. }
            | RunEvent::ModelFinal { run_id, .. }
            | RunEvent::RunStopped { run_id }
            | RunEvent::RunCompleted { run_id }
            | RunEvent::StopRequested { run_id }
            | RunEvent::Error { run_id, .. } => *run_id,
        }
    }
}
