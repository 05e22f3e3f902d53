//! Event types for the workflow run event bus.
//!
//! `WorkflowEvent` is broadcast while a run progresses. All variants are
//! Clone + Send + Sync for use with tokio broadcast channels.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events emitted during workflow execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// A run has started.
    RunStarted {
        run_id: Uuid,
        workflow_id: String,
        workflow_name: String,
        num_steps: usize,
    },

    /// A dependency level is about to be dispatched.
    LevelStarted {
        run_id: Uuid,
        /// 0-based level index.
        level: usize,
        step_ids: Vec<String>,
        parallel: bool,
    },

    /// A step was dispatched to its agent.
    StepStarted {
        run_id: Uuid,
        step_id: String,
        step_name: String,
        agent_type: String,
    },

    /// A step's condition evaluated false; its agent was not invoked.
    StepSkipped { run_id: Uuid, step_id: String },

    /// A step completed successfully.
    StepCompleted {
        run_id: Uuid,
        step_id: String,
        duration_ms: u64,
    },

    /// A step attempt failed.
    StepFailed {
        run_id: Uuid,
        step_id: String,
        error: String,
        will_retry: bool,
    },

    /// The run finished with `completed`.
    RunCompleted {
        run_id: Uuid,
        workflow_id: String,
        duration_ms: u64,
        steps_completed: usize,
    },

    /// The run finished with `failed`.
    RunFailed {
        run_id: Uuid,
        workflow_id: String,
        error: String,
    },
}

impl WorkflowEvent {
    /// The run this event belongs to.
    pub fn run_id(&self) -> Uuid {
        match self {
            WorkflowEvent::RunStarted { run_id, .. }
            | WorkflowEvent::LevelStarted { run_id, .. }
            | WorkflowEvent::StepStarted { run_id, .. }
            | WorkflowEvent::StepSkipped { run_id, .. }
            | WorkflowEvent::StepCompleted { run_id, .. }
            | WorkflowEvent::StepFailed { run_id, .. }
            | WorkflowEvent::RunCompleted { run_id, .. }
            | WorkflowEvent::RunFailed { run_id, .. } => *run_id,
        }
    }

    /// The step this event refers to, if any.
    pub fn step_id(&self) -> Option<&str> {
        match self {
            WorkflowEvent::StepStarted { step_id, .. }
            | WorkflowEvent::StepSkipped { step_id, .. }
            | WorkflowEvent::StepCompleted { step_id, .. }
            | WorkflowEvent::StepFailed { step_id, .. } => Some(step_id),
            WorkflowEvent::RunStarted { .. }
            | WorkflowEvent::LevelStarted { .. }
            | WorkflowEvent::RunCompleted { .. }
            | WorkflowEvent::RunFailed { .. } => None,
        }
    }

    /// Whether this event ends a run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowEvent::RunCompleted { .. } | WorkflowEvent::RunFailed { .. }
        )
    }
}
