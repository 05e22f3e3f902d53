//! Workflow domain types for agentflow.
//!
//! A `Workflow` is built once and reused across many executions. Each
//! execution produces a fresh `WorkflowResult` holding one `StepResult` per
//! step that ran. Timeouts are serialized as floating point seconds.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::agent::{AgentKind, AgentSpec};

// ---------------------------------------------------------------------------
// Workflow definition
// ---------------------------------------------------------------------------

/// A complete workflow: configuration plus an ordered list of steps.
///
/// Step order is not an execution-order guarantee; only `depends_on`
/// determines when a step may run. The order does decide which step's output
/// becomes the run's `final_output` (the last one).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    /// Unique workflow identifier.
    pub id: String,
    /// Workflow-level configuration and failure policy.
    pub config: WorkflowConfig,
    /// Step definitions forming the dependency graph.
    pub steps: Vec<WorkflowStep>,
    /// When the definition was created.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Workflow {
    /// Look up a step by ID.
    pub fn step(&self, step_id: &str) -> Option<&WorkflowStep> {
        self.steps.iter().find(|s| s.id == step_id)
    }

    /// ID of the last step in definition order.
    pub fn last_step_id(&self) -> Option<&str> {
        self.steps.last().map(|s| s.id.as_str())
    }
}

/// Workflow-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Human-readable workflow name.
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Additional attempts granted to steps with `retry_on_failure`.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Whole-workflow timeout. `None` falls back to the engine default.
    #[serde(
        default,
        with = "optional_secs",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout: Option<Duration>,
    /// Allow steps of the same dependency level to run concurrently.
    #[serde(default)]
    pub parallel_execution: bool,
    /// What to do once a step has failed.
    #[serde(default)]
    pub on_failure: FailurePolicy,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

fn default_max_retries() -> u32 {
    3
}

impl WorkflowConfig {
    /// Configuration with defaults for everything but the name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            max_retries: default_max_retries(),
            timeout: None,
            parallel_execution: false,
            on_failure: FailurePolicy::default(),
            metadata: HashMap::new(),
        }
    }
}

/// Behaviour after a step reports `failed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Fail the run and skip all remaining levels.
    #[default]
    Stop,
    /// Keep executing; downstream templates see a missing upstream output.
    Continue,
    /// Invoke the rollback hook, then fail the run.
    Rollback,
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailurePolicy::Stop => "stop",
            FailurePolicy::Continue => "continue",
            FailurePolicy::Rollback => "rollback",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Step definition
// ---------------------------------------------------------------------------

/// A single node of the workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// Unique within the workflow.
    pub id: String,
    pub name: String,
    /// Which agent executes this step, with its typed configuration.
    pub agent: AgentSpec,
    /// Input name -> literal value or `{{ path }}` template.
    #[serde(default)]
    pub inputs: HashMap<String, Value>,
    /// Step IDs that must have finished before this step starts.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Optional predicate gating execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<StepCondition>,
    /// Per-step timeout. `None` falls back to the engine default.
    #[serde(
        default,
        with = "optional_secs",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub retry_on_failure: bool,
}

impl WorkflowStep {
    /// Discriminator of the bound agent.
    pub fn agent_kind(&self) -> AgentKind {
        self.agent.kind()
    }
}

/// A comparison predicate evaluated against the execution context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepCondition {
    /// Dot-path into the context (same rules as input templates).
    pub field: String,
    #[serde(default)]
    pub operator: ConditionOperator,
    /// Literal to compare against.
    pub value: Value,
}

impl StepCondition {
    pub fn new(field: impl Into<String>, operator: ConditionOperator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }
}

/// Comparison operator of a `StepCondition`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    #[default]
    Equals,
    NotEquals,
    Contains,
    GreaterThan,
    LessThan,
    /// Any operator name this engine does not know. Always evaluates to false.
    #[serde(other)]
    Unsupported,
}

// ---------------------------------------------------------------------------
// Execution results
// ---------------------------------------------------------------------------

/// Terminal status of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    Failed,
}

/// Status of a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Running,
    Completed,
    Failed,
}

impl WorkflowStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WorkflowStatus::Running)
    }
}

/// Outcome of one step execution.
///
/// `output` is present only on success, `error` only on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub execution_time_secs: f64,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

impl StepResult {
    /// A successful result carrying the agent's output.
    pub fn completed(step_id: impl Into<String>, output: Value) -> Self {
        Self {
            step_id: step_id.into(),
            status: StepStatus::Completed,
            output: Some(output),
            error: None,
            execution_time_secs: 0.0,
            metadata: HashMap::new(),
        }
    }

    /// A failed result with a human-readable error.
    pub fn failed(step_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            status: StepStatus::Failed,
            output: None,
            error: Some(error.into()),
            execution_time_secs: 0.0,
            metadata: HashMap::new(),
        }
    }

    /// A completed result for a step whose condition was not met.
    pub fn skipped(step_id: impl Into<String>) -> Self {
        Self::completed(
            step_id,
            json!({ "skipped": true, "reason": "condition_not_met" }),
        )
    }

    pub fn with_execution_time(mut self, secs: f64) -> Self {
        self.execution_time_secs = secs;
        self
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, Value>) -> Self {
        self.metadata.extend(metadata);
        self
    }

    pub fn is_failed(&self) -> bool {
        self.status == StepStatus::Failed
    }

    /// Whether this result was produced by a false condition.
    pub fn is_skipped(&self) -> bool {
        self.status == StepStatus::Completed
            && self
                .output
                .as_ref()
                .and_then(|o| o.get("skipped"))
                .and_then(Value::as_bool)
                .unwrap_or(false)
    }
}

/// Accumulated outcome of one workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowResult {
    /// Identifier of this particular execution.
    pub run_id: Uuid,
    pub workflow_id: String,
    pub status: WorkflowStatus,
    /// Results keyed by step ID, filled in as levels finish.
    #[serde(default)]
    pub step_results: HashMap<String, StepResult>,
    /// Output of the last step in definition order (completed runs only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub total_execution_time_secs: f64,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkflowResult {
    /// A fresh result in the `running` state.
    pub fn running(run_id: Uuid, workflow_id: impl Into<String>) -> Self {
        Self {
            run_id,
            workflow_id: workflow_id.into(),
            status: WorkflowStatus::Running,
            step_results: HashMap::new(),
            final_output: None,
            error: None,
            total_execution_time_secs: 0.0,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Transition to `failed`, keeping the first recorded cause.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = WorkflowStatus::Failed;
        if self.error.is_none() {
            self.error = Some(error.into());
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == WorkflowStatus::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.status == WorkflowStatus::Failed
    }
}

// ---------------------------------------------------------------------------
// Serde helper: Option<Duration> as floating point seconds
// ---------------------------------------------------------------------------

pub mod optional_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_f64(d.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        let secs = Option::<f64>::deserialize(deserializer)?;
        let Some(s) = secs else {
            return Ok(None);
        };
        Duration::try_from_secs_f64(s).map(Some).map_err(|e| {
            serde::de::Error::custom(format!("invalid timeout of {s} seconds: {e}"))
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
