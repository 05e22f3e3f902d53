//! Fluent construction of `Workflow` values.
//!
//! ```
//! use agentflow_core::workflow::{StepBuilder, WorkflowBuilder};
//! use agentflow_types::agent::{AgentSpec, TaskAgentConfig};
//! use serde_json::json;
//!
//! let workflow = WorkflowBuilder::new("report")
//!     .parallel_execution(true)
//!     .add_step(
//!         StepBuilder::new("Fetch", AgentSpec::Task(TaskAgentConfig::new("fetch", "http")))
//!             .id("fetch")
//!             .input("url", json!("{{ source }}")),
//!     )
//!     .then(StepBuilder::new(
//!         "Summarize",
//!         AgentSpec::Task(TaskAgentConfig::new("summarize", "llm")),
//!     ))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(workflow.steps[1].id, "step_2");
//! assert_eq!(workflow.steps[1].depends_on, vec!["fetch"]);
//! ```

use std::collections::HashMap;
use std::time::Duration;

use agentflow_types::agent::{AgentSpec, DecisionAgentConfig, TaskAgentConfig};
use agentflow_types::workflow::{
    FailurePolicy, StepCondition, Workflow, WorkflowConfig, WorkflowStep,
};
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use super::definition::{WorkflowError, validate_workflow};

/// Confidence threshold given to decision steps added through the builder.
const BUILDER_CONFIDENCE_THRESHOLD: f64 = 0.8;

/// Shorthand for [`WorkflowBuilder::new`].
pub fn workflow(name: impl Into<String>) -> WorkflowBuilder {
    WorkflowBuilder::new(name)
}

/// One step under construction.
#[derive(Debug, Clone)]
pub struct StepBuilder {
    id: Option<String>,
    name: String,
    agent: AgentSpec,
    inputs: HashMap<String, Value>,
    depends_on: Vec<String>,
    condition: Option<StepCondition>,
    timeout: Option<Duration>,
    retry_on_failure: bool,
}

impl StepBuilder {
    pub fn new(name: impl Into<String>, agent: AgentSpec) -> Self {
        Self {
            id: None,
            name: name.into(),
            agent,
            inputs: HashMap::new(),
            depends_on: Vec::new(),
            condition: None,
            timeout: None,
            retry_on_failure: false,
        }
    }

    /// Explicit step ID. Defaults to `step_<n>` (1-based position).
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn input(mut self, name: impl Into<String>, value: Value) -> Self {
        self.inputs.insert(name.into(), value);
        self
    }

    pub fn inputs(mut self, inputs: HashMap<String, Value>) -> Self {
        self.inputs.extend(inputs);
        self
    }

    pub fn depends_on(mut self, step_id: impl Into<String>) -> Self {
        let step_id = step_id.into();
        if !self.depends_on.contains(&step_id) {
            self.depends_on.push(step_id);
        }
        self
    }

    pub fn condition(mut self, condition: StepCondition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retry_on_failure(mut self, retry: bool) -> Self {
        self.retry_on_failure = retry;
        self
    }

    fn into_step(self, default_id: String) -> WorkflowStep {
        WorkflowStep {
            id: self.id.unwrap_or(default_id),
            name: self.name,
            agent: self.agent,
            inputs: self.inputs,
            depends_on: self.depends_on,
            condition: self.condition,
            timeout: self.timeout,
            retry_on_failure: self.retry_on_failure,
        }
    }
}

/// Fluent builder producing a validated `Workflow`.
#[derive(Debug, Clone)]
pub struct WorkflowBuilder {
    id: Option<String>,
    config: WorkflowConfig,
    steps: Vec<WorkflowStep>,
}

impl WorkflowBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            config: WorkflowConfig::new(name),
            steps: Vec::new(),
        }
    }

    /// Explicit workflow ID. Defaults to a fresh UUIDv7.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.config.description = description.into();
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    pub fn parallel_execution(mut self, parallel: bool) -> Self {
        self.config.parallel_execution = parallel;
        self
    }

    pub fn on_failure(mut self, policy: FailurePolicy) -> Self {
        self.config.on_failure = policy;
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.config.metadata.insert(key.into(), value);
        self
    }

    pub fn add_step(mut self, step: StepBuilder) -> Self {
        let default_id = format!("step_{}", self.steps.len() + 1);
        self.steps.push(step.into_step(default_id));
        self
    }

    /// Add a step depending on the most recently added one.
    pub fn then(self, step: StepBuilder) -> Self {
        let step = match self.last_step_id() {
            Some(previous) => step.depends_on(previous),
            None => step,
        };
        self.add_step(step)
    }

    /// Add a task-agent step.
    pub fn add_task_step(
        self,
        name: &str,
        task_type: &str,
        inputs: HashMap<String, Value>,
        depends_on: &[&str],
    ) -> Self {
        let agent = AgentSpec::Task(TaskAgentConfig::new(name, task_type));
        let step = depends_on
            .iter()
            .fold(StepBuilder::new(name, agent).inputs(inputs), |s, dep| s.depends_on(*dep));
        self.add_step(step)
    }

    /// Add a decision-agent step.
    pub fn add_decision_step(
        self,
        name: &str,
        decision_criteria: Vec<String>,
        alternatives: Vec<String>,
        depends_on: &[&str],
    ) -> Self {
        let agent = AgentSpec::Decision(DecisionAgentConfig {
            name: name.to_string(),
            description: format!("Decision: {name}"),
            decision_criteria,
            alternatives,
            confidence_threshold: BUILDER_CONFIDENCE_THRESHOLD,
        });
        let step = depends_on
            .iter()
            .fold(StepBuilder::new(name, agent), |s, dep| s.depends_on(*dep));
        self.add_step(step)
    }

    /// Add a step gated by `condition`.
    pub fn add_conditional_step(self, step: StepBuilder, condition: StepCondition) -> Self {
        self.add_step(step.condition(condition))
    }

    fn last_step_id(&self) -> Option<String> {
        self.steps.last().map(|s| s.id.clone())
    }

    /// Assemble and validate the workflow.
    pub fn build(self) -> Result<Workflow, WorkflowError> {
        let workflow = Workflow {
            id: self.id.unwrap_or_else(|| Uuid::now_v7().to_string()),
            config: self.config,
            steps: self.steps,
            created_at: Utc::now(),
        };
        validate_workflow(&workflow)?;
        Ok(workflow)
    }
}
