//! Agent binding types.
//!
//! A step binds to an agent through an `AgentSpec`: a closed set of agent
//! kinds, each with its own typed configuration. The engine resolves an `AgentSpec`
//! to an executable agent through a registry of factories, so it never needs
//! to know how a kind is implemented.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Discriminator over the supported agent kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Task,
    Decision,
    Tool,
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AgentKind::Task => "task",
            AgentKind::Decision => "decision",
            AgentKind::Tool => "tool",
        };
        f.write_str(s)
    }
}

/// Agent binding of a workflow step.
///
/// Internally tagged by `type`:
/// ```yaml
/// agent:
///   type: task
///   name: fetcher
///   task_type: http_fetch
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentSpec {
    Task(TaskAgentConfig),
    Decision(DecisionAgentConfig),
    Tool(ToolAgentConfig),
}

impl AgentSpec {
    pub fn kind(&self) -> AgentKind {
        match self {
            AgentSpec::Task(_) => AgentKind::Task,
            AgentSpec::Decision(_) => AgentKind::Decision,
            AgentSpec::Tool(_) => AgentKind::Tool,
        }
    }

    /// Name of the configured agent, used in logs and result metadata.
    pub fn name(&self) -> &str {
        match self {
            AgentSpec::Task(c) => &c.name,
            AgentSpec::Decision(c) => &c.name,
            AgentSpec::Tool(c) => &c.name,
        }
    }
}

/// Structured task execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskAgentConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub task_type: String,
    #[serde(default)]
    pub required_tools: Vec<String>,
    #[serde(default = "default_output_format")]
    pub output_format: String,
}

fn default_output_format() -> String {
    "json".to_string()
}

impl TaskAgentConfig {
    pub fn new(name: impl Into<String>, task_type: impl Into<String>) -> Self {
        let task_type = task_type.into();
        Self {
            name: name.into(),
            description: format!("Task: {task_type}"),
            task_type,
            required_tools: Vec::new(),
            output_format: default_output_format(),
        }
    }
}

/// Choice among alternatives against a set of criteria.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionAgentConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub decision_criteria: Vec<String>,
    #[serde(default)]
    pub alternatives: Vec<String>,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
}

fn default_confidence_threshold() -> f64 {
    0.7
}

/// Direct invocation of a named tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolAgentConfig {
    pub name: String,
    pub tool: String,
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
}

// ---------------------------------------------------------------------------
// Agent outcome
// ---------------------------------------------------------------------------

/// What an agent reports back after executing.
///
/// `success == false` is an ordinary step failure. Unexpected faults are
/// reported as `AgentError` instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    #[serde(default)]
    pub execution_time_secs: f64,
}

impl AgentOutcome {
    pub fn success(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            ..Default::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Errors raised while creating or running an agent.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No factory is registered for this kind.
    #[error("unknown agent type: {0}")]
    UnknownKind(AgentKind),

    /// The agent configuration was rejected by the factory.
    #[error("invalid agent configuration: {0}")]
    InvalidConfig(String),

    /// The agent raised instead of returning an outcome.
    #[error("agent execution failed: {0}")]
    ExecutionFailed(String),
}

impl AgentError {
    /// Configuration problems are permanent; retrying cannot fix them.
    pub fn is_configuration(&self) -> bool {
        matches!(self, AgentError::UnknownKind(_) | AgentError::InvalidConfig(_))
    }
}
