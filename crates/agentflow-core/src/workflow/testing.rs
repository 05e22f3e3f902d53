//! Scripted agents and step helpers shared by the engine tests.
//!
//! A task agent's `task_type` selects its behaviour:
//! `increment`, `echo`, `fail`, `error`, `panic`, `sleep:<ms>`, `flaky:<n>`
//! (fails the first `n` calls, then succeeds). Every call is logged under the
//! agent's name, which `step()` sets to the step id.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agentflow_types::agent::{
    AgentError, AgentKind, AgentOutcome, AgentSpec, DecisionAgentConfig, TaskAgentConfig,
};
use agentflow_types::workflow::{StepCondition, WorkflowStep};
use serde_json::{Value, json};

use crate::agent::{Agent, AgentRegistry, BoxAgent};

#[derive(Clone, Default)]
pub(crate) struct Harness {
    calls: Arc<Mutex<Vec<String>>>,
    attempts: Arc<Mutex<HashMap<String, u32>>>,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registry with task and decision factories. Tool is left unregistered.
    pub(crate) fn registry(&self) -> AgentRegistry {
        let task_harness = self.clone();
        let decision_harness = self.clone();
        AgentRegistry::new()
            .with(AgentKind::Task, move |spec: &AgentSpec| match spec {
                AgentSpec::Task(config) => Ok(BoxAgent::new(ScriptedAgent {
                    name: config.name.clone(),
                    behavior: config.task_type.clone(),
                    harness: task_harness.clone(),
                })),
                other => Err(AgentError::InvalidConfig(format!("not a task: {}", other.kind()))),
            })
            .with(AgentKind::Decision, move |spec: &AgentSpec| match spec {
                AgentSpec::Decision(config) => Ok(BoxAgent::new(ScriptedDecision {
                    config: config.clone(),
                    harness: decision_harness.clone(),
                })),
                other => Err(AgentError::InvalidConfig(format!(
                    "not a decision: {}",
                    other.kind()
                ))),
            })
    }

    /// Agent names in call order.
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn was_called(&self, name: &str) -> bool {
        self.calls().iter().any(|c| c == name)
    }

    fn log(&self, name: &str) -> u32 {
        self.calls.lock().unwrap().push(name.to_string());
        let mut attempts = self.attempts.lock().unwrap();
        let count = attempts.entry(name.to_string()).or_insert(0);
        *count += 1;
        *count
    }
}

struct ScriptedAgent {
    name: String,
    behavior: String,
    harness: Harness,
}

impl Agent for ScriptedAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, inputs: &HashMap<String, Value>) -> Result<AgentOutcome, AgentError> {
        let call = self.harness.log(&self.name);
        let (verb, arg) = self
            .behavior
            .split_once(':')
            .unwrap_or((self.behavior.as_str(), ""));

        match verb {
            "increment" => match inputs.get("n").and_then(Value::as_i64) {
                Some(n) => Ok(AgentOutcome::success(json!({ "n": n + 1 }))),
                None => Ok(AgentOutcome::failure("input 'n' is not an integer")),
            },
            "echo" => Ok(AgentOutcome::success(Value::Object(
                inputs.clone().into_iter().collect(),
            ))),
            "fail" => Ok(AgentOutcome::failure("scripted failure")),
            "error" => Err(AgentError::ExecutionFailed("scripted fault".to_string())),
            "panic" => panic!("scripted panic"),
            "sleep" => {
                let ms: u64 = arg.parse().unwrap_or(0);
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(AgentOutcome::success(json!({ "slept_ms": ms })))
            }
            "flaky" => {
                let failures: u32 = arg.parse().unwrap_or(0);
                if call <= failures {
                    Ok(AgentOutcome::failure(format!("flaky attempt {call}")))
                } else {
                    Ok(AgentOutcome::success(json!({ "attempt": call })))
                }
            }
            other => Err(AgentError::InvalidConfig(format!("unknown behaviour '{other}'"))),
        }
    }
}

/// Picks the first alternative with the configured confidence.
struct ScriptedDecision {
    config: DecisionAgentConfig,
    harness: Harness,
}

impl Agent for ScriptedDecision {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn execute(&self, _inputs: &HashMap<String, Value>) -> Result<AgentOutcome, AgentError> {
        self.harness.log(&self.config.name);
        match self.config.alternatives.first() {
            Some(choice) => Ok(AgentOutcome::success(json!({
                "decision": choice,
                "confidence": self.config.confidence_threshold,
            }))
            .with_metadata("alternatives", json!(self.config.alternatives.len()))),
            None => Ok(AgentOutcome::failure("no alternatives to choose from")),
        }
    }
}

// ---------------------------------------------------------------------------
// Step helpers
// ---------------------------------------------------------------------------

pub(crate) fn task(behavior: &str) -> AgentSpec {
    AgentSpec::Task(TaskAgentConfig::new("scripted", behavior))
}

pub(crate) fn decision(alternatives: &[&str]) -> AgentSpec {
    AgentSpec::Decision(DecisionAgentConfig {
        name: "scripted-decision".to_string(),
        description: String::new(),
        decision_criteria: vec!["cost".to_string()],
        alternatives: alternatives.iter().map(|a| a.to_string()).collect(),
        confidence_threshold: 0.8,
    })
}

/// A step whose agent is named after the step id.
pub(crate) fn step(id: &str, mut agent: AgentSpec, deps: &[&str]) -> WorkflowStep {
    match &mut agent {
        AgentSpec::Task(c) => c.name = id.to_string(),
        AgentSpec::Decision(c) => c.name = id.to_string(),
        AgentSpec::Tool(c) => c.name = id.to_string(),
    }
    WorkflowStep {
        id: id.to_string(),
        name: id.to_string(),
        agent,
        inputs: HashMap::new(),
        depends_on: deps.iter().map(|d| d.to_string()).collect(),
        condition: None,
        timeout: None,
        retry_on_failure: false,
    }
}

pub(crate) trait StepExt {
    fn input(self, name: &str, value: Value) -> Self;
    fn with_condition(self, condition: StepCondition) -> Self;
    fn with_timeout(self, timeout: Duration) -> Self;
    fn with_retry(self) -> Self;
}

impl StepExt for WorkflowStep {
    fn input(mut self, name: &str, value: Value) -> Self {
        self.inputs.insert(name.to_string(), value);
        self
    }

    fn with_condition(mut self, condition: StepCondition) -> Self {
        self.condition = Some(condition);
        self
    }

    fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn with_retry(mut self) -> Self {
        self.retry_on_failure = true;
        self
    }
}
