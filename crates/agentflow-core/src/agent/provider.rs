//! Agent trait definition.
//!
//! This is the only thing the engine needs from an executor of step work.
//! Task logic, decision logic and tool calls all live behind it.

use std::collections::HashMap;

use agentflow_types::agent::{AgentError, AgentOutcome};
use serde_json::Value;

/// An executable unit bound to a workflow step.
///
/// Returning `Ok(AgentOutcome { success: false, .. })` reports an ordinary
/// step failure. Returning `Err` reports an unexpected fault. The engine turns
/// both into a failed `StepResult`; neither escapes the engine.
pub trait Agent: Send + Sync {
    /// Human-readable agent name, used in logs.
    fn name(&self) -> &str;

    /// Execute with fully resolved inputs.
    fn execute(
        &self,
        inputs: &HashMap<String, Value>,
    ) -> impl std::future::Future<Output = Result<AgentOutcome, AgentError>> + Send;
}
