//! BoxAgent -- object-safe dynamic dispatch wrapper for `Agent`.
//!
//! 1. Define an object-safe `AgentDyn` trait with boxed futures
//! 2. Blanket-impl `AgentDyn` for all `T: Agent`
//! 3. `BoxAgent` wraps `Box<dyn AgentDyn>` and delegates

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use agentflow_types::agent::{AgentError, AgentOutcome};
use serde_json::Value;

use super::provider::Agent;

/// Object-safe version of [`Agent`] with boxed futures.
pub trait AgentDyn: Send + Sync {
    fn name(&self) -> &str;

    fn execute_boxed<'a>(
        &'a self,
        inputs: &'a HashMap<String, Value>,
    ) -> Pin<Box<dyn Future<Output = Result<AgentOutcome, AgentError>> + Send + 'a>>;
}

impl<T: Agent> AgentDyn for T {
    fn name(&self) -> &str {
        Agent::name(self)
    }

    fn execute_boxed<'a>(
        &'a self,
        inputs: &'a HashMap<String, Value>,
    ) -> Pin<Box<dyn Future<Output = Result<AgentOutcome, AgentError>> + Send + 'a>> {
        Box::pin(self.execute(inputs))
    }
}

/// Type-erased agent produced by an `AgentFactory`.
///
/// Since `Agent` uses RPITIT, it cannot be used as a trait object directly.
pub struct BoxAgent {
    inner: Box<dyn AgentDyn + Send + Sync>,
}

impl BoxAgent {
    /// Wrap a concrete `Agent` in a type-erased box.
    pub fn new<T: Agent + 'static>(agent: T) -> Self {
        Self {
            inner: Box::new(agent),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub async fn execute(
        &self,
        inputs: &HashMap<String, Value>,
    ) -> Result<AgentOutcome, AgentError> {
        self.inner.execute_boxed(inputs).await
    }
}

impl std::fmt::Debug for BoxAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxAgent").field("name", &self.name()).finish()
    }
}
