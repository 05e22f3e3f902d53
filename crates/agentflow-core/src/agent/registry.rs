//! Agent registry: kind-indexed factories producing `BoxAgent`s.

use std::collections::HashMap;
use std::sync::Arc;

use agentflow_types::agent::{AgentError, AgentKind, AgentSpec};

use super::box_agent::BoxAgent;

/// Builds an executable agent from its step configuration.
///
/// Called once per step attempt, so each attempt gets a fresh agent.
pub trait AgentFactory: Send + Sync {
    fn create(&self, spec: &AgentSpec) -> Result<BoxAgent, AgentError>;
}

impl<F> AgentFactory for F
where
    F: Fn(&AgentSpec) -> Result<BoxAgent, AgentError> + Send + Sync,
{
    fn create(&self, spec: &AgentSpec) -> Result<BoxAgent, AgentError> {
        self(spec)
    }
}

/// Registry of agent factories, indexed by `AgentKind`.
#[derive(Clone, Default)]
pub struct AgentRegistry {
    factories: HashMap<AgentKind, Arc<dyn AgentFactory>>,
}

impl AgentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for the given kind.
    ///
    /// If a factory for this kind already exists, it is replaced.
    pub fn register(&mut self, kind: AgentKind, factory: impl AgentFactory + 'static) {
        self.factories.insert(kind, Arc::new(factory));
    }

    /// Builder-style `register`.
    pub fn with(mut self, kind: AgentKind, factory: impl AgentFactory + 'static) -> Self {
        self.register(kind, factory);
        self
    }

    /// Resolve an `AgentSpec` to an executable agent.
    pub fn create(&self, spec: &AgentSpec) -> Result<BoxAgent, AgentError> {
        let kind = spec.kind();
        let factory = self
            .factories
            .get(&kind)
            .ok_or(AgentError::UnknownKind(kind))?;
        factory.create(spec)
    }

    pub fn contains(&self, kind: AgentKind) -> bool {
        self.factories.contains_key(&kind)
    }

    /// All registered kinds.
    pub fn kinds(&self) -> Vec<AgentKind> {
        self.factories.keys().copied().collect()
    }
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap as Map;

    use super::*;
    use crate::agent::Agent;
    use agentflow_types::agent::{AgentOutcome, DecisionAgentConfig, TaskAgentConfig};
    use serde_json::{Value, json};

    struct Named(String);

    impl Agent for Named {
        fn name(&self) -> &str {
            &self.0
        }

        async fn execute(&self, _inputs: &Map<String, Value>) -> Result<AgentOutcome, AgentError> {
            Ok(AgentOutcome::success(json!(self.0)))
        }
    }

    fn task_factory(spec: &AgentSpec) -> Result<BoxAgent, AgentError> {
        match spec {
            AgentSpec::Task(config) => Ok(BoxAgent::new(Named(config.name.clone()))),
            other => Err(AgentError::InvalidConfig(format!(
                "task factory cannot build {} agents",
                other.kind()
            ))),
        }
    }

    #[test]
    fn create_dispatches_by_kind() {
        let registry = AgentRegistry::new().with(AgentKind::Task, task_factory);
        let agent = registry
            .create(&AgentSpec::Task(TaskAgentConfig::new("fetcher", "http")))
            .unwrap();
        assert_eq!(agent.name(), "fetcher");
        assert!(registry.contains(AgentKind::Task));
        assert_eq!(registry.kinds(), vec![AgentKind::Task]);
    }

    #[test]
    fn unknown_kind_is_configuration_error() {
        let registry = AgentRegistry::new().with(AgentKind::Task, task_factory);
        let spec = AgentSpec::Decision(DecisionAgentConfig {
            name: "router".to_string(),
            description: String::new(),
            decision_criteria: vec![],
            alternatives: vec!["a".to_string()],
            confidence_threshold: 0.8,
        });
        let err = registry.create(&spec).unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(err.to_string(), "unknown agent type: decision");
    }

    #[test]
    fn register_replaces_existing_factory() {
        let mut registry = AgentRegistry::new();
        registry.register(AgentKind::Task, task_factory);
        registry.register(
            AgentKind::Task,
            |_spec: &AgentSpec| -> Result<BoxAgent, AgentError> {
                Ok(BoxAgent::new(Named("replacement".to_string())))
            },
        );
        let agent = registry
            .create(&AgentSpec::Task(TaskAgentConfig::new("original", "x")))
            .unwrap();
        assert_eq!(agent.name(), "replacement");
    }
}
