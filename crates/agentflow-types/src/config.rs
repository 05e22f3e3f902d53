//! Engine configuration types.
//!
//! `EngineConfig` represents the `agentflow.toml` that tunes engine-wide
//! defaults: timeouts, retry backoff, dependency handling, concurrency.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default per-step timeout (5 minutes).
pub const DEFAULT_STEP_TIMEOUT_SECS: u64 = 300;

/// Default whole-workflow timeout (1 hour).
pub const DEFAULT_WORKFLOW_TIMEOUT_SECS: u64 = 3600;

/// Top-level engine configuration. All fields have sensible defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Applied to steps that do not set their own timeout.
    #[serde(default = "default_step_timeout_secs")]
    pub default_step_timeout_secs: u64,

    /// Applied to workflows that do not set their own timeout.
    #[serde(default = "default_workflow_timeout_secs")]
    pub default_workflow_timeout_secs: u64,

    /// First retry delay; doubles on each further attempt.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Upper bound for a single retry delay.
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// How unsatisfiable `depends_on` edges are handled.
    #[serde(default)]
    pub dependency_policy: DependencyPolicy,

    /// Capacity of the run event broadcast channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Max steps of one parallel level running at once (None = unbounded).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_parallel_steps: Option<usize>,
}

fn default_step_timeout_secs() -> u64 {
    DEFAULT_STEP_TIMEOUT_SECS
}

fn default_workflow_timeout_secs() -> u64 {
    DEFAULT_WORKFLOW_TIMEOUT_SECS
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_retry_max_delay_ms() -> u64 {
    30_000
}

fn default_event_capacity() -> usize {
    1024
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_step_timeout_secs: default_step_timeout_secs(),
            default_workflow_timeout_secs: default_workflow_timeout_secs(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            dependency_policy: DependencyPolicy::default(),
            event_capacity: default_event_capacity(),
            max_parallel_steps: None,
        }
    }
}

impl EngineConfig {
    /// Clamp values that would make the engine misbehave.
    ///
    /// Zero timeouts become one second, a zero channel capacity becomes one,
    /// `max_parallel_steps = 0` means unbounded, and the max retry delay is
    /// never below the base delay.
    pub fn validated(mut self) -> Self {
        self.default_step_timeout_secs = self.default_step_timeout_secs.max(1);
        self.default_workflow_timeout_secs = self.default_workflow_timeout_secs.max(1);
        self.event_capacity = self.event_capacity.max(1);
        if self.max_parallel_steps == Some(0) {
            self.max_parallel_steps = None;
        }
        self.retry_max_delay_ms = self.retry_max_delay_ms.max(self.retry_base_delay_ms);
        self
    }

    pub fn default_step_timeout(&self) -> Duration {
        Duration::from_secs(self.default_step_timeout_secs)
    }

    pub fn default_workflow_timeout(&self) -> Duration {
        Duration::from_secs(self.default_workflow_timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_delay_ms)
    }
}

/// Handling of steps whose dependencies can never be satisfied
/// (a cycle, or a reference to an unknown step).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyPolicy {
    /// Fail the run before any step executes.
    #[default]
    Strict,
    /// Log the unreachable steps and run only the reachable levels.
    SkipUnreachable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_default_values() {
        let config = EngineConfig::default();
        assert_eq!(config.default_step_timeout_secs, 300);
        assert_eq!(config.default_workflow_timeout_secs, 3600);
        assert_eq!(config.dependency_policy, DependencyPolicy::Strict);
        assert!(config.max_parallel_steps.is_none());
    }

    #[test]
    fn test_engine_config_deserialize_with_defaults() {
        let config: EngineConfig = toml::from_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_engine_config_deserialize_with_values() {
        let toml_str = r#"
default_step_timeout_secs = 30
retry_base_delay_ms = 250
dependency_policy = "skip_unreachable"
max_parallel_steps = 4
"#;
        let config: EngineConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.default_step_timeout(), Duration::from_secs(30));
        assert_eq!(config.retry_base_delay(), Duration::from_millis(250));
        assert_eq!(config.dependency_policy, DependencyPolicy::SkipUnreachable);
        assert_eq!(config.max_parallel_steps, Some(4));
        // Untouched fields keep their defaults
        assert_eq!(config.default_workflow_timeout_secs, 3600);
    }

    #[test]
    fn test_validated_clamps_degenerate_values() {
        let config = EngineConfig {
            default_step_timeout_secs: 0,
            default_workflow_timeout_secs: 0,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 10,
            event_capacity: 0,
            max_parallel_steps: Some(0),
            ..EngineConfig::default()
        }
        .validated();

        assert_eq!(config.default_step_timeout_secs, 1);
        assert_eq!(config.default_workflow_timeout_secs, 1);
        assert_eq!(config.retry_max_delay_ms, 500);
        assert_eq!(config.event_capacity, 1);
        assert!(config.max_parallel_steps.is_none());
    }
}
