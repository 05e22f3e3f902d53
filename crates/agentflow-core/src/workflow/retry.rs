//! Retry policy for failed step attempts.
//!
//! Stateless: all logic lives in associated functions that take the limits
//! as parameters.

use std::time::Duration;

use agentflow_types::workflow::WorkflowStep;

pub struct RetryHandler;

impl RetryHandler {
    /// Total attempts allowed for a step (first run included).
    ///
    /// Steps without `retry_on_failure` get exactly one attempt; others get
    /// one plus the workflow's `max_retries`.
    pub fn max_attempts(step: &WorkflowStep, max_retries: u32) -> u32 {
        if step.retry_on_failure {
            max_retries.saturating_add(1)
        } else {
            1
        }
    }

    /// Whether another attempt follows attempt number `attempt` (1-based).
    pub fn should_retry(max_attempts: u32, attempt: u32) -> bool {
        attempt < max_attempts
    }

    /// Delay before the attempt following `attempt`: `base * 2^(attempt-1)`,
    /// capped at `max`.
    pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        base.checked_mul(1u32 << exponent)
            .map_or(max, |delay| delay.min(max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentflow_types::agent::{AgentSpec, TaskAgentConfig};
    use std::collections::HashMap;

    fn step(retry_on_failure: bool) -> WorkflowStep {
        WorkflowStep {
            id: "s".to_string(),
            name: "s".to_string(),
            agent: AgentSpec::Task(TaskAgentConfig::new("s", "noop")),
            inputs: HashMap::new(),
            depends_on: vec![],
            condition: None,
            timeout: None,
            retry_on_failure,
        }
    }

    #[test]
    fn attempts_depend_on_retry_flag() {
        assert_eq!(RetryHandler::max_attempts(&step(false), 3), 1);
        assert_eq!(RetryHandler::max_attempts(&step(true), 3), 4);
        assert_eq!(RetryHandler::max_attempts(&step(true), 0), 1);
        assert_eq!(RetryHandler::max_attempts(&step(true), u32::MAX), u32::MAX);
    }

    #[test]
    fn should_retry_until_limit() {
        assert!(RetryHandler::should_retry(3, 1));
        assert!(RetryHandler::should_retry(3, 2));
        assert!(!RetryHandler::should_retry(3, 3));
        assert!(!RetryHandler::should_retry(1, 1));
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let base = Duration::from_millis(100);
        let max = Duration::from_millis(1000);
        assert_eq!(RetryHandler::backoff_delay(1, base, max), Duration::from_millis(100));
        assert_eq!(RetryHandler::backoff_delay(2, base, max), Duration::from_millis(200));
        assert_eq!(RetryHandler::backoff_delay(4, base, max), Duration::from_millis(800));
        assert_eq!(RetryHandler::backoff_delay(5, base, max), max);
        assert_eq!(RetryHandler::backoff_delay(40, base, max), max);
    }
}
