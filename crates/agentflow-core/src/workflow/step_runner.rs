//! Executes a single workflow step.
//!
//! `StepRunner::run` never fails: every outcome, including agent faults,
//! panics and timeouts, becomes a `StepResult`. Sequence per step:
//!
//! 1. Evaluate the condition; a false condition yields a skipped result.
//! 2. Resolve `{{ path }}` inputs against the context.
//! 3. Per attempt: build the agent from the registry and execute it in its
//!    own task, bounded by the step timeout.
//! 4. Retry failed attempts when the step opts in.
//!
//! The context is only read here. Recording outputs is the engine's job once
//! the whole level has finished.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use agentflow_types::agent::{AgentError, AgentOutcome};
use agentflow_types::config::EngineConfig;
use agentflow_types::event::WorkflowEvent;
use agentflow_types::workflow::{StepResult, WorkflowStep};
use serde_json::{Value, json};
use tokio::task::{JoinError, JoinHandle};
use uuid::Uuid;

use crate::agent::AgentRegistry;
use crate::event::EventBus;

use super::condition;
use super::context::ExecutionContext;
use super::retry::RetryHandler;

/// Result of one attempt, plus whether retrying could change it.
struct Attempt {
    result: StepResult,
    retryable: bool,
}

impl Attempt {
    fn retryable(result: StepResult) -> Self {
        Self { result, retryable: true }
    }

    fn permanent(result: StepResult) -> Self {
        Self { result, retryable: false }
    }
}

/// Runs steps against agents resolved from an `AgentRegistry`.
pub struct StepRunner {
    registry: Arc<AgentRegistry>,
    event_bus: EventBus,
    default_timeout: Duration,
    retry_base_delay: Duration,
    retry_max_delay: Duration,
}

impl StepRunner {
    pub fn new(registry: Arc<AgentRegistry>, event_bus: EventBus, config: &EngineConfig) -> Self {
        Self {
            registry,
            event_bus,
            default_timeout: config.default_step_timeout(),
            retry_base_delay: config.retry_base_delay(),
            retry_max_delay: config.retry_max_delay(),
        }
    }

    /// Effective timeout of a step.
    pub fn step_timeout(&self, step: &WorkflowStep) -> Duration {
        step.timeout.unwrap_or(self.default_timeout)
    }

    /// Execute one step and report its result.
    pub async fn run(
        &self,
        run_id: Uuid,
        step: &WorkflowStep,
        ctx: &ExecutionContext,
        max_retries: u32,
    ) -> StepResult {
        if let Some(cond) = &step.condition {
            match condition::evaluate(cond, ctx) {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(%run_id, step_id = %step.id, "condition not met, skipping step");
                    self.event_bus.publish(WorkflowEvent::StepSkipped {
                        run_id,
                        step_id: step.id.clone(),
                    });
                    return StepResult::skipped(&step.id);
                }
                Err(err) => {
                    let error = format!("condition evaluation failed: {err}");
                    tracing::warn!(%run_id, step_id = %step.id, %error, "step condition error");
                    self.event_bus.publish(WorkflowEvent::StepFailed {
                        run_id,
                        step_id: step.id.clone(),
                        error: error.clone(),
                        will_retry: false,
                    });
                    return StepResult::failed(&step.id, error);
                }
            }
        }

        let inputs = ctx.resolve_inputs(&step.inputs);
        let timeout = self.step_timeout(step);
        let max_attempts = RetryHandler::max_attempts(step, max_retries);
        let started = Instant::now();
        let mut attempt_no = 1;

        loop {
            self.event_bus.publish(WorkflowEvent::StepStarted {
                run_id,
                step_id: step.id.clone(),
                step_name: step.name.clone(),
                agent_type: step.agent_kind().to_string(),
            });

            let attempt = self.attempt(step, &inputs, timeout).await;
            let last_attempt_secs = attempt.result.execution_time_secs;
            let result = attempt.result.with_metadata(HashMap::from([
                ("attempts".to_string(), json!(attempt_no)),
                ("agent_type".to_string(), json!(step.agent_kind().to_string())),
                ("agent_name".to_string(), json!(step.agent.name())),
                ("last_attempt_secs".to_string(), json!(last_attempt_secs)),
            ]))
            .with_execution_time(started.elapsed().as_secs_f64());

            if !result.is_failed() {
                tracing::debug!(
                    %run_id,
                    step_id = %step.id,
                    attempts = attempt_no,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "step completed"
                );
                self.event_bus.publish(WorkflowEvent::StepCompleted {
                    run_id,
                    step_id: step.id.clone(),
                    duration_ms: started.elapsed().as_millis() as u64,
                });
                return result;
            }

            let error = result.error.clone().unwrap_or_default();
            let will_retry = step.retry_on_failure
                && attempt.retryable
                && RetryHandler::should_retry(max_attempts, attempt_no);

            tracing::warn!(
                %run_id,
                step_id = %step.id,
                attempt = attempt_no,
                max_attempts,
                will_retry,
                %error,
                "step attempt failed"
            );
            self.event_bus.publish(WorkflowEvent::StepFailed {
                run_id,
                step_id: step.id.clone(),
                error,
                will_retry,
            });

            if !will_retry {
                return result;
            }

            let delay =
                RetryHandler::backoff_delay(attempt_no, self.retry_base_delay, self.retry_max_delay);
            tokio::time::sleep(delay).await;
            attempt_no += 1;
        }
    }

    /// One bounded agent invocation.
    ///
    /// The agent is created and executed inside a spawned task so a panic
    /// surfaces as a `JoinError` instead of unwinding through the runner.
    async fn attempt(
        &self,
        step: &WorkflowStep,
        inputs: &HashMap<String, Value>,
        timeout: Duration,
    ) -> Attempt {
        let registry = Arc::clone(&self.registry);
        let spec = step.agent.clone();
        let inputs = inputs.clone();
        let start = Instant::now();

        let mut task = AbortOnDrop(tokio::spawn(async move {
            let agent = registry.create(&spec)?;
            agent.execute(&inputs).await
        }));

        let attempt = match tokio::time::timeout(timeout, &mut task.0).await {
            Err(_elapsed) => Attempt::retryable(StepResult::failed(
                &step.id,
                format!("Step execution timed out after {} seconds", timeout.as_secs_f64()),
            )),
            Ok(Err(join_error)) => Attempt::retryable(panicked(&step.id, &join_error)),
            Ok(Ok(Err(agent_error))) => agent_error_result(&step.id, agent_error),
            Ok(Ok(Ok(outcome))) => Attempt::retryable(outcome_result(&step.id, outcome)),
        };

        Attempt {
            result: attempt.result.with_execution_time(start.elapsed().as_secs_f64()),
            retryable: attempt.retryable,
        }
    }
}

/// Aborts the agent task when the attempt is abandoned, whether by the step
/// timeout or by the engine dropping the whole run.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn outcome_result(step_id: &str, outcome: AgentOutcome) -> StepResult {
    let result = if outcome.success {
        StepResult::completed(step_id, outcome.data.unwrap_or(Value::Null))
    } else {
        StepResult::failed(
            step_id,
            outcome
                .error
                .unwrap_or_else(|| "agent reported failure without an error message".to_string()),
        )
    };
    result.with_metadata(outcome.metadata)
}

fn agent_error_result(step_id: &str, error: AgentError) -> Attempt {
    let result = StepResult::failed(step_id, error.to_string());
    if error.is_configuration() {
        Attempt::permanent(result)
    } else {
        Attempt::retryable(result)
    }
}

fn panicked(step_id: &str, join_error: &JoinError) -> StepResult {
    tracing::warn!(step_id, error = %join_error, "agent task panicked");
    StepResult::failed(step_id, format!("Task panicked: {join_error}"))
}
