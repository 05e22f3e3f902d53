//! Workflow engine: drives a full run.
//!
//! # Execution flow
//!
//! 1. Allocate a run ID, register the run, publish `RunStarted`.
//! 2. Plan dependency levels; apply the dependency policy to unreachable steps.
//! 3. For each level: dispatch via the batch executor, record every result in
//!    the context and the `WorkflowResult`, then apply the failure policy.
//! 4. Finish `completed` with the last defined step's output as
//!    `final_output`, or `failed` with the first cause.
//!
//! The whole run is bounded by the workflow timeout and can be cancelled by
//! run ID. `execute` never returns an error and never panics: every failure
//! is reported through the returned `WorkflowResult`.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use agentflow_types::config::{DependencyPolicy, EngineConfig};
use agentflow_types::event::WorkflowEvent;
use agentflow_types::workflow::{FailurePolicy, Workflow, WorkflowResult, WorkflowStatus};
use chrono::Utc;
use futures_util::FutureExt;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::agent::AgentRegistry;
use crate::event::EventBus;

use super::batch::BatchExecutor;
use super::context::ExecutionContext;
use super::dag::build_levels;
use super::definition::{WorkflowError, validate_step_ids};
use super::rollback::RollbackHook;
use super::run_registry::{RunHandle, RunRegistry};
use super::step_runner::StepRunner;

/// Error text of a cancelled run.
pub const CANCELLED_ERROR: &str = "workflow run cancelled";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no in-flight run with id {0}")]
    RunNotFound(Uuid),
}

/// Orchestrates workflow runs.
///
/// One engine serves any number of concurrent runs; each run owns its
/// context and result.
pub struct WorkflowEngine {
    config: EngineConfig,
    batch: BatchExecutor,
    event_bus: EventBus,
    runs: RunRegistry,
    rollback_hook: Option<Arc<dyn RollbackHook>>,
}

impl WorkflowEngine {
    /// Engine with default configuration.
    pub fn new(registry: AgentRegistry) -> Self {
        Self::with_config(registry, EngineConfig::default())
    }

    pub fn with_config(registry: AgentRegistry, config: EngineConfig) -> Self {
        let config = config.validated();
        let event_bus = EventBus::new(config.event_capacity);
        let runner = StepRunner::new(Arc::new(registry), event_bus.clone(), &config);
        let batch = BatchExecutor::new(Arc::new(runner), config.max_parallel_steps);
        Self {
            config,
            batch,
            event_bus,
            runs: RunRegistry::new(),
            rollback_hook: None,
        }
    }

    /// Install the hook called under `on_failure: rollback`.
    pub fn with_rollback_hook(mut self, hook: impl RollbackHook + 'static) -> Self {
        self.rollback_hook = Some(Arc::new(hook));
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Receive events of all subsequent runs.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.event_bus.subscribe()
    }

    /// Runs currently in flight.
    pub fn running_runs(&self) -> Vec<RunHandle> {
        self.runs.list()
    }

    /// Cancel an in-flight run. The run finishes `failed`.
    pub fn cancel(&self, run_id: Uuid) -> Result<(), EngineError> {
        if self.runs.cancel(run_id) {
            tracing::info!(%run_id, "cancellation requested");
            Ok(())
        } else {
            Err(EngineError::RunNotFound(run_id))
        }
    }

    /// Execute `workflow` with `input` as the run's variables.
    pub async fn execute(&self, workflow: &Workflow, input: HashMap<String, Value>) -> WorkflowResult {
        let run_id = Uuid::now_v7();
        let started = Instant::now();
        let mut result = WorkflowResult::running(run_id, &workflow.id);
        let mut ctx = ExecutionContext::new(run_id, &workflow.id, input);

        let (_guard, cancel) = self.runs.register(RunHandle {
            run_id,
            workflow_id: workflow.id.clone(),
            workflow_name: workflow.config.name.clone(),
            started_at: result.started_at,
        });

        tracing::info!(
            %run_id,
            workflow_id = %workflow.id,
            workflow = %workflow.config.name,
            steps = workflow.steps.len(),
            "workflow run started"
        );
        self.event_bus.publish(WorkflowEvent::RunStarted {
            run_id,
            workflow_id: workflow.id.clone(),
            workflow_name: workflow.config.name.clone(),
            num_steps: workflow.steps.len(),
        });

        let timeout = workflow
            .config
            .timeout
            .unwrap_or_else(|| self.config.default_workflow_timeout());

        let outcome = {
            let run = AssertUnwindSafe(self.run_levels(workflow, &mut ctx, &mut result)).catch_unwind();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(CANCELLED_ERROR.to_string()),
                timed = tokio::time::timeout(timeout, run) => match timed {
                    Err(_elapsed) => Err(format!(
                        "Workflow execution timed out after {} seconds",
                        timeout.as_secs_f64()
                    )),
                    Ok(Err(panic)) => Err(format!(
                        "Workflow execution failed: {}",
                        panic_message(&*panic)
                    )),
                    Ok(Ok(outcome)) => outcome,
                },
            }
        };

        match outcome {
            Ok(()) => {
                result.status = WorkflowStatus::Completed;
                result.final_output = workflow
                    .last_step_id()
                    .and_then(|id| result.step_results.get(id))
                    .and_then(|r| r.output.clone());
            }
            Err(error) => result.fail(error),
        }

        result.total_execution_time_secs = started.elapsed().as_secs_f64();
        result.completed_at = Some(Utc::now());
        self.publish_finished(workflow, &result, started);
        result
    }

    /// Run every level in order. `Err` carries the run's failure cause.
    ///
    /// Results are merged into `result` as each level finishes, so a timeout
    /// or cancellation keeps everything recorded so far.
    async fn run_levels(
        &self,
        workflow: &Workflow,
        ctx: &mut ExecutionContext,
        result: &mut WorkflowResult,
    ) -> Result<(), String> {
        let run_id = ctx.run_id;
        validate_step_ids(workflow).map_err(|e| e.to_string())?;

        let plan = build_levels(&workflow.steps);
        if !plan.is_complete() {
            match self.config.dependency_policy {
                DependencyPolicy::Strict => {
                    let err = WorkflowError::UnsatisfiableDependencies(plan.unreachable);
                    tracing::error!(%run_id, error = %err, "refusing to run workflow");
                    return Err(err.to_string());
                }
                DependencyPolicy::SkipUnreachable => {
                    tracing::warn!(
                        %run_id,
                        unreachable = ?plan.unreachable,
                        "running reachable steps only"
                    );
                }
            }
        }

        let max_retries = workflow.config.max_retries;
        for (level_idx, level) in plan.levels.iter().enumerate() {
            let parallel = workflow.config.parallel_execution && level.len() > 1;
            let step_ids: Vec<String> = level.iter().map(|s| s.id.clone()).collect();
            tracing::debug!(%run_id, level = level_idx, steps = ?step_ids, parallel, "processing level");
            self.event_bus.publish(WorkflowEvent::LevelStarted {
                run_id,
                level: level_idx,
                step_ids,
                parallel,
            });

            let mut level_results = self
                .batch
                .execute_level(run_id, level, ctx, parallel, max_retries)
                .await;

            let mut first_failure: Option<(String, String)> = None;
            for step in level {
                let Some(step_result) = level_results.remove(&step.id) else {
                    continue;
                };
                ctx.record(&step.id, &step_result);
                if step_result.is_failed() && first_failure.is_none() {
                    first_failure = Some((
                        step.id.clone(),
                        step_result.error.clone().unwrap_or_default(),
                    ));
                }
                result.step_results.insert(step.id.clone(), step_result);
            }

            let Some((step_id, error)) = first_failure else {
                continue;
            };

            match workflow.config.on_failure {
                FailurePolicy::Stop => {
                    return Err(format!("Step {step_id} failed: {error}"));
                }
                FailurePolicy::Rollback => {
                    let mut message =
                        format!("Workflow rolled back due to step {step_id} failure: {error}");
                    if let Err(hook_error) = self.rollback(workflow, ctx, &step_id).await {
                        message.push_str(&format!(" (rollback hook failed: {hook_error})"));
                    }
                    return Err(message);
                }
                FailurePolicy::Continue => {
                    tracing::warn!(
                        %run_id,
                        step_id = %step_id,
                        %error,
                        "step failed, continuing per failure policy"
                    );
                }
            }
        }

        Ok(())
    }

    async fn rollback(
        &self,
        workflow: &Workflow,
        ctx: &ExecutionContext,
        failed_step_id: &str,
    ) -> anyhow::Result<()> {
        let Some(hook) = &self.rollback_hook else {
            tracing::info!(run_id = %ctx.run_id, "no rollback hook installed, nothing to compensate");
            return Ok(());
        };

        tracing::info!(run_id = %ctx.run_id, failed_step_id, "invoking rollback hook");
        let outcome = hook.rollback(workflow, ctx, failed_step_id).await;
        if let Err(e) = &outcome {
            tracing::error!(run_id = %ctx.run_id, error = %e, "rollback hook failed");
        }
        outcome
    }

    fn publish_finished(&self, workflow: &Workflow, result: &WorkflowResult, started: Instant) {
        let run_id = result.run_id;
        match result.status {
            WorkflowStatus::Completed => {
                let steps_completed = result.step_results.values().filter(|r| !r.is_failed()).count();
                tracing::info!(
                    %run_id,
                    workflow_id = %workflow.id,
                    steps_completed,
                    elapsed_secs = result.total_execution_time_secs,
                    "workflow run completed"
                );
                self.event_bus.publish(WorkflowEvent::RunCompleted {
                    run_id,
                    workflow_id: workflow.id.clone(),
                    duration_ms: started.elapsed().as_millis() as u64,
                    steps_completed,
                });
            }
            _ => {
                let error = result.error.clone().unwrap_or_default();
                tracing::warn!(%run_id, workflow_id = %workflow.id, %error, "workflow run failed");
                self.event_bus.publish(WorkflowEvent::RunFailed {
                    run_id,
                    workflow_id: workflow.id.clone(),
                    error,
                });
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
