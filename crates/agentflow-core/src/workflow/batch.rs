//! Executes one dependency level.
//!
//! Steps of a level do not depend on each other. With parallel execution
//! enabled and more than one step, every step runs in its own task against a
//! shared snapshot of the context; otherwise steps run one after another in
//! level order. Either way the caller gets one `StepResult` per step.

use std::collections::HashMap;
use std::sync::Arc;

use agentflow_types::workflow::{StepResult, WorkflowStep};
use tokio::sync::Semaphore;
use tokio::task::{self, JoinSet};
use uuid::Uuid;

use super::context::ExecutionContext;
use super::step_runner::StepRunner;

#[derive(Clone)]
pub struct BatchExecutor {
    runner: Arc<StepRunner>,
    /// Bounds concurrently running steps of a parallel level.
    limit: Option<Arc<Semaphore>>,
}

impl BatchExecutor {
    pub fn new(runner: Arc<StepRunner>, max_parallel_steps: Option<usize>) -> Self {
        Self {
            runner,
            limit: max_parallel_steps
                .filter(|n| *n > 0)
                .map(|n| Arc::new(Semaphore::new(n))),
        }
    }

    pub fn runner(&self) -> &StepRunner {
        &self.runner
    }

    /// Run every step of `level` and collect results keyed by step ID.
    ///
    /// Sets `current_step_id` before each dispatch but leaves outputs and the
    /// completed set untouched.
    pub async fn execute_level(
        &self,
        run_id: Uuid,
        level: &[&WorkflowStep],
        ctx: &mut ExecutionContext,
        parallel: bool,
        max_retries: u32,
    ) -> HashMap<String, StepResult> {
        if parallel && level.len() > 1 {
            self.execute_parallel(run_id, level, ctx, max_retries).await
        } else {
            self.execute_sequential(run_id, level, ctx, max_retries).await
        }
    }

    async fn execute_sequential(
        &self,
        run_id: Uuid,
        level: &[&WorkflowStep],
        ctx: &mut ExecutionContext,
        max_retries: u32,
    ) -> HashMap<String, StepResult> {
        let mut results = HashMap::with_capacity(level.len());
        for step in level {
            ctx.mark_started(&step.id);
            let result = self.runner.run(run_id, step, ctx, max_retries).await;
            results.insert(step.id.clone(), result);
        }
        results
    }

    /// Spawn every step into a `JoinSet`. A task that dies (panic or abort)
    /// is converted into a failed result for its step; sibling results are
    /// unaffected.
    async fn execute_parallel(
        &self,
        run_id: Uuid,
        level: &[&WorkflowStep],
        ctx: &mut ExecutionContext,
        max_retries: u32,
    ) -> HashMap<String, StepResult> {
        for step in level {
            ctx.mark_started(&step.id);
        }
        let snapshot = Arc::new(ctx.clone());
        let mut set: JoinSet<StepResult> = JoinSet::new();
        let mut task_steps = HashMap::with_capacity(level.len());

        for step in level {
            let step_id = step.id.clone();
            let step = (*step).clone();
            let runner = Arc::clone(&self.runner);
            let snapshot = Arc::clone(&snapshot);
            let limit = self.limit.clone();

            let handle = set.spawn(async move {
                let _permit = match limit {
                    Some(semaphore) => semaphore.acquire_owned().await.ok(),
                    None => None,
                };
                runner.run(run_id, &step, &snapshot, max_retries).await
            });
            task_steps.insert(handle.id(), step_id);
        }

        let mut results = join_level(run_id, set, &task_steps).await;
        for step in level {
            results
                .entry(step.id.clone())
                .or_insert_with(|| StepResult::failed(&step.id, "Task panicked: no result produced"));
        }
        results
    }
}

/// Drain `set`, attributing each task that died to the step it was spawned
/// for.
async fn join_level(
    run_id: Uuid,
    mut set: JoinSet<StepResult>,
    task_steps: &HashMap<task::Id, String>,
) -> HashMap<String, StepResult> {
    let mut results = HashMap::with_capacity(task_steps.len());
    while let Some(joined) = set.join_next_with_id().await {
        match joined {
            Ok((_, result)) => {
                results.insert(result.step_id.clone(), result);
            }
            Err(join_error) => {
                let Some(step_id) = task_steps.get(&join_error.id()) else {
                    tracing::error!(%run_id, error = %join_error, "untracked step task died");
                    continue;
                };
                tracing::warn!(%run_id, %step_id, error = %join_error, "step task panicked");
                results.insert(
                    step_id.clone(),
                    StepResult::failed(step_id, format!("Task panicked: {join_error}")),
                );
            }
        }
    }
    results
}
