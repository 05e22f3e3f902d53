//! Compensation hook invoked under the `rollback` failure policy.
//!
//! The engine performs no compensation of its own. A caller that needs to
//! undo side effects of completed steps registers a `RollbackHook`; the
//! engine calls it once, best-effort, before failing the run.

use agentflow_types::workflow::Workflow;
use futures_util::future::BoxFuture;

use super::context::ExecutionContext;

pub trait RollbackHook: Send + Sync {
    /// Undo the effects of the steps recorded in `context`.
    ///
    /// An error is logged and appended to the run error; it never aborts the
    /// engine.
    fn rollback<'a>(
        &'a self,
        workflow: &'a Workflow,
        context: &'a ExecutionContext,
        failed_step_id: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<()>>;
}

impl<F> RollbackHook for F
where
    F: Fn(&Workflow, &ExecutionContext, &str) -> anyhow::Result<()> + Send + Sync,
{
    fn rollback<'a>(
        &'a self,
        workflow: &'a Workflow,
        context: &'a ExecutionContext,
        failed_step_id: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        let outcome = self(workflow, context, failed_step_id);
        Box::pin(async move { outcome })
    }
}
