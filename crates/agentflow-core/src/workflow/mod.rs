//! Workflow engine core.
//!
//! - `definition` -- errors, validation, YAML/JSON loading
//! - `builder` -- fluent construction of `Workflow` values
//! - `dag` -- dependency levels and cycle detection
//! - `context` -- per-run state and `{{ path }}` template resolution
//! - `condition` -- step condition evaluation
//! - `retry` -- attempt counting and backoff
//! - `step_runner` -- executes one step against its agent
//! - `batch` -- executes one dependency level
//! - `rollback` -- caller-supplied compensation hook
//! - `run_registry` -- in-flight runs keyed by run id
//! - `engine` -- drives a full run and applies the failure policy

pub mod batch;
pub mod builder;
pub mod condition;
pub mod context;
pub mod dag;
pub mod definition;
pub mod engine;
pub mod retry;
pub mod rollback;
pub mod run_registry;
pub mod step_runner;

#[cfg(test)]
pub(crate) mod testing;

pub use builder::{StepBuilder, WorkflowBuilder};
pub use context::ExecutionContext;
pub use definition::WorkflowError;
pub use engine::{EngineError, WorkflowEngine};
pub use rollback::RollbackHook;
pub use run_registry::RunHandle;
