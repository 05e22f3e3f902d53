//! Workflow definition errors, validation, and YAML/JSON loading.

use std::collections::HashSet;
use std::path::Path;

use agentflow_types::workflow::Workflow;
use thiserror::Error;

use super::dag::validate_dag;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Configuration errors in a workflow definition.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// YAML/JSON parse failure.
    #[error("parse error: {0}")]
    ParseError(String),

    /// Structural validation failure.
    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("cycle detected: {0}")]
    CycleDetected(String),

    #[error("unknown dependency: {0}")]
    UnknownDependency(String),

    /// Steps whose dependencies can never be satisfied at run time.
    #[error("unsatisfiable dependencies for steps: {}", .0.join(", "))]
    UnsatisfiableDependencies(Vec<String>),
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse and validate a workflow from YAML.
pub fn parse_workflow_yaml(yaml: &str) -> Result<Workflow, WorkflowError> {
    let workflow: Workflow =
        serde_yaml_ng::from_str(yaml).map_err(|e| WorkflowError::ParseError(e.to_string()))?;
    validate_workflow(&workflow)?;
    Ok(workflow)
}

/// Parse and validate a workflow from JSON.
pub fn parse_workflow_json(json: &str) -> Result<Workflow, WorkflowError> {
    let workflow: Workflow =
        serde_json::from_str(json).map_err(|e| WorkflowError::ParseError(e.to_string()))?;
    validate_workflow(&workflow)?;
    Ok(workflow)
}

pub fn serialize_workflow_yaml(workflow: &Workflow) -> Result<String, WorkflowError> {
    serde_yaml_ng::to_string(workflow).map_err(|e| WorkflowError::ParseError(e.to_string()))
}

/// Load a workflow file; `.json` is parsed as JSON, anything else as YAML.
pub fn load_workflow_file(path: &Path) -> Result<Workflow, WorkflowError> {
    let content = std::fs::read_to_string(path)?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => parse_workflow_json(&content),
        _ => parse_workflow_yaml(&content),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate the structure of a workflow.
///
/// Checks: non-empty name, non-empty unique step IDs, no self-dependency,
/// every dependency names a known step, and the graph is acyclic.
pub fn validate_workflow(workflow: &Workflow) -> Result<(), WorkflowError> {
    if workflow.config.name.trim().is_empty() {
        return Err(WorkflowError::ValidationError(
            "workflow name must not be empty".to_string(),
        ));
    }

    validate_step_ids(workflow)?;

    for step in &workflow.steps {
        if step.depends_on.iter().any(|dep| dep == &step.id) {
            return Err(WorkflowError::ValidationError(format!(
                "step '{}' depends on itself",
                step.id
            )));
        }
    }

    validate_dag(&workflow.steps)
}

/// Step IDs must be non-empty and unique.
///
/// The engine runs this check on every execution: results are keyed by step
/// ID, so duplicates cannot be executed meaningfully under any policy.
pub fn validate_step_ids(workflow: &Workflow) -> Result<(), WorkflowError> {
    let mut seen = HashSet::new();
    for step in &workflow.steps {
        if step.id.trim().is_empty() {
            return Err(WorkflowError::ValidationError(format!(
                "step '{}' has an empty id",
                step.name
            )));
        }
        if !seen.insert(step.id.as_str()) {
            return Err(WorkflowError::ValidationError(format!(
                "duplicate step id '{}'",
                step.id
            )));
        }
    }
    Ok(())
}
