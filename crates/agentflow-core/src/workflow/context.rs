//! Per-run execution context and template resolution.
//!
//! An `ExecutionContext` is created fresh by the engine for every run and is
//! never shared between runs. Step inputs of the form `{{ path }}` are
//! resolved against it; every other input value passes through unchanged.
//!
//! Path rules:
//! - If the first segment names a step that has finished, the remaining
//!   segments walk into that step's output. A leading `output` segment is the
//!   accessor for the output itself (`{{ fetch.output.n }}` and
//!   `{{ fetch.n }}` are equivalent), unless the output object has its own
//!   `output` key, in which case the segment is walked literally.
//! - Otherwise the whole path is looked up as a key of `variables`, then as a
//!   nested walk starting at the first segment.
//! - Anything missing resolves to `null`. Resolution never fails.

use std::collections::HashMap;

use agentflow_types::workflow::StepResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Mutable state of one workflow run.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionContext {
    pub run_id: Uuid,
    pub workflow_id: String,
    /// Last step dispatched to an agent.
    pub current_step_id: Option<String>,
    /// Finished steps (completed, skipped or failed) in the order recorded.
    pub completed_steps: Vec<String>,
    /// Output of each step that finished with one.
    pub step_outputs: HashMap<String, Value>,
    /// Caller-supplied input. Read-only for the lifetime of the run.
    variables: HashMap<String, Value>,
    pub started_at: DateTime<Utc>,
}

impl ExecutionContext {
    pub fn new(
        run_id: Uuid,
        workflow_id: impl Into<String>,
        variables: HashMap<String, Value>,
    ) -> Self {
        Self {
            run_id,
            workflow_id: workflow_id.into(),
            current_step_id: None,
            completed_steps: Vec::new(),
            step_outputs: HashMap::new(),
            variables,
            started_at: Utc::now(),
        }
    }

    pub fn variables(&self) -> &HashMap<String, Value> {
        &self.variables
    }

    /// Point `current_step_id` at a step about to be dispatched.
    pub fn mark_started(&mut self, step_id: &str) {
        self.current_step_id = Some(step_id.to_string());
    }

    /// Record a finished step.
    ///
    /// The step joins `completed_steps` whatever its status; only results
    /// carrying an output populate `step_outputs`, so a failed upstream step
    /// resolves to `null` downstream.
    pub fn record(&mut self, step_id: &str, result: &StepResult) {
        if !self.is_completed(step_id) {
            self.completed_steps.push(step_id.to_string());
        }
        match &result.output {
            Some(output) => {
                self.step_outputs.insert(step_id.to_string(), output.clone());
            }
            None => {
                self.step_outputs.remove(step_id);
            }
        }
    }

    pub fn is_completed(&self, step_id: &str) -> bool {
        self.completed_steps.iter().any(|id| id == step_id)
    }

    pub fn get_step_output(&self, step_id: &str) -> Option<&Value> {
        self.step_outputs.get(step_id)
    }

    /// Resolve a dot-separated path against step outputs and variables.
    pub fn resolve_path(&self, path: &str) -> Option<&Value> {
        let path = path.trim();
        let mut segments = path.split('.').map(str::trim);
        let head = segments.next().filter(|s| !s.is_empty())?;

        if self.is_completed(head) || self.step_outputs.contains_key(head) {
            let output = self.step_outputs.get(head)?;
            let mut rest = segments.peekable();
            if rest.peek() == Some(&"output") && output.get("output").is_none() {
                rest.next();
            }
            return walk(output, rest);
        }

        if let Some(value) = self.variables.get(path) {
            return Some(value);
        }
        walk(self.variables.get(head)?, segments)
    }

    /// Resolve every `{{ path }}` input; other values are cloned as-is.
    pub fn resolve_inputs(&self, inputs: &HashMap<String, Value>) -> HashMap<String, Value> {
        inputs
            .iter()
            .map(|(name, value)| {
                let resolved = match template_path(value) {
                    Some(path) => self.resolve_path(path).cloned().unwrap_or(Value::Null),
                    None => value.clone(),
                };
                (name.clone(), resolved)
            })
            .collect()
    }
}

/// Walk nested maps. Non-object intermediate values end the walk.
fn walk<'a, 'p>(root: &'a Value, segments: impl Iterator<Item = &'p str>) -> Option<&'a Value> {
    segments.fold(Some(root), |current, segment| {
        current.and_then(|v| v.as_object()).and_then(|map| map.get(segment))
    })
}

/// The path inside a value that is exactly `{{ path }}`, if any.
///
/// Partial interpolation (`"id-{{ x }}"`) is not a template and yields `None`.
pub fn template_path(value: &Value) -> Option<&str> {
    let text = value.as_str()?.trim();
    let inner = text.strip_prefix("{{")?.strip_suffix("}}")?.trim();
    if inner.is_empty() || inner.contains("{{") || inner.contains("}}") {
        return None;
    }
    Some(inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context_with(vars: Value) -> ExecutionContext {
        let variables = serde_json::from_value(vars).unwrap();
        ExecutionContext::new(Uuid::nil(), "wf", variables)
    }

    fn inputs(value: Value) -> HashMap<String, Value> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn step_output_field_resolves_after_completion() {
        let mut ctx = context_with(json!({}));
        ctx.record("stepA", &StepResult::completed("stepA", json!({"x": 5})));

        let resolved = ctx.resolve_inputs(&inputs(json!({
            "a": "{{stepA.output.x}}",
            "b": "{{ stepA.x }}",
            "whole": "{{stepA.output}}"
        })));
        assert_eq!(resolved["a"], json!(5));
        assert_eq!(resolved["b"], json!(5));
        assert_eq!(resolved["whole"], json!({"x": 5}));
    }

    #[test]
    fn literal_output_key_is_walked() {
        let mut ctx = context_with(json!({}));
        ctx.record(
            "fetch",
            &StepResult::completed("fetch", json!({"output": {"n": 1}})),
        );
        assert_eq!(ctx.resolve_path("fetch.output.n"), Some(&json!(1)));
    }

    #[test]
    fn unfinished_step_resolves_to_null() {
        let ctx = context_with(json!({}));
        let resolved = ctx.resolve_inputs(&inputs(json!({"a": "{{stepA.output.x}}"})));
        assert_eq!(resolved["a"], Value::Null);
    }

    #[test]
    fn failed_step_resolves_to_null() {
        let mut ctx = context_with(json!({}));
        ctx.record("a", &StepResult::failed("a", "boom"));
        assert!(ctx.is_completed("a"));
        assert!(ctx.resolve_path("a.output.x").is_none());
    }

    #[test]
    fn variables_resolve_whole_key_then_nested() {
        let ctx = context_with(json!({
            "n": 0,
            "user.name": "flat",
            "user": {"name": "nested", "tags": ["x"]}
        }));
        assert_eq!(ctx.resolve_path("n"), Some(&json!(0)));
        assert_eq!(ctx.resolve_path("user.name"), Some(&json!("flat")));
        assert_eq!(ctx.resolve_path("user.tags"), Some(&json!(["x"])));
        // Arrays are not indexable by segment
        assert!(ctx.resolve_path("user.tags.0").is_none());
    }

    #[test]
    fn non_template_values_pass_through() {
        let ctx = context_with(json!({"x": 1}));
        let raw = inputs(json!({
            "partial": "id-{{x}}",
            "number": 7,
            "nested": {"t": "{{x}}"},
            "unclosed": "{{x",
            "empty": "{{ }}"
        }));
        assert_eq!(ctx.resolve_inputs(&raw), raw);
    }

    #[test]
    fn resolution_is_idempotent() {
        let mut ctx = context_with(json!({"n": 1}));
        ctx.record("a", &StepResult::completed("a", json!({"v": [1, 2]})));
        let raw = inputs(json!({"n": "{{n}}", "v": "{{a.output.v}}", "lit": true}));

        let first = ctx.resolve_inputs(&raw);
        let second = ctx.resolve_inputs(&raw);
        assert_eq!(first, second);
    }

    #[test]
    fn record_tracks_order_without_duplicates() {
        let mut ctx = context_with(json!({}));
        ctx.mark_started("b");
        ctx.record("b", &StepResult::completed("b", json!(1)));
        ctx.record("a", &StepResult::completed("a", json!(2)));
        ctx.record("b", &StepResult::completed("b", json!(3)));
        assert_eq!(ctx.completed_steps, vec!["b", "a"]);
        assert_eq!(ctx.get_step_output("b"), Some(&json!(3)));
        assert_eq!(ctx.current_step_id.as_deref(), Some("b"));
    }

    #[test]
    fn template_path_extraction() {
        assert_eq!(template_path(&json!("{{ a.b }}")), Some("a.b"));
        assert_eq!(template_path(&json!("  {{a}}  ")), Some("a"));
        assert_eq!(template_path(&json!("{{a}} and {{b}}")), None);
        assert_eq!(template_path(&json!(3)), None);
    }
}
