//! Dependency levels and cycle detection.
//!
//! `build_levels` groups steps into ordered levels: every step in level `k`
//! depends only on steps in levels `0..k`, and every step lands in the
//! earliest level its dependencies allow. Steps that can never be scheduled
//! (cycle, unknown or self dependency) are reported instead of raising, so
//! the engine can apply its dependency policy. `validate_dag` is the strict
//! check used when a definition is built or loaded.

use std::collections::{HashMap, HashSet};

use agentflow_types::workflow::WorkflowStep;
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;

use super::definition::WorkflowError;

// ---------------------------------------------------------------------------
// Level plan
// ---------------------------------------------------------------------------

/// Scheduling plan for one run.
#[derive(Debug)]
pub struct LevelPlan<'a> {
    /// Levels in execution order; steps keep their definition order within a level.
    pub levels: Vec<Vec<&'a WorkflowStep>>,
    /// IDs of steps that could not be placed in any level, in definition order.
    pub unreachable: Vec<String>,
}

impl LevelPlan<'_> {
    pub fn is_complete(&self) -> bool {
        self.unreachable.is_empty()
    }

    pub fn step_count(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }
}

/// Group steps into maximal dependency levels.
///
/// Repeatedly scans the remaining steps and collects every step whose
/// dependencies are all already placed. A scan that collects nothing while
/// steps remain ends planning; those steps are returned as unreachable.
pub fn build_levels(steps: &[WorkflowStep]) -> LevelPlan<'_> {
    let mut placed: HashSet<&str> = HashSet::with_capacity(steps.len());
    let mut remaining: Vec<&WorkflowStep> = steps.iter().collect();
    let mut levels = Vec::new();

    while !remaining.is_empty() {
        let (ready, blocked): (Vec<&WorkflowStep>, Vec<&WorkflowStep>) = remaining
            .into_iter()
            .partition(|step| step.depends_on.iter().all(|dep| placed.contains(dep.as_str())));

        if ready.is_empty() {
            let unreachable: Vec<String> = blocked.iter().map(|s| s.id.clone()).collect();
            tracing::warn!(
                steps = ?unreachable,
                "dependencies can never be satisfied (cycle or missing step)"
            );
            return LevelPlan { levels, unreachable };
        }

        placed.extend(ready.iter().map(|s| s.id.as_str()));
        levels.push(ready);
        remaining = blocked;
    }

    LevelPlan {
        levels,
        unreachable: Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// DAG validation
// ---------------------------------------------------------------------------

/// Verify that all dependencies exist and the graph has no cycle.
pub fn validate_dag(steps: &[WorkflowStep]) -> Result<(), WorkflowError> {
    let id_to_idx: HashMap<&str, usize> = steps
        .iter()
        .enumerate()
        .map(|(i, s)| (s.id.as_str(), i))
        .collect();

    let mut graph = DiGraph::<&str, ()>::new();
    let node_indices: Vec<_> = steps.iter().map(|s| graph.add_node(s.id.as_str())).collect();

    for (to_idx, step) in steps.iter().enumerate() {
        for dep in &step.depends_on {
            let from_idx = id_to_idx.get(dep.as_str()).ok_or_else(|| {
                WorkflowError::UnknownDependency(format!(
                    "step '{}' depends on unknown step '{}'",
                    step.id, dep
                ))
            })?;
            graph.add_edge(node_indices[*from_idx], node_indices[to_idx], ());
        }
    }

    toposort(&graph, None).map_err(|cycle| {
        let node_id = graph[cycle.node_id()];
        WorkflowError::CycleDetected(format!("cycle detected involving step '{node_id}'"))
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use agentflow_types::agent::{AgentSpec, TaskAgentConfig};

    fn step(id: &str, deps: &[&str]) -> WorkflowStep {
        WorkflowStep {
            id: id.to_string(),
            name: id.to_string(),
            agent: AgentSpec::Task(TaskAgentConfig::new(id, "noop")),
            inputs: HashMap::new(),
            depends_on: deps.iter().map(|d| d.to_string()).collect(),
            condition: None,
            timeout: None,
            retry_on_failure: false,
        }
    }

    fn ids(plan: &LevelPlan<'_>) -> Vec<Vec<String>> {
        plan.levels
            .iter()
            .map(|level| level.iter().map(|s| s.id.clone()).collect())
            .collect()
    }

    fn level_of(plan: &LevelPlan<'_>, id: &str) -> usize {
        plan.levels
            .iter()
            .position(|level| level.iter().any(|s| s.id == id))
            .unwrap()
    }

    #[test]
    fn empty_workflow_has_no_levels() {
        let plan = build_levels(&[]);
        assert!(plan.levels.is_empty());
        assert!(plan.is_complete());
    }

    #[test]
    fn linear_chain_is_one_step_per_level() {
        let steps = vec![step("a", &[]), step("b", &["a"]), step("c", &["b"])];
        let plan = build_levels(&steps);
        assert_eq!(ids(&plan), vec![vec!["a"], vec!["b"], vec!["c"]]);
    }

    #[test]
    fn diamond_groups_siblings() {
        let steps = vec![
            step("a", &[]),
            step("b", &["a"]),
            step("c", &["a"]),
            step("d", &["b", "c"]),
        ];
        let plan = build_levels(&steps);
        assert_eq!(ids(&plan), vec![vec!["a"], vec!["b", "c"], vec!["d"]]);
    }

    #[test]
    fn definition_order_does_not_matter() {
        let steps = vec![step("score", &["enrich"]), step("enrich", &["fetch"]), step("fetch", &[])];
        let plan = build_levels(&steps);
        assert_eq!(ids(&plan), vec![vec!["fetch"], vec!["enrich"], vec!["score"]]);
    }

    #[test]
    fn levels_are_topological_and_maximal() {
        let steps = vec![
            step("a", &[]),
            step("b", &[]),
            step("c", &["a"]),
            step("d", &["c", "b"]),
            step("e", &["a"]),
            step("f", &["d", "e"]),
            step("g", &["b"]),
        ];
        let plan = build_levels(&steps);
        assert!(plan.is_complete());
        assert_eq!(plan.step_count(), steps.len());

        for s in &steps {
            let own = level_of(&plan, &s.id);
            let expected = s
                .depends_on
                .iter()
                .map(|d| level_of(&plan, d) + 1)
                .max()
                .unwrap_or(0);
            // Strictly after every dependency, and no later than necessary
            assert_eq!(own, expected, "step {}", s.id);
        }
    }

    #[test]
    fn cycle_reports_unreachable_steps() {
        let steps = vec![
            step("a", &[]),
            step("b", &["c"]),
            step("c", &["b"]),
            step("d", &["b"]),
        ];
        let plan = build_levels(&steps);
        assert_eq!(ids(&plan), vec![vec!["a"]]);
        assert_eq!(plan.unreachable, vec!["b", "c", "d"]);
    }

    #[test]
    fn missing_and_self_dependencies_are_unreachable() {
        let steps = vec![step("a", &["ghost"]), step("b", &["b"]), step("c", &[])];
        let plan = build_levels(&steps);
        assert_eq!(ids(&plan), vec![vec!["c"]]);
        assert_eq!(plan.unreachable, vec!["a", "b"]);
    }

    #[test]
    fn validate_dag_detects_problems() {
        assert!(validate_dag(&[step("a", &[]), step("b", &["a"])]).is_ok());

        let err = validate_dag(&[step("a", &["b"]), step("b", &["a"])]).unwrap_err();
        assert!(matches!(err, WorkflowError::CycleDetected(_)));

        let err = validate_dag(&[step("a", &["ghost"])]).unwrap_err();
        assert!(err.to_string().contains("unknown step 'ghost'"));
    }
}
