//! Workflow orchestration engine for agentflow.
//!
//! Resolves execution order from declarative `depends_on` lists, runs each
//! dependency level sequentially or concurrently, threads step outputs into
//! downstream inputs through `{{ path }}` templates, and applies the
//! workflow's failure policy. Agents are reached only through the
//! capability contract in [`agent`]; the engine never knows how a kind is
//! implemented.

pub mod agent;
pub mod config;
pub mod event;
pub mod workflow;
