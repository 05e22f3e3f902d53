//! Shared domain types for agentflow.
//!
//! This crate contains the data model used across the workflow engine:
//! workflow and step definitions, execution results, agent specifications,
//! engine configuration, and run events.
//!
//! No runtime dependencies beyond serde, serde_json, uuid, chrono, thiserror.

pub mod agent;
pub mod config;
pub mod event;
pub mod workflow;
