//! Agent capability contract.
//!
//! - `Agent`: RPITIT trait for concrete agent implementations
//! - `BoxAgent`: object-safe wrapper for dynamic dispatch
//! - `AgentRegistry`: resolves an `AgentSpec` to a `BoxAgent` by kind

pub mod box_agent;
pub mod provider;
pub mod registry;

pub use box_agent::BoxAgent;
pub use provider::Agent;
pub use registry::{AgentFactory, AgentRegistry};
