//! Observability setup for agentflow.
//!
//! The engine itself only emits `tracing` events and spans; binaries that
//! embed it call [`tracing_setup::init_tracing`] once at startup.

pub mod tracing_setup;

pub use tracing_setup::{init_tracing, shutdown_tracing};
