//! Execution and resilience core for coding-agent CLI backends.
//!
//! An orchestrator assembles an [`model::ExecutionContext`], asks an
//! [`registry::AdapterRegistry`] for a healthy [`adapter::Adapter`], and runs
//! one agent turn through it, getting back a normalized
//! [`model::ExecutionResult`] whatever the backend printed.

pub mod adapter;
pub mod context;
pub mod model;
pub mod parse;
pub mod prompt;
pub mod provider;
pub mod registry;
