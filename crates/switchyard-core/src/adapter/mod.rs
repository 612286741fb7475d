//! Backend adapters for coding-agent CLIs.
//!
//! This module defines the [`Adapter`] trait that every backend implements,
//! the profile-driven [`CliAdapter`] reference implementation, and the
//! process, retry and security building blocks it is assembled from.
//!
//! # Architecture
//!
//! ```text
//! AdapterRegistry --get_healthy_adapter("claude-code")--> Arc<dyn Adapter>
//!                                                              |
//!                              execute_agent(id, mode, ctx) ---+
//!                                     |
//!                                     v
//!   CliAdapter { BackendProfile, AdapterConfig, ProviderEnv }
//!        |  probe      -> CommandRunner::run(binary --version)
//!        |  security   -> ensure_contained / validate_prompt
//!        |  invoke     -> run_with_retry(CommandRunner::run(binary args.. prompt))
//!        v
//!   parse::{parse_stdout, parse_failure} --> ExecutionResult
//! ```

pub mod cli_adapter;
pub mod config;
pub mod process;
pub mod profile;
pub mod retry;
pub mod security;
pub mod trait_def;

// Re-export the primary public API at the module level.
pub use cli_adapter::CliAdapter;
pub use config::AdapterConfig;
pub use process::{CommandRunner, CommandSpec, InvocationError, ProcessOutput, TokioCommandRunner};
pub use profile::BackendProfile;
pub use retry::{RetryPolicy, is_retryable, run_with_retry};
pub use security::SecurityError;
pub use trait_def::Adapter;
