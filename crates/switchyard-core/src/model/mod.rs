//! Value types passed into and out of an adapter.
//!
//! Nothing in here has behaviour beyond construction helpers and small
//! predicates; every component above this module consumes these types.

pub mod capability;
pub mod context;
pub mod result;

pub use capability::{Capability, Feature, UnknownFeature};
pub use context::{
    AgentConfig, AgentMode, ExecutionContext, Message, Task, TaskPriority, TaskStatus,
};
pub use result::{ExecutionError, ExecutionMetadata, ExecutionResult, error_codes};
