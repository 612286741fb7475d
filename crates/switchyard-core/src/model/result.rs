use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Machine-readable codes attached to [`ExecutionError`]s produced by the
/// pipeline itself. Invocation errors carry their own OS-style code instead.
pub mod error_codes {
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const BACKEND_UNAVAILABLE: &str = "BACKEND_UNAVAILABLE";
    pub const SECURITY_VIOLATION: &str = "SECURITY_VIOLATION";
    pub const TIMEOUT: &str = "TIMEOUT";
    pub const EXECUTION_FAILED: &str = "EXECUTION_FAILED";
    pub const SIGNAL: &str = "SIGNAL";

    /// `EXIT_CODE_<n>` for a process that exited non-zero without
    /// recognisable error output.
    pub fn exit_code(code: i32) -> String {
        format!("EXIT_CODE_{code}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
            code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }
}

/// Best-effort extras recovered from backend output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionMetadata {
    pub files_created: Vec<String>,
    pub files_modified: Vec<String>,
    pub api_call_count: u64,
    #[serde(rename = "costUSD")]
    pub cost_usd: f64,
    pub output: String,
}

/// Normalized outcome of one `execute_agent` call.
///
/// `errors` is empty exactly when `success` is true; use the constructors to
/// keep that invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    pub duration_ms: u64,
    pub tasks_completed_count: usize,
    pub messages_processed_count: usize,
    pub errors: Vec<ExecutionError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_execution: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ExecutionMetadata>,
}

impl ExecutionResult {
    pub fn succeeded(duration_ms: u64) -> Self {
        Self {
            success: true,
            duration_ms,
            tasks_completed_count: 0,
            messages_processed_count: 0,
            errors: Vec::new(),
            next_execution: None,
            metadata: None,
        }
    }

    /// A failed result. An empty `errors` list is replaced by a generic
    /// error so that failure always carries at least one entry.
    pub fn failed(duration_ms: u64, mut errors: Vec<ExecutionError>) -> Self {
        if errors.is_empty() {
            errors.push(
                ExecutionError::new("execution failed").with_code(error_codes::EXECUTION_FAILED),
            );
        }
        Self {
            success: false,
            duration_ms,
            tasks_completed_count: 0,
            messages_processed_count: 0,
            errors,
            next_execution: None,
            metadata: None,
        }
    }

    pub fn failed_with(duration_ms: u64, error: ExecutionError) -> Self {
        Self::failed(duration_ms, vec![error])
    }

    /// First error message, if any. Convenient for logging.
    pub fn first_error(&self) -> Option<&str> {
        self.errors.first().map(|e| e.message.as_str())
    }
}
