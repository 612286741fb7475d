use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How an agent turn was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentMode {
    /// Scheduled turn that works through the active task list.
    Continuous,
    /// Turn triggered by incoming messages.
    Reactive,
}

impl AgentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentMode::Continuous => "continuous",
            AgentMode::Reactive => "reactive",
        }
    }
}

impl fmt::Display for AgentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "continuous" => Ok(AgentMode::Continuous),
            "reactive" => Ok(AgentMode::Reactive),
            other => Err(format!("invalid agent mode: {other}")),
        }
    }
}

/// Per-agent configuration, as loaded by the context store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
    /// Standing instructions prepended to every prompt.
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// Cron-like schedule string; only meaningful to the external scheduler.
    #[serde(default)]
    pub schedule: Option<String>,
    /// Any additional keys, preserved verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Blocked,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Whether a task in this status still needs work.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            TaskStatus::Pending | TaskStatus::InProgress | TaskStatus::Blocked
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    #[serde(default)]
    pub parent_task_id: Option<String>,
    #[serde(default)]
    pub delegated_to: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub from: String,
    pub to: String,
    pub content: String,
    #[serde(default)]
    pub channel: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

/// Everything an adapter needs for one agent turn.
///
/// `config` is optional so that an incompletely assembled context can be
/// represented and rejected by validation instead of failing to construct.
/// `working_dir` must equal or lie inside `workspace_dir`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContext {
    pub agent_id: String,
    pub mode: AgentMode,
    pub config: Option<AgentConfig>,
    #[serde(default)]
    pub active_tasks: Vec<Task>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub workspace_files: Vec<String>,
    pub workspace_dir: PathBuf,
    pub working_dir: PathBuf,
}

impl ExecutionContext {
    /// Minimal context rooted at `workspace_dir`, working in the workspace
    /// root, with no tasks or messages.
    pub fn new(
        agent_id: impl Into<String>,
        mode: AgentMode,
        config: AgentConfig,
        workspace_dir: impl Into<PathBuf>,
    ) -> Self {
        let workspace_dir = workspace_dir.into();
        Self {
            agent_id: agent_id.into(),
            mode,
            config: Some(config),
            active_tasks: Vec::new(),
            messages: Vec::new(),
            workspace_files: Vec::new(),
            working_dir: workspace_dir.clone(),
            workspace_dir,
        }
    }
}
