//! Assembly of the [`ExecutionContext`] for one agent turn.
//!
//! Config, tasks, messages and the workspace listing are loaded
//! concurrently; the first failure is reported with the stage it came from.

pub mod store;
pub mod workspace;

use std::fmt;
use std::path::PathBuf;

use tracing::debug;

use crate::model::{AgentMode, ExecutionContext};

pub use store::{ContextStore, FsContextStore};
pub use workspace::list_workspace_files;

/// Which part of the context failed to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
    Config,
    Tasks,
    Messages,
    Workspace,
}

impl fmt::Display for LoadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LoadStage::Config => "config",
            LoadStage::Tasks => "tasks",
            LoadStage::Messages => "messages",
            LoadStage::Workspace => "workspace",
        })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("failed to load {stage} for agent '{agent_id}'")]
pub struct ContextLoadError {
    pub agent_id: String,
    pub stage: LoadStage,
    #[source]
    pub source: anyhow::Error,
}

impl ContextLoadError {
    fn new(agent_id: &str, stage: LoadStage, source: impl Into<anyhow::Error>) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            stage,
            source: source.into(),
        }
    }
}

/// Where the turn runs and how much of the workspace to list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextOptions {
    pub workspace_dir: PathBuf,
    /// Defaults to `workspace_dir`.
    pub working_dir: Option<PathBuf>,
    pub max_files: usize,
    pub max_depth: usize,
}

impl ContextOptions {
    pub const DEFAULT_MAX_FILES: usize = 100;
    pub const DEFAULT_MAX_DEPTH: usize = 3;

    pub fn new(workspace_dir: impl Into<PathBuf>) -> Self {
        Self {
            workspace_dir: workspace_dir.into(),
            working_dir: None,
            max_files: Self::DEFAULT_MAX_FILES,
            max_depth: Self::DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_working_dir(mut self, working_dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(working_dir.into());
        self
    }
}

/// Load everything an adapter needs for one turn of `agent_id`.
///
/// The three store reads and the (blocking) workspace walk run
/// concurrently. No containment check happens here; the adapter rejects a
/// working directory outside the workspace before spawning anything.
pub async fn load_execution_context(
    store: &dyn ContextStore,
    agent_id: &str,
    mode: AgentMode,
    options: &ContextOptions,
) -> Result<ExecutionContext, ContextLoadError> {
    let root = options.workspace_dir.clone();
    let (max_files, max_depth) = (options.max_files, options.max_depth);
    let listing =
        tokio::task::spawn_blocking(move || list_workspace_files(&root, max_files, max_depth));

    let (config, tasks, messages, files) = tokio::join!(
        store.load_config(agent_id),
        store.load_active_tasks(agent_id),
        store.load_unread_messages(agent_id),
        listing
    );

    let config = config.map_err(|e| ContextLoadError::new(agent_id, LoadStage::Config, e))?;
    let active_tasks = tasks.map_err(|e| ContextLoadError::new(agent_id, LoadStage::Tasks, e))?;
    let messages =
        messages.map_err(|e| ContextLoadError::new(agent_id, LoadStage::Messages, e))?;
    let workspace_files =
        files.map_err(|e| ContextLoadError::new(agent_id, LoadStage::Workspace, e))?;

    debug!(
        agent_id,
        tasks = active_tasks.len(),
        messages = messages.len(),
        files = workspace_files.len(),
        "assembled execution context"
    );

    Ok(ExecutionContext {
        agent_id: agent_id.to_string(),
        mode,
        config: Some(config),
        active_tasks,
        messages,
        workspace_files,
        working_dir: options
            .working_dir
            .clone()
            .unwrap_or_else(|| options.workspace_dir.clone()),
        workspace_dir: options.workspace_dir.clone(),
    })
}
