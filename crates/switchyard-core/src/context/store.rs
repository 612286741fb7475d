//! Where agent configuration, tasks and messages come from.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::model::{AgentConfig, Message, Task};

/// Read-only source of per-agent state.
#[async_trait]
pub trait ContextStore: Send + Sync {
    async fn load_config(&self, agent_id: &str) -> Result<AgentConfig>;

    /// Tasks whose status still needs work.
    async fn load_active_tasks(&self, agent_id: &str) -> Result<Vec<Task>>;

    /// Unread messages addressed to the agent.
    async fn load_unread_messages(&self, agent_id: &str) -> Result<Vec<Message>>;
}

// Compile-time assertion: ContextStore must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn ContextStore) {}
};

/// Directory-per-agent store:
///
/// ```text
/// <root>/<agent_id>/config.toml
/// <root>/<agent_id>/tasks.json      (optional, JSON array)
/// <root>/<agent_id>/messages.json   (optional, JSON array)
/// ```
#[derive(Debug, Clone)]
pub struct FsContextStore {
    root: PathBuf,
}

impl FsContextStore {
    pub const CONFIG_FILE: &'static str = "config.toml";
    pub const TASKS_FILE: &'static str = "tasks.json";
    pub const MESSAGES_FILE: &'static str = "messages.json";

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn agent_dir(&self, agent_id: &str) -> PathBuf {
        self.root.join(agent_id)
    }

    /// Parse a JSON array file; a missing file is an empty list.
    async fn read_list<T: DeserializeOwned>(&self, agent_id: &str, file: &str) -> Result<Vec<T>> {
        let path = self.agent_dir(agent_id).join(file);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no file, treating as empty");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()));
            }
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
    }
}

#[async_trait]
impl ContextStore for FsContextStore {
    async fn load_config(&self, agent_id: &str) -> Result<AgentConfig> {
        let path = self.agent_dir(agent_id).join(Self::CONFIG_FILE);
        let raw = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read agent config {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed to parse agent config {}", path.display()))
    }

    async fn load_active_tasks(&self, agent_id: &str) -> Result<Vec<Task>> {
        let tasks: Vec<Task> = self.read_list(agent_id, Self::TASKS_FILE).await?;
        Ok(tasks.into_iter().filter(|t| t.status.is_active()).collect())
    }

    async fn load_unread_messages(&self, agent_id: &str) -> Result<Vec<Message>> {
        let messages: Vec<Message> = self.read_list(agent_id, Self::MESSAGES_FILE).await?;
        Ok(messages
            .into_iter()
            .filter(|m| !m.read && m.to == agent_id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TaskStatus;

    fn write(dir: &Path, name: &str, body: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join(name), body).unwrap();
    }

    #[tokio::test]
    async fn loads_config_with_extra_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsContextStore::new(tmp.path());
        write(
            &store.agent_dir("a1"),
            "config.toml",
            "id = \"a1\"\nname = \"Agent One\"\nrole = \"reviewer\"\nteam = \"core\"\n",
        );

        let config = store.load_config("a1").await.unwrap();
        assert_eq!(config.name, "Agent One");
        assert_eq!(config.role.as_deref(), Some("reviewer"));
        assert_eq!(config.extra.get("team"), Some(&serde_json::json!("core")));
    }

    #[tokio::test]
    async fn missing_config_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsContextStore::new(tmp.path());
        let err = store.load_config("ghost").await.unwrap_err();
        assert!(err.to_string().contains("failed to read agent config"));
    }

    #[tokio::test]
    async fn missing_lists_are_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsContextStore::new(tmp.path());
        assert!(store.load_active_tasks("a1").await.unwrap().is_empty());
        assert!(store.load_unread_messages("a1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn only_active_tasks_are_returned() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsContextStore::new(tmp.path());
        write(
            &store.agent_dir("a1"),
            "tasks.json",
            r#"[
              {"id":"t1","title":"a","status":"pending","priority":"low",
               "createdAt":"2026-01-01T00:00:00Z","updatedAt":"2026-01-01T00:00:00Z"},
              {"id":"t2","title":"b","status":"completed","priority":"low",
               "createdAt":"2026-01-01T00:00:00Z","updatedAt":"2026-01-01T00:00:00Z"},
              {"id":"t3","title":"c","status":"blocked","priority":"high",
               "createdAt":"2026-01-01T00:00:00Z","updatedAt":"2026-01-01T00:00:00Z"}
            ]"#,
        );

        let tasks = store.load_active_tasks("a1").await.unwrap();
        let ids: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t3"]);
        assert!(tasks.iter().all(|t| t.status != TaskStatus::Completed));
    }

    #[tokio::test]
    async fn only_unread_messages_for_the_agent() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsContextStore::new(tmp.path());
        write(
            &store.agent_dir("a1"),
            "messages.json",
            r#"[
              {"id":"m1","from":"lead","to":"a1","content":"hi","timestamp":"2026-01-01T00:00:00Z"},
              {"id":"m2","from":"lead","to":"a1","content":"old","timestamp":"2026-01-01T00:00:00Z","read":true},
              {"id":"m3","from":"lead","to":"a2","content":"not yours","timestamp":"2026-01-01T00:00:00Z"}
            ]"#,
        );

        let messages = store.load_unread_messages("a1").await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "m1");
    }

    #[tokio::test]
    async fn malformed_list_names_the_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsContextStore::new(tmp.path());
        write(&store.agent_dir("a1"), "tasks.json", "{not json");
        let err = store.load_active_tasks("a1").await.unwrap_err();
        assert!(err.to_string().contains("tasks.json"));
    }
}
