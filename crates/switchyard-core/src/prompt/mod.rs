//! Prompt text for one agent turn.
//!
//! Builders are pure: the same inputs always give the same prompt, and no
//! builder touches the filesystem or the network.

use crate::model::{AgentConfig, ExecutionContext, Message, Task};

/// Turns agent configuration plus pending work into backend prompt text.
pub trait PromptBuilder: Send + Sync {
    /// Prompt for a scheduled turn over the active task list.
    fn continuous(&self, config: &AgentConfig, tasks: &[Task], ctx: &ExecutionContext) -> String;

    /// Prompt for a turn triggered by incoming messages.
    fn reactive(&self, config: &AgentConfig, messages: &[Message], ctx: &ExecutionContext)
    -> String;
}

// Compile-time assertion: PromptBuilder must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn PromptBuilder) {}
};

/// Workspace files listed in a prompt before the rest are summarised.
const MAX_LISTED_FILES: usize = 50;

/// Default plain-text template.
///
/// The prompt ends by asking for a JSON summary with `tasksCompleted` /
/// `messagesProcessed`, which lets the structured parser count completions
/// without falling back to heuristics.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplatePromptBuilder;

impl PromptBuilder for TemplatePromptBuilder {
    fn continuous(&self, config: &AgentConfig, tasks: &[Task], ctx: &ExecutionContext) -> String {
        let task_list = if tasks.is_empty() {
            "No active tasks. Review the workspace and report anything that needs attention."
                .to_string()
        } else {
            tasks
                .iter()
                .map(|t| {
                    let mut line = format!(
                        "- [{id}] {title} (status: {status}, priority: {priority})",
                        id = t.id,
                        title = t.title,
                        status = serde_label(&t.status),
                        priority = serde_label(&t.priority),
                    );
                    if !t.description.trim().is_empty() {
                        line.push_str("\n  ");
                        line.push_str(t.description.trim());
                    }
                    line
                })
                .collect::<Vec<_>>()
                .join("\n")
        };

        format!(
            "{header}\n\n\
             ## Active tasks\n{task_list}\n\n\
             {workspace}\n\n\
             Work through the tasks above in priority order.\n\n\
             When you are done, end your reply with a JSON object in a ```json block:\n\
             {{\"text\": \"<summary>\", \"tasksCompleted\": [\"<task id>\", ...], \
             \"filesCreated\": [...], \"filesModified\": [...]}}",
            header = header(config),
            workspace = workspace_section(ctx),
        )
    }

    fn reactive(
        &self,
        config: &AgentConfig,
        messages: &[Message],
        ctx: &ExecutionContext,
    ) -> String {
        let message_list = if messages.is_empty() {
            "No unread messages.".to_string()
        } else {
            messages
                .iter()
                .map(|m| {
                    format!(
                        "- [{id}] from {from} on #{channel} at {ts}:\n  {content}",
                        id = m.id,
                        from = m.from,
                        channel = if m.channel.is_empty() { "direct" } else { m.channel.as_str() },
                        ts = m.timestamp.to_rfc3339(),
                        content = m.content.trim(),
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        };

        format!(
            "{header}\n\n\
             ## Unread messages\n{message_list}\n\n\
             {workspace}\n\n\
             Respond to each message above.\n\n\
             When you are done, end your reply with a JSON object in a ```json block:\n\
             {{\"text\": \"<summary>\", \"messagesProcessed\": [\"<message id>\", ...], \
             \"filesCreated\": [...], \"filesModified\": [...]}}",
            header = header(config),
            workspace = workspace_section(ctx),
        )
    }
}

fn header(config: &AgentConfig) -> String {
    let mut out = format!("You are {name} (agent id: {id}).", name = config.name, id = config.id);
    if let Some(role) = config.role.as_deref().filter(|r| !r.trim().is_empty()) {
        out.push_str(&format!("\nRole: {}", role.trim()));
    }
    if let Some(instructions) = config
        .instructions
        .as_deref()
        .filter(|i| !i.trim().is_empty())
    {
        out.push_str("\n\n## Instructions\n");
        out.push_str(instructions.trim());
    }
    out
}

fn workspace_section(ctx: &ExecutionContext) -> String {
    let mut out = format!(
        "## Workspace\nRoot: {}\nWorking directory: {}",
        ctx.workspace_dir.display(),
        ctx.working_dir.display(),
    );
    if !ctx.workspace_files.is_empty() {
        out.push_str("\nFiles:");
        for file in ctx.workspace_files.iter().take(MAX_LISTED_FILES) {
            out.push_str("\n  ");
            out.push_str(file);
        }
        let rest = ctx.workspace_files.len().saturating_sub(MAX_LISTED_FILES);
        if rest > 0 {
            out.push_str(&format!("\n  ... and {rest} more"));
        }
    }
    out
}

/// The serde name of a unit enum variant (`in_progress`, `high`, ...).
fn serde_label<T: serde::Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => s,
        _ => String::new(),
    }
}
