//! Shared test utilities for switchyard integration tests.
//!
//! Two ways to fake a backend:
//! - **[`ScriptedRunner`]**: an in-process [`CommandRunner`] that answers
//!   health probes and main invocations from a script and records every
//!   call. Use it to count invocations and inject invocation errors.
//! - **[`write_fake_backend`]**: a real executable shell script, for tests
//!   that exercise process spawning, timeouts and exit codes end to end.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use switchyard_core::adapter::{
    AdapterConfig, BackendProfile, CliAdapter, CommandRunner, CommandSpec, InvocationError,
    ProcessOutput,
};
use switchyard_core::model::{
    AgentConfig, AgentMode, ExecutionContext, Message, Task, TaskPriority, TaskStatus,
};
use switchyard_core::provider::{Provider, ProviderEnv};

/// Credential placed in [`test_provider`].
pub const TEST_API_KEY: &str = "sk-test-key";

type Response = Result<ProcessOutput, InvocationError>;

// ---------------------------------------------------------------------------
// Scripted runner
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Script {
    probe: Option<Response>,
    main: VecDeque<Response>,
    calls: Vec<CommandSpec>,
}

/// A [`CommandRunner`] that plays back scripted responses.
///
/// A call whose arguments equal the probe arguments (`--version` by
/// default) gets the probe response; every other call takes the next main
/// response. The last main response repeats once the queue is down to one,
/// so a single transient error scripts "fails forever".
#[derive(Clone)]
pub struct ScriptedRunner {
    probe_args: Vec<String>,
    script: Arc<Mutex<Script>>,
}

impl Default for ScriptedRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedRunner {
    /// Healthy probe, and main invocations that succeed with `{}`.
    pub fn new() -> Self {
        let script = Script {
            probe: Some(Ok(stdout("2.0.0 (Claude Code)"))),
            ..Script::default()
        };
        Self {
            probe_args: vec!["--version".to_string()],
            script: Arc::new(Mutex::new(script)),
        }
    }

    pub fn with_probe(self, response: Response) -> Self {
        self.script.lock().unwrap().probe = Some(response);
        self
    }

    /// Queue a main-invocation response.
    pub fn then(self, response: Response) -> Self {
        self.script.lock().unwrap().main.push_back(response);
        self
    }

    pub fn then_stdout(self, out: &str) -> Self {
        self.then(Ok(stdout(out)))
    }

    pub fn then_error(self, code: Option<&str>, message: &str) -> Self {
        self.then(Err(InvocationError::failed(code, message)))
    }

    /// Every recorded call, probes included, in order.
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn total_calls(&self) -> usize {
        self.script.lock().unwrap().calls.len()
    }

    pub fn probe_calls(&self) -> usize {
        self.calls().iter().filter(|c| self.is_probe(c)).count()
    }

    pub fn main_calls(&self) -> usize {
        self.calls().iter().filter(|c| !self.is_probe(c)).count()
    }

    fn is_probe(&self, spec: &CommandSpec) -> bool {
        spec.args == self.probe_args
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput, InvocationError> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(spec.clone());
        if self.is_probe(spec) {
            return script
                .probe
                .clone()
                .unwrap_or_else(|| Ok(stdout("2.0.0")));
        }
        match script.main.len() {
            0 => Ok(stdout("{}")),
            1 => script.main[0].clone(),
            _ => script.main.pop_front().unwrap_or_else(|| Ok(stdout("{}"))),
        }
    }
}

/// Successful output with the given stdout.
pub fn stdout(out: &str) -> ProcessOutput {
    ProcessOutput {
        exit_code: Some(0),
        stdout: out.to_string(),
        stderr: String::new(),
    }
}

/// Non-zero exit with the given stderr.
pub fn exit_with(code: i32, stderr: &str) -> ProcessOutput {
    ProcessOutput {
        exit_code: Some(code),
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Adapters
// ---------------------------------------------------------------------------

/// Provider environment with a credential, independent of the real env.
pub fn test_provider() -> ProviderEnv {
    ProviderEnv {
        provider: Provider::AnthropicDirect,
        base_url: "http://127.0.0.1:9".to_string(),
        credential: TEST_API_KEY.to_string(),
    }
}

/// Claude Code adapter wired to `runner`, with default timeouts and retries.
pub fn scripted_adapter(runner: &ScriptedRunner) -> CliAdapter {
    CliAdapter::claude_code()
        .with_config(AdapterConfig::default())
        .with_provider(test_provider())
        .with_runner(Arc::new(runner.clone()))
}

/// Adapter named `name` that spawns the script at `binary`.
pub fn script_adapter(name: &str, binary: &Path) -> CliAdapter {
    let profile = BackendProfile::claude_code()
        .with_name(name)
        .with_binary(binary.to_string_lossy());
    CliAdapter::new(profile)
        .with_config(AdapterConfig::default())
        .with_provider(test_provider())
}

// ---------------------------------------------------------------------------
// Fake backend scripts
// ---------------------------------------------------------------------------

/// Write an executable `/bin/sh` script called `name` into `dir`.
///
/// The script answers `--version` with a version string and otherwise runs
/// `body`. The prompt is available as the last positional argument.
pub fn write_fake_backend(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    let script = format!(
        "#!/bin/sh\n\
         if [ \"$1\" = \"--version\" ]; then echo \"2.0.0 (fake)\"; exit 0; fi\n\
         {body}\n"
    );
    std::fs::write(&path, script).unwrap();

    // Make executable.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
    path
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn sample_config(agent_id: &str) -> AgentConfig {
    AgentConfig {
        id: agent_id.to_string(),
        name: format!("Agent {agent_id}"),
        role: Some("engineer".to_string()),
        ..AgentConfig::default()
    }
}

pub fn sample_task(id: &str, status: TaskStatus) -> Task {
    let ts = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    Task {
        id: id.to_string(),
        title: format!("Task {id}"),
        description: String::new(),
        status,
        priority: TaskPriority::Medium,
        parent_task_id: None,
        delegated_to: None,
        created_at: ts,
        updated_at: ts,
    }
}

pub fn sample_message(id: &str, to: &str, content: &str) -> Message {
    Message {
        id: id.to_string(),
        from: "lead".to_string(),
        to: to.to_string(),
        content: content.to_string(),
        channel: "general".to_string(),
        timestamp: Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap(),
        read: false,
    }
}

/// A valid context rooted at `workspace`.
pub fn sample_context(agent_id: &str, mode: AgentMode, workspace: &Path) -> ExecutionContext {
    ExecutionContext::new(agent_id, mode, sample_config(agent_id), workspace)
}
