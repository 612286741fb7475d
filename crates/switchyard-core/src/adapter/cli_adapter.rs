//! Adapter for coding-agent CLIs described by a [`BackendProfile`].
//!
//! One call to [`CliAdapter::execute_agent`] runs this pipeline, strictly in
//! order, stopping at the first failure:
//!
//! ```text
//! validate -> health probe -> path containment -> build + check prompt
//!          -> invoke with timeout and retry -> parse
//! ```

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use super::config::AdapterConfig;
use super::process::{CommandRunner, CommandSpec, InvocationError, ProcessOutput, TokioCommandRunner};
use super::profile::BackendProfile;
use super::retry::run_with_retry;
use super::security::{ensure_contained, validate_prompt};
use super::trait_def::Adapter;
use crate::model::{
    AgentConfig, AgentMode, Capability, ExecutionContext, ExecutionError, ExecutionResult,
    Feature, Message, Task, error_codes,
};
use crate::parse::{count_completed_tasks, count_processed_messages, parse_failure, parse_stdout};
use crate::prompt::{PromptBuilder, TemplatePromptBuilder};
use crate::provider::ProviderEnv;

/// Generic adapter that drives any CLI engine through its profile.
#[derive(Clone)]
pub struct CliAdapter {
    profile: BackendProfile,
    config: AdapterConfig,
    provider: ProviderEnv,
    runner: Arc<dyn CommandRunner>,
    prompts: Arc<dyn PromptBuilder>,
}

impl fmt::Debug for CliAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CliAdapter")
            .field("profile", &self.profile.name)
            .field("binary", &self.profile.binary)
            .field("config", &self.config)
            .field("provider", &self.provider)
            .finish()
    }
}

impl CliAdapter {
    /// Adapter for `profile`, configured from the process environment and
    /// spawning real processes.
    pub fn new(profile: BackendProfile) -> Self {
        Self {
            profile,
            config: AdapterConfig::from_env(),
            provider: ProviderEnv::from_env(),
            runner: Arc::new(TokioCommandRunner),
            prompts: Arc::new(TemplatePromptBuilder),
        }
    }

    /// The built-in Claude Code adapter.
    pub fn claude_code() -> Self {
        Self::new(BackendProfile::claude_code())
    }

    pub fn with_config(mut self, config: AdapterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_provider(mut self, provider: ProviderEnv) -> Self {
        self.provider = provider;
        self
    }

    /// Replace the process runner. Tests use this to script backend
    /// behaviour and count invocations.
    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_prompt_builder(mut self, prompts: Arc<dyn PromptBuilder>) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn profile(&self) -> &BackendProfile {
        &self.profile
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Command construction
    // -----------------------------------------------------------------------

    /// Overlay applied to every spawned process, probe included.
    fn provider_env(&self, spec: CommandSpec) -> CommandSpec {
        spec.env("CI", "1")
            .env(&self.profile.base_url_var, &self.provider.base_url)
            .env(&self.profile.credential_var, &self.provider.credential)
    }

    fn probe_command(&self) -> CommandSpec {
        self.provider_env(
            CommandSpec::new(&self.profile.binary, self.config.health_timeout)
                .args(&self.profile.version_args),
        )
    }

    /// The main invocation; the prompt is always the last argument.
    fn main_command(&self, prompt: &str, working_dir: &Path) -> CommandSpec {
        self.provider_env(
            CommandSpec::new(&self.profile.binary, self.config.timeout)
                .args(&self.profile.args)
                .arg(prompt)
                .current_dir(working_dir),
        )
    }

    // -----------------------------------------------------------------------
    // Pipeline stages
    // -----------------------------------------------------------------------

    /// Run the version command. Healthy iff a credential is configured, the
    /// command exits 0, and it prints something.
    async fn probe(&self) -> Result<bool, InvocationError> {
        if !self.provider.has_credential() {
            debug!(
                provider = %self.provider.provider,
                credential_var = %self.profile.credential_var,
                "no provider credential configured"
            );
            return Ok(false);
        }
        let output = self.runner.run(&self.probe_command()).await?;
        let healthy = output.success() && !output.stdout.trim().is_empty();
        if !healthy {
            debug!(
                exit_code = ?output.exit_code,
                stderr = %output.stderr.trim(),
                "health probe failed"
            );
        }
        Ok(healthy)
    }

    async fn run_pipeline(
        &self,
        agent_id: &str,
        mode: AgentMode,
        context: &ExecutionContext,
    ) -> ExecutionResult {
        let started = Instant::now();
        let elapsed_ms = || started.elapsed().as_millis() as u64;

        let config = match validate(agent_id, context) {
            Ok(config) => config,
            Err(error) => {
                warn!(error = %error.message, "rejecting invalid execution context");
                return ExecutionResult::failed_with(elapsed_ms(), error);
            }
        };

        let healthy = match self.probe().await {
            Ok(healthy) => healthy,
            Err(e) => {
                debug!(error = %e, "health probe could not run");
                false
            }
        };
        if !healthy {
            let error = ExecutionError::new(format!("{} is unavailable", self.profile.display_name))
                .with_code(error_codes::BACKEND_UNAVAILABLE);
            warn!(error = %error.message, "backend failed health gate");
            return ExecutionResult::failed_with(elapsed_ms(), error);
        }

        if let Err(e) = ensure_contained(&context.working_dir, &context.workspace_dir) {
            warn!(error = %e, "working directory escapes workspace");
            return ExecutionResult::failed_with(elapsed_ms(), security_violation(e));
        }

        let prompt = match mode {
            AgentMode::Continuous => self.prompts.continuous(config, &context.active_tasks, context),
            AgentMode::Reactive => self.prompts.reactive(config, &context.messages, context),
        };
        if let Err(e) = validate_prompt(&prompt) {
            warn!(error = %e, "refusing to send prompt");
            return ExecutionResult::failed_with(elapsed_ms(), security_violation(e));
        }

        let spec = self.main_command(&prompt, &context.working_dir);
        let spec = &spec;
        let runner = &self.runner;
        let outcome = run_with_retry(&self.config.retry, move |attempt| async move {
            debug!(attempt, binary = %spec.program, "invoking backend");
            runner.run(spec).await
        })
        .await;

        let result = match outcome {
            Ok(output) => self.interpret(mode, context, output, elapsed_ms()).await,
            Err(InvocationError::TimedOut { .. }) => ExecutionResult::failed_with(
                elapsed_ms(),
                ExecutionError::new(format!(
                    "execution timed out after {} seconds",
                    self.config.timeout.as_secs()
                ))
                .with_code(error_codes::TIMEOUT),
            ),
            Err(e) => {
                let code = e.code().unwrap_or(error_codes::EXECUTION_FAILED).to_string();
                ExecutionResult::failed_with(
                    elapsed_ms(),
                    ExecutionError::new(e.to_string()).with_code(code),
                )
            }
        };

        if result.success {
            info!(
                duration_ms = result.duration_ms,
                tasks_completed = result.tasks_completed_count,
                messages_processed = result.messages_processed_count,
                "agent turn succeeded"
            );
        } else {
            warn!(
                duration_ms = result.duration_ms,
                error = result.first_error().unwrap_or_default(),
                "agent turn failed"
            );
        }
        result
    }

    /// Turn captured output into a result.
    ///
    /// Parsing and the completion heuristics scan the whole output, which can
    /// run to megabytes, so they run on the blocking pool.
    async fn interpret(
        &self,
        mode: AgentMode,
        context: &ExecutionContext,
        output: ProcessOutput,
        duration_ms: u64,
    ) -> ExecutionResult {
        let display_name = self.profile.display_name.clone();
        let work = match mode {
            AgentMode::Continuous => PendingWork::Tasks(context.active_tasks.clone()),
            AgentMode::Reactive => PendingWork::Messages(context.messages.clone()),
        };
        let span = tracing::Span::current();
        let interpreted = tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            interpret_output(&display_name, &work, &output, duration_ms)
        })
        .await;
        interpreted.unwrap_or_else(|e| {
            warn!(error = %e, "output interpretation did not finish");
            ExecutionResult::failed_with(
                duration_ms,
                ExecutionError::new(format!("failed to interpret backend output: {e}"))
                    .with_code(error_codes::EXECUTION_FAILED),
            )
        })
    }
}

/// What the turn was asked to handle.
enum PendingWork {
    Tasks(Vec<Task>),
    Messages(Vec<Message>),
}

fn interpret_output(
    display_name: &str,
    work: &PendingWork,
    output: &ProcessOutput,
    duration_ms: u64,
) -> ExecutionResult {
    if !output.success() {
        let errors = parse_failure(output.exit_code, &output.stdout, &output.stderr, display_name);
        return ExecutionResult::failed(duration_ms, errors);
    }

    let parsed = parse_stdout(&output.stdout);
    debug!(source = ?parsed.source, "parsed backend output");

    let mut result = ExecutionResult::succeeded(duration_ms);
    match work {
        PendingWork::Tasks(tasks) => {
            result.tasks_completed_count = count_completed_tasks(&parsed, tasks);
        }
        PendingWork::Messages(messages) => {
            result.messages_processed_count = count_processed_messages(&parsed, messages);
        }
    }
    result.next_execution = parsed.next_execution;
    result.metadata = Some(parsed.to_metadata(&output.stdout));
    result
}

/// Required fields, checked in order; the first one missing is reported.
fn validate<'a>(
    agent_id: &str,
    context: &'a ExecutionContext,
) -> Result<&'a AgentConfig, ExecutionError> {
    let missing = |field: &str| {
        ExecutionError::new(format!("execution context must have {field}"))
            .with_code(error_codes::VALIDATION_ERROR)
    };

    if agent_id.trim().is_empty() || context.agent_id.trim().is_empty() {
        return Err(missing("agent_id"));
    }
    let Some(config) = context.config.as_ref() else {
        return Err(missing("config"));
    };
    if context.workspace_dir.as_os_str().is_empty() {
        return Err(missing("workspace_dir"));
    }
    if context.working_dir.as_os_str().is_empty() {
        return Err(missing("working_dir"));
    }
    if agent_id != context.agent_id {
        warn!(context_agent_id = %context.agent_id, "agent id argument differs from context");
    }
    Ok(config)
}

fn security_violation(err: super::security::SecurityError) -> ExecutionError {
    ExecutionError::new(format!("security violation: {err}"))
        .with_code(error_codes::SECURITY_VIOLATION)
}

#[async_trait]
impl Adapter for CliAdapter {
    fn name(&self) -> &str {
        &self.profile.name
    }

    fn version(&self) -> &str {
        &self.profile.version
    }

    async fn execute_agent(
        &self,
        agent_id: &str,
        mode: AgentMode,
        context: &ExecutionContext,
    ) -> ExecutionResult {
        let invocation_id = Uuid::new_v4();
        let span = info_span!(
            "execute_agent",
            adapter = %self.profile.name,
            agent_id,
            mode = %mode,
            %invocation_id
        );
        self.run_pipeline(agent_id, mode, context)
            .instrument(span)
            .await
    }

    fn supports_feature(&self, feature: Feature) -> bool {
        self.profile.features.contains(&feature)
    }

    fn capabilities(&self) -> Vec<Capability> {
        Feature::ALL
            .iter()
            .map(|&feature| Capability {
                available: self.supports_feature(feature),
                ..Capability::for_feature(feature, Some(self.profile.version.as_str()))
            })
            .collect()
    }

    async fn health_check(&self) -> Result<bool> {
        self.probe()
            .await
            .with_context(|| format!("health probe for '{}' failed", self.profile.name))
    }
}
