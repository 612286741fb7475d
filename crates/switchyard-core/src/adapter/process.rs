//! Subprocess invocation with a hard timeout.
//!
//! All process spawning goes through the [`CommandRunner`] trait so the
//! execution pipeline can be driven by a scripted runner in tests.
//! Non-zero exit is reported as data in [`ProcessOutput`]; only failures to
//! run the process at all (spawn errors, I/O errors, timeouts) surface as
//! [`InvocationError`].

use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// A fully described process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
    /// Overlay on top of the inherited environment.
    pub env: Vec<(String, String)>,
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            env: Vec::new(),
            timeout,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Look up a value in the environment overlay.
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Captured result of a process that ran to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Why a process could not be run to completion.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvocationError {
    /// Killed by the runner's timeout.
    #[error("process timed out after {}s", .timeout.as_secs())]
    TimedOut { timeout: Duration },
    /// Any other failure. `code` is an errno-style name such as
    /// `ECONNRESET` when one is known.
    #[error("{message}")]
    Failed {
        code: Option<String>,
        message: String,
    },
}

impl InvocationError {
    pub fn failed(code: Option<&str>, message: impl Into<String>) -> Self {
        InvocationError::Failed {
            code: code.map(str::to_string),
            message: message.into(),
        }
    }

    /// Wrap an I/O error, mapping its kind to an errno-style code.
    pub fn from_io(context: &str, err: io::Error) -> Self {
        InvocationError::Failed {
            code: io_error_code(&err).map(str::to_string),
            message: format!("{context}: {err}"),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, InvocationError::TimedOut { .. })
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            InvocationError::TimedOut { .. } => Some("ETIMEDOUT"),
            InvocationError::Failed { code, .. } => code.as_deref(),
        }
    }
}

fn io_error_code(err: &io::Error) -> Option<&'static str> {
    use io::ErrorKind::*;
    let code = match err.kind() {
        ConnectionReset => "ECONNRESET",
        ConnectionRefused => "ECONNREFUSED",
        TimedOut => "ETIMEDOUT",
        BrokenPipe => "EPIPE",
        WouldBlock => "EAGAIN",
        NotFound => "ENOENT",
        PermissionDenied => "EACCES",
        Interrupted => "EINTR",
        _ => return None,
    };
    Some(code)
}

/// Runs a [`CommandSpec`] to completion.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput, InvocationError>;
}

/// The real runner, backed by `tokio::process`.
///
/// Children are spawned with `kill_on_drop`, so abandoning the future (for
/// example by losing a `select!` race) does not leak the subprocess.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioCommandRunner;

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput, InvocationError> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.current_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|e| {
            InvocationError::from_io(&format!("failed to spawn '{}'", spec.program), e)
        })?;
        debug!(program = %spec.program, pid = child.id(), "spawned backend process");

        // Drain both pipes while waiting so a chatty child cannot fill a
        // pipe buffer and deadlock.
        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();

        let read_stdout = async {
            let mut buf = Vec::new();
            if let Some(ref mut pipe) = stdout_pipe {
                pipe.read_to_end(&mut buf).await.ok();
            }
            String::from_utf8_lossy(&buf).into_owned()
        };
        let read_stderr = async {
            let mut buf = Vec::new();
            if let Some(ref mut pipe) = stderr_pipe {
                pipe.read_to_end(&mut buf).await.ok();
            }
            String::from_utf8_lossy(&buf).into_owned()
        };

        let outcome = tokio::time::timeout(spec.timeout, async {
            tokio::join!(child.wait(), read_stdout, read_stderr)
        })
        .await;

        match outcome {
            Ok((Ok(status), stdout, stderr)) => Ok(ProcessOutput {
                exit_code: status.code(),
                stdout,
                stderr,
            }),
            Ok((Err(e), _, _)) => Err(InvocationError::from_io(
                &format!("failed to wait on '{}'", spec.program),
                e,
            )),
            Err(_elapsed) => {
                if let Err(e) = child.kill().await {
                    warn!(program = %spec.program, error = %e, "failed to kill timed-out process");
                }
                Err(InvocationError::TimedOut {
                    timeout: spec.timeout,
                })
            }
        }
    }
}
