//! Integration tests for the `switchyard` binary.
//!
//! Each test runs the compiled binary with an isolated config directory,
//! agent store and fake backend script.

#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

use switchyard_core::model::TaskStatus;
use switchyard_test_utils::{TEST_API_KEY, sample_task, write_fake_backend};

// -----------------------------------------------------------------------
// Harness
// -----------------------------------------------------------------------

struct Sandbox {
    home: TempDir,
    store: PathBuf,
    workspace: PathBuf,
    bin_dir: PathBuf,
}

impl Sandbox {
    fn new() -> Self {
        let home = TempDir::new().unwrap();
        let store = home.path().join("store");
        let workspace = home.path().join("workspace");
        let bin_dir = home.path().join("bin");
        for dir in [&store, &workspace, &bin_dir] {
            std::fs::create_dir_all(dir).unwrap();
        }
        Self {
            home,
            store,
            workspace,
            bin_dir,
        }
    }

    fn add_agent(&self, agent_id: &str) {
        let dir = self.store.join(agent_id);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("config.toml"),
            format!("id = \"{agent_id}\"\nname = \"Agent {agent_id}\"\n"),
        )
        .unwrap();
        let tasks = vec![
            sample_task("t1", TaskStatus::Pending),
            sample_task("t2", TaskStatus::Completed),
        ];
        std::fs::write(
            dir.join("tasks.json"),
            serde_json::to_string(&tasks).unwrap(),
        )
        .unwrap();
    }

    fn backend(&self, name: &str, body: &str) -> PathBuf {
        write_fake_backend(&self.bin_dir, name, body)
    }

    fn config_dir(&self) -> PathBuf {
        self.home.path().join("config")
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_switchyard"))
            .args(args)
            .env("HOME", self.home.path())
            .env("XDG_CONFIG_HOME", self.config_dir())
            .env("XDG_DATA_HOME", self.home.path().join("data"))
            .env("ANTHROPIC_API_KEY", TEST_API_KEY)
            .env("RUST_LOG", "warn")
            .env_remove("SWITCHYARD_PROVIDER")
            .env_remove("SWITCHYARD_CLAUDE_BINARY")
            .env_remove("SWITCHYARD_STORE_ROOT")
            .env_remove("SWITCHYARD_TIMEOUT_SECS")
            .env_remove("SWITCHYARD_MAX_RETRIES")
            .output()
            .unwrap()
    }
}

fn path_arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

fn stdout_json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout is not JSON ({e}): {}\nstderr: {}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        )
    })
}

// -----------------------------------------------------------------------
// exec
// -----------------------------------------------------------------------

#[test]
fn exec_prints_successful_result() {
    let sb = Sandbox::new();
    sb.add_agent("a1");
    let claude = sb.backend(
        "claude",
        r#"echo '{"text":"t1 finished","tasksCompleted":["t1"],"costUSD":0.25}'"#,
    );

    let output = sb.run(&[
        "--binary",
        path_arg(&claude),
        "--store",
        path_arg(&sb.store),
        "exec",
        "a1",
        "--workspace",
        path_arg(&sb.workspace),
    ]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let json = stdout_json(&output);
    assert_eq!(json["success"], true);
    assert_eq!(json["tasksCompletedCount"], 1);
    assert_eq!(json["metadata"]["costUSD"], 0.25);
}

#[test]
fn exec_failure_exits_non_zero_with_json() {
    let sb = Sandbox::new();
    sb.add_agent("a1");
    let claude = sb.backend("claude", "echo 'Error: quota exhausted' >&2\nexit 1");

    let output = sb.run(&[
        "--binary",
        path_arg(&claude),
        "--store",
        path_arg(&sb.store),
        "exec",
        "a1",
        "--workspace",
        path_arg(&sb.workspace),
    ]);

    assert_eq!(output.status.code(), Some(1));
    let json = stdout_json(&output);
    assert_eq!(json["success"], false);
    assert_eq!(json["errors"][0]["message"], "Error: quota exhausted");
}

#[test]
fn exec_uses_configured_fallback() {
    let sb = Sandbox::new();
    sb.add_agent("a1");
    let backup = sb.backend("backup", r#"echo '{"text":"handled by backup"}'"#);
    let config = format!(
        r#"
[registry]
fallback = "backup"

[[backends]]
name = "backup"
display_name = "Backup CLI"
version = "1.0.0"
binary = "{}"
args = ["--print"]
"#,
        backup.display()
    );
    std::fs::create_dir_all(sb.config_dir().join("switchyard")).unwrap();
    std::fs::write(sb.config_dir().join("switchyard/config.toml"), config).unwrap();

    let missing = sb.bin_dir.join("no-such-claude");
    let output = sb.run(&[
        "--binary",
        path_arg(&missing),
        "--store",
        path_arg(&sb.store),
        "exec",
        "a1",
        "--workspace",
        path_arg(&sb.workspace),
    ]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let json = stdout_json(&output);
    assert_eq!(json["metadata"]["output"], "{\"text\":\"handled by backup\"}\n");
}

#[test]
fn exec_with_no_healthy_adapter_reports_unavailable() {
    let sb = Sandbox::new();
    sb.add_agent("a1");
    let missing = sb.bin_dir.join("no-such-claude");

    let output = sb.run(&[
        "--binary",
        path_arg(&missing),
        "--store",
        path_arg(&sb.store),
        "exec",
        "a1",
        "--workspace",
        path_arg(&sb.workspace),
    ]);

    assert_eq!(output.status.code(), Some(1));
    let json = stdout_json(&output);
    assert_eq!(json["errors"][0]["code"], "BACKEND_UNAVAILABLE");
}

#[test]
fn exec_unknown_agent_is_an_error() {
    let sb = Sandbox::new();
    let claude = sb.backend("claude", "echo '{}'");

    let output = sb.run(&[
        "--binary",
        path_arg(&claude),
        "--store",
        path_arg(&sb.store),
        "exec",
        "ghost",
        "--workspace",
        path_arg(&sb.workspace),
    ]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("failed to load config for agent 'ghost'"),
        "unexpected stderr: {stderr}"
    );
}

// -----------------------------------------------------------------------
// health, capabilities, init
// -----------------------------------------------------------------------

#[test]
fn health_reports_table_and_status() {
    let sb = Sandbox::new();
    let claude = sb.backend("claude", "echo '{}'");

    let healthy = sb.run(&["--binary", path_arg(&claude), "health"]);
    assert!(healthy.status.success());
    let table = String::from_utf8_lossy(&healthy.stdout);
    assert!(table.starts_with("NAME"), "{table}");
    assert!(table.contains("claude-code"));
    assert!(table.contains("yes"));

    let missing = sb.bin_dir.join("no-such-claude");
    let unhealthy = sb.run(&["--binary", path_arg(&missing), "health"]);
    assert_eq!(unhealthy.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&unhealthy.stdout).contains("no"));
}

#[test]
fn capabilities_for_unknown_adapter_fails() {
    let sb = Sandbox::new();

    let all = sb.run(&["capabilities"]);
    assert!(all.status.success());
    assert!(String::from_utf8_lossy(&all.stdout).contains("[+] structured-output"));

    let unknown = sb.run(&["capabilities", "--adapter", "nope"]);
    assert!(!unknown.status.success());
    assert!(String::from_utf8_lossy(&unknown.stderr).contains("nope"));
}

#[test]
fn init_writes_config_once() {
    let sb = Sandbox::new();

    let first = sb.run(&["init"]);
    assert!(first.status.success());
    let path = sb.config_dir().join("switchyard/config.toml");
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("[adapter]"));
    assert!(written.contains("binary = \"claude\""));

    let second = sb.run(&["init"]);
    assert!(!second.status.success());
    assert!(String::from_utf8_lossy(&second.stderr).contains("already exists"));

    let forced = sb.run(&["init", "--force"]);
    assert!(forced.status.success());
}
