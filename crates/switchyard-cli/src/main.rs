mod adapters;
mod config;
mod exec_cmd;
mod health_cmd;
#[cfg(test)]
mod test_util;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use switchyard_core::model::AgentMode;

use config::{CliOverrides, SwitchyardConfig};
use exec_cmd::ExecRequest;

#[derive(Parser)]
#[command(
    name = "switchyard",
    about = "Run coding-agent turns against CLI backends with health gating and failover"
)]
struct Cli {
    /// Claude Code executable (overrides SWITCHYARD_CLAUDE_BINARY)
    #[arg(long, global = true)]
    binary: Option<String>,

    /// Agent store root (overrides SWITCHYARD_STORE_ROOT)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a switchyard config file
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Health-check every registered adapter
    Health,
    /// Show adapter capabilities
    Capabilities {
        /// Only this adapter
        #[arg(long)]
        adapter: Option<String>,
    },
    /// Run one agent turn and print the result as JSON
    Exec {
        /// Agent to run
        agent_id: String,
        /// Which turn to run
        #[arg(long, value_enum, default_value_t = ModeArg::Continuous)]
        mode: ModeArg,
        /// Workspace root the agent is confined to
        #[arg(long)]
        workspace: PathBuf,
        /// Directory to run in (defaults to the workspace root)
        #[arg(long)]
        working_dir: Option<PathBuf>,
        /// Preferred adapter (defaults to the registry default)
        #[arg(long)]
        adapter: Option<String>,
        /// Adapter to use when the preferred one is unhealthy
        #[arg(long)]
        fallback: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Continuous,
    Reactive,
}

impl From<ModeArg> for AgentMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Continuous => AgentMode::Continuous,
            ModeArg::Reactive => AgentMode::Reactive,
        }
    }
}

/// Execute the `switchyard init` command: write config file.
fn cmd_init(force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile::starter();
    config::save_config_to(&cfg, &path)?;

    println!("Config written to {}", path.display());
    if let Some(binary) = &cfg.adapter.binary {
        println!("  adapter.binary = {binary}");
    }
    if let Some(root) = &cfg.store.root {
        println!("  store.root = {}", root.display());
    }
    println!();
    println!("Next: run `switchyard health` to check the configured backends.");

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries command output (JSON for `exec`); logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Init { force } = cli.command {
        return cmd_init(force);
    }

    let overrides = CliOverrides {
        binary: cli.binary,
        store_root: cli.store,
    };
    let resolved = SwitchyardConfig::resolve(&overrides)?;
    let registry = adapters::build_registry(&resolved)?;

    let ok = match cli.command {
        Commands::Init { .. } => true,
        Commands::Health => health_cmd::run_health(&registry).await?,
        Commands::Capabilities { adapter } => {
            health_cmd::run_capabilities(&registry, adapter.as_deref())?;
            true
        }
        Commands::Exec {
            agent_id,
            mode,
            workspace,
            working_dir,
            adapter,
            fallback,
        } => {
            adapters::start_health_timers(&registry, &resolved);
            let request = ExecRequest {
                agent_id,
                mode: mode.into(),
                workspace,
                working_dir,
                adapter,
                fallback,
            };
            exec_cmd::run_exec(&registry, &resolved, &request).await?
        }
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}
