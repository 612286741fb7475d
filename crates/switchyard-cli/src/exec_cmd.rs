//! `switchyard exec`: run one agent turn and print the result as JSON.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, warn};

use switchyard_core::context::{ContextOptions, FsContextStore, load_execution_context};
use switchyard_core::model::{AgentMode, ExecutionError, ExecutionResult, error_codes};
use switchyard_core::registry::AdapterRegistry;

use crate::config::SwitchyardConfig;

/// Arguments of one `exec` invocation.
#[derive(Debug, Clone)]
pub struct ExecRequest {
    pub agent_id: String,
    pub mode: AgentMode,
    pub workspace: PathBuf,
    pub working_dir: Option<PathBuf>,
    pub adapter: Option<String>,
    pub fallback: Option<String>,
}

/// Assemble the context, pick a healthy adapter, execute, print.
///
/// Returns `result.success`. Context-loading problems are reported as
/// errors; everything after that is reported through the printed result.
pub async fn run_exec(
    registry: &AdapterRegistry,
    config: &SwitchyardConfig,
    request: &ExecRequest,
) -> Result<bool> {
    let store = FsContextStore::new(&config.store_root);
    let mut options = ContextOptions::new(&request.workspace);
    if let Some(dir) = &request.working_dir {
        options = options.with_working_dir(dir);
    }
    let context = load_execution_context(&store, &request.agent_id, request.mode, &options)
        .await
        .with_context(|| format!("using agent store at {}", config.store_root.display()))?;

    let primary = request
        .adapter
        .clone()
        .or_else(|| registry.default_name())
        .context("no adapter given and no default adapter registered")?;
    let fallback = request.fallback.clone().or_else(|| config.fallback.clone());

    let result = match registry
        .get_healthy_adapter(&primary, fallback.as_deref())
        .await
    {
        Some(chosen) => {
            info!(
                adapter = %chosen.name,
                used_fallback = chosen.used_fallback,
                agent_id = %request.agent_id,
                "selected adapter"
            );
            chosen
                .adapter
                .execute_agent(&request.agent_id, request.mode, &context)
                .await
        }
        None => {
            warn!(primary = %primary, "no healthy adapter");
            no_healthy_adapter(&primary, fallback.as_deref())
        }
    };

    let json = serde_json::to_string_pretty(&result).context("failed to serialize result")?;
    println!("{json}");
    Ok(result.success)
}

fn no_healthy_adapter(primary: &str, fallback: Option<&str>) -> ExecutionResult {
    let message = match fallback {
        Some(fallback) if fallback != primary => {
            format!("no healthy adapter: '{primary}' and fallback '{fallback}' are unavailable")
        }
        _ => format!("no healthy adapter: '{primary}' is unavailable"),
    };
    ExecutionResult::failed_with(
        0,
        ExecutionError::new(message).with_code(error_codes::BACKEND_UNAVAILABLE),
    )
}
