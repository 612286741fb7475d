//! Build the adapter registry from resolved configuration.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use switchyard_core::adapter::{BackendProfile, CliAdapter};
use switchyard_core::registry::AdapterRegistry;

use crate::config::SwitchyardConfig;

/// Register the built-in Claude Code adapter, then every configured
/// backend, and apply the configured default.
///
/// Periodic health checks are not started here; long-running commands opt
/// in with [`start_health_timers`].
pub fn build_registry(config: &SwitchyardConfig) -> Result<AdapterRegistry> {
    let registry = AdapterRegistry::new();

    let claude = BackendProfile::claude_code().with_binary(&config.claude_binary);
    let profiles = std::iter::once(claude).chain(config.backends.iter().cloned());
    for profile in profiles {
        let name = profile.name.clone();
        let adapter = CliAdapter::new(profile).with_config(config.adapter.clone());
        registry
            .register(Arc::new(adapter))
            .with_context(|| format!("failed to register backend '{name}'"))?;
        debug!(adapter = %name, "registered adapter");
    }

    if let Some(name) = &config.default_adapter {
        registry
            .set_default(name)
            .with_context(|| format!("configured default adapter '{name}' is not registered"))?;
    }
    Ok(registry)
}

pub fn start_health_timers(registry: &AdapterRegistry, config: &SwitchyardConfig) {
    if let Some(interval) = config.health_interval {
        registry.enable_auto_health_check(interval);
    }
}
