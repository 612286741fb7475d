//! Configuration file management for switchyard.
//!
//! Provides a TOML-based config file at `~/.config/switchyard/config.toml`
//! and a resolution chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use switchyard_core::adapter::{AdapterConfig, BackendProfile};

/// Overrides the Claude Code executable.
pub const CLAUDE_BINARY_ENV: &str = "SWITCHYARD_CLAUDE_BINARY";
/// Overrides the agent store root.
pub const STORE_ROOT_ENV: &str = "SWITCHYARD_STORE_ROOT";
const TIMEOUT_ENV: &str = "SWITCHYARD_TIMEOUT_SECS";
const MAX_RETRIES_ENV: &str = "SWITCHYARD_MAX_RETRIES";

const DEFAULT_CLAUDE_BINARY: &str = "claude";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub adapter: AdapterSection,
    #[serde(default)]
    pub registry: RegistrySection,
    #[serde(default)]
    pub store: StoreSection,
    /// Additional engines, registered after the built-in `claude-code`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub backends: Vec<BackendProfile>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AdapterSection {
    /// Claude Code executable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RegistrySection {
    /// Adapter used when `exec` is not given `--adapter`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
    /// Enables periodic health checks while a command runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StoreSection {
    /// Directory holding one subdirectory per agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
}

impl ConfigFile {
    /// The file written by `switchyard init`.
    pub fn starter() -> Self {
        Self {
            adapter: AdapterSection {
                binary: Some(DEFAULT_CLAUDE_BINARY.to_string()),
                timeout_secs: Some(AdapterConfig::DEFAULT_TIMEOUT_SECS),
                max_retries: Some(AdapterConfig::default().retry.max_retries),
            },
            registry: RegistrySection {
                default: Some(BackendProfile::claude_code().name),
                fallback: None,
                health_interval_secs: None,
            },
            store: StoreSection {
                root: Some(default_store_root()),
            },
            backends: Vec::new(),
        }
    }
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the switchyard config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/switchyard` or
/// `~/.config/switchyard`, never the platform-specific `dirs::config_dir()`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("switchyard");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("switchyard")
}

/// Return the path to the switchyard config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// `$XDG_DATA_HOME/switchyard/agents` or `~/.local/share/switchyard/agents`.
pub fn default_store_root() -> PathBuf {
    let base = match std::env::var("XDG_DATA_HOME") {
        Ok(xdg) => PathBuf::from(xdg),
        Err(_) => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".local")
            .join("share"),
    };
    base.join("switchyard").join("agents")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file at `path`.
pub fn load_config_from(path: &Path) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(config)
}

/// Load the config file if there is one. A file that exists but does not
/// parse is an error.
pub fn load_config() -> Result<Option<ConfigFile>> {
    let path = config_path();
    if !path.exists() {
        return Ok(None);
    }
    load_config_from(&path).map(Some)
}

/// Serialize and write `config` to `path`, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix.
pub fn save_config_to(config: &ConfigFile, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Values given on the command line.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub binary: Option<String>,
    pub store_root: Option<PathBuf>,
}

/// Fully resolved configuration, ready for use.
#[derive(Debug, Clone)]
pub struct SwitchyardConfig {
    pub adapter: AdapterConfig,
    pub claude_binary: String,
    pub backends: Vec<BackendProfile>,
    pub default_adapter: Option<String>,
    pub fallback: Option<String>,
    pub health_interval: Option<Duration>,
    pub store_root: PathBuf,
}

impl SwitchyardConfig {
    /// Resolve against the real config file and process environment.
    pub fn resolve(cli: &CliOverrides) -> Result<Self> {
        let file = load_config()?;
        Self::resolve_with(cli, file, |key| std::env::var(key).ok())
    }

    /// Resolve using the chain: CLI flag > env var > config file > default.
    ///
    /// - Claude binary: `--binary` > `SWITCHYARD_CLAUDE_BINARY` > `[adapter] binary` > `claude`
    /// - Store root: `--store` > `SWITCHYARD_STORE_ROOT` > `[store] root` > XDG data dir
    /// - Timeout, retries: `SWITCHYARD_TIMEOUT_SECS` / `SWITCHYARD_MAX_RETRIES` > file > default
    pub fn resolve_with<F>(cli: &CliOverrides, file: Option<ConfigFile>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = file.unwrap_or_default();
        let env = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let claude_binary = cli
            .binary
            .clone()
            .or_else(|| env(CLAUDE_BINARY_ENV))
            .or(file.adapter.binary)
            .unwrap_or_else(|| DEFAULT_CLAUDE_BINARY.to_string());

        let store_root = cli
            .store_root
            .clone()
            .or_else(|| env(STORE_ROOT_ENV).map(PathBuf::from))
            .or(file.store.root)
            .unwrap_or_else(default_store_root);

        let mut adapter = AdapterConfig::default();
        let timeout_secs = match env(TIMEOUT_ENV) {
            Some(raw) => Some(
                raw.trim()
                    .parse::<u64>()
                    .with_context(|| format!("{TIMEOUT_ENV} is not a number of seconds: {raw}"))?,
            ),
            None => file.adapter.timeout_secs,
        };
        if let Some(secs) = timeout_secs {
            adapter = adapter.with_timeout(Duration::from_secs(secs.max(1)));
        }
        let max_retries = match env(MAX_RETRIES_ENV) {
            Some(raw) => Some(
                raw.trim()
                    .parse::<u32>()
                    .with_context(|| format!("{MAX_RETRIES_ENV} is not a retry count: {raw}"))?,
            ),
            None => file.adapter.max_retries,
        };
        if let Some(retries) = max_retries {
            adapter = adapter.with_max_retries(retries);
        }

        Ok(Self {
            adapter,
            claude_binary,
            backends: file.backends,
            default_adapter: file.registry.default,
            fallback: file.registry.fallback,
            health_interval: file
                .registry
                .health_interval_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            store_root,
        })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
