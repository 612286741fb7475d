//! Static descriptions of backend CLI engines.

use serde::{Deserialize, Serialize};

use crate::model::Feature;

/// How to invoke one coding-agent CLI.
///
/// A profile is pure data. [`super::CliAdapter`] turns it into process
/// invocations; additional engines can be described in configuration
/// without new code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendProfile {
    /// Stable adapter name used for registry lookup (e.g. `claude-code`).
    pub name: String,
    /// Human-readable name used in error messages.
    pub display_name: String,
    /// Adapter version reported through the adapter contract.
    pub version: String,
    /// Executable to spawn; resolved through `$PATH` when not absolute.
    pub binary: String,
    /// Flags placed before the prompt: non-interactive, machine-readable
    /// output, no session persistence.
    pub args: Vec<String>,
    /// Arguments for the health probe.
    #[serde(default = "default_version_args")]
    pub version_args: Vec<String>,
    /// Variable that receives the provider base URL.
    #[serde(default = "default_base_url_var")]
    pub base_url_var: String,
    /// Variable that receives the provider credential.
    #[serde(default = "default_credential_var")]
    pub credential_var: String,
    #[serde(default)]
    pub features: Vec<Feature>,
}

fn default_version_args() -> Vec<String> {
    vec!["--version".to_string()]
}

fn default_base_url_var() -> String {
    "ANTHROPIC_BASE_URL".to_string()
}

fn default_credential_var() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

impl BackendProfile {
    /// The Claude Code CLI: `claude -p --output-format json
    /// --no-session-persistence <prompt>`.
    pub fn claude_code() -> Self {
        Self {
            name: "claude-code".to_string(),
            display_name: "Claude Code CLI".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            binary: "claude".to_string(),
            args: vec![
                "-p".to_string(),
                "--output-format".to_string(),
                "json".to_string(),
                "--no-session-persistence".to_string(),
            ],
            version_args: default_version_args(),
            base_url_var: default_base_url_var(),
            credential_var: default_credential_var(),
            features: vec![
                Feature::FileOperations,
                Feature::BashExecution,
                Feature::WebSearch,
                Feature::McpTools,
                Feature::StructuredOutput,
                Feature::CostTracking,
            ],
        }
    }

    /// Same profile, spawning a different executable.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claude_code_profile_flags() {
        let profile = BackendProfile::claude_code();
        assert_eq!(profile.name, "claude-code");
        assert_eq!(profile.binary, "claude");
        assert!(profile.args.contains(&"-p".to_string()));
        assert!(profile.args.contains(&"--no-session-persistence".to_string()));
        assert_eq!(profile.version_args, vec!["--version"]);
    }

    #[test]
    fn with_binary_keeps_everything_else() {
        let profile = BackendProfile::claude_code().with_binary("/opt/claude");
        assert_eq!(profile.binary, "/opt/claude");
        assert_eq!(profile.name, "claude-code");
    }

    #[test]
    fn custom_profile_from_toml_uses_defaults() {
        let src = r#"
            name = "gemini"
            display_name = "Gemini CLI"
            version = "0.3.0"
            binary = "gemini"
            args = ["--yolo", "--output-format", "json"]
            features = ["file-operations", "bash-execution"]
        "#;
        let profile: BackendProfile = toml::from_str(src).unwrap();
        assert_eq!(profile.version_args, vec!["--version"]);
        assert_eq!(profile.credential_var, "ANTHROPIC_API_KEY");
        assert_eq!(
            profile.features,
            vec![Feature::FileOperations, Feature::BashExecution]
        );
    }
}
