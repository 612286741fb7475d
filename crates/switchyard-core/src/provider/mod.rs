//! Provider selection: which base URL and credential the backend CLI talks to.
//!
//! Resolution is a pure function of an environment lookup and never spawns a
//! process, so it can be evaluated (and tested) independently of any adapter.

use std::fmt;
use std::str::FromStr;

use tracing::warn;

/// Environment variable selecting the provider.
pub const PROVIDER_ENV: &str = "SWITCHYARD_PROVIDER";

pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Provider {
    #[default]
    AnthropicDirect,
    OpenRouter,
    Bedrock,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::AnthropicDirect => "anthropic-direct",
            Provider::OpenRouter => "openrouter",
            Provider::Bedrock => "bedrock",
        }
    }

    /// `(proxy url var, credential var)` for providers reached through a
    /// dedicated proxy.
    fn proxy_vars(&self) -> Option<(&'static str, &'static str)> {
        match self {
            Provider::AnthropicDirect => None,
            Provider::OpenRouter => Some(("OPENROUTER_PROXY_URL", "OPENROUTER_API_KEY")),
            Provider::Bedrock => Some(("BEDROCK_PROXY_URL", "BEDROCK_API_KEY")),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "anthropic" | "anthropic-direct" => Ok(Provider::AnthropicDirect),
            "openrouter" => Ok(Provider::OpenRouter),
            "bedrock" => Ok(Provider::Bedrock),
            other => Err(format!("unknown provider: {other}")),
        }
    }
}

/// Resolved endpoint for one provider.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderEnv {
    pub provider: Provider,
    pub base_url: String,
    /// May be empty; an empty credential makes the backend unhealthy.
    pub credential: String,
}

// Keep the credential out of logs.
impl fmt::Debug for ProviderEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderEnv")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("credential", &if self.credential.is_empty() { "" } else { "<redacted>" })
            .finish()
    }
}

impl ProviderEnv {
    /// Resolve from the process environment.
    pub fn from_env() -> Self {
        Self::resolve_with(|key| std::env::var(key).ok())
    }

    /// Resolve using an arbitrary lookup function.
    pub fn resolve_with<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let provider = match non_empty(PROVIDER_ENV) {
            Some(name) => name.parse().unwrap_or_else(|e: String| {
                warn!(error = %e, "falling back to anthropic-direct");
                Provider::AnthropicDirect
            }),
            None => Provider::AnthropicDirect,
        };

        if let Some((url_var, key_var)) = provider.proxy_vars() {
            if let Some(base_url) = non_empty(url_var) {
                return Self {
                    provider,
                    base_url,
                    credential: non_empty(key_var).unwrap_or_default(),
                };
            }
            warn!(
                provider = provider.as_str(),
                "no dedicated proxy configured, using anthropic-direct resolution"
            );
        }

        Self {
            provider,
            base_url: non_empty("ANTHROPIC_BASE_URL")
                .unwrap_or_else(|| DEFAULT_ANTHROPIC_BASE_URL.to_string()),
            credential: non_empty("ANTHROPIC_API_KEY")
                .or_else(|| non_empty("ANTHROPIC_AUTH_TOKEN"))
                .unwrap_or_default(),
        }
    }

    pub fn has_credential(&self) -> bool {
        !self.credential.trim().is_empty()
    }
}
