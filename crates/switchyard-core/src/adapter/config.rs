use std::env;
use std::time::Duration;

use super::retry::RetryPolicy;

/// Runtime knobs for a [`super::CliAdapter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterConfig {
    /// Hard limit on one main invocation.
    pub timeout: Duration,
    /// Limit on the health probe, kept short so the gate never hangs.
    pub health_timeout: Duration,
    pub retry: RetryPolicy,
}

impl AdapterConfig {
    /// 60 minutes.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 3600;
    pub const DEFAULT_HEALTH_TIMEOUT_SECS: u64 = 5;

    /// Build a config from the environment.
    ///
    /// Reads `SWITCHYARD_TIMEOUT_SECS` and `SWITCHYARD_MAX_RETRIES`; unset or
    /// unparsable values keep their defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(secs) = parse_var::<u64>("SWITCHYARD_TIMEOUT_SECS") {
            config.timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(retries) = parse_var::<u32>("SWITCHYARD_MAX_RETRIES") {
            config.retry.max_retries = retries;
        }
        config
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.retry.max_retries = max_retries;
        self
    }
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            health_timeout: Duration::from_secs(Self::DEFAULT_HEALTH_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
