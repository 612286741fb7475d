use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A discrete feature a backend engine may claim to support.
///
/// The set is closed: capability lookups parse a name into a `Feature` first
/// and an unknown name simply matches nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Feature {
    FileOperations,
    BashExecution,
    WebSearch,
    McpTools,
    StructuredOutput,
    CostTracking,
}

impl Feature {
    /// Every known feature, in a stable order.
    pub const ALL: [Feature; 6] = [
        Feature::FileOperations,
        Feature::BashExecution,
        Feature::WebSearch,
        Feature::McpTools,
        Feature::StructuredOutput,
        Feature::CostTracking,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::FileOperations => "file-operations",
            Feature::BashExecution => "bash-execution",
            Feature::WebSearch => "web-search",
            Feature::McpTools => "mcp-tools",
            Feature::StructuredOutput => "structured-output",
            Feature::CostTracking => "cost-tracking",
        }
    }

    /// One-line human description used when reporting capabilities.
    pub fn description(&self) -> &'static str {
        match self {
            Feature::FileOperations => "Read, create and edit files in the working directory",
            Feature::BashExecution => "Run shell commands",
            Feature::WebSearch => "Search and fetch web content",
            Feature::McpTools => "Call tools exposed by MCP servers",
            Feature::StructuredOutput => "Emit machine-readable JSON results",
            Feature::CostTracking => "Report API cost per execution",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a feature name is not one of [`Feature::ALL`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown feature: {0}")]
pub struct UnknownFeature(pub String);

impl FromStr for Feature {
    type Err = UnknownFeature;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feature::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| UnknownFeature(s.to_string()))
    }
}

/// A feature as reported by a concrete adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
    pub description: String,
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Capability {
    /// Build an available capability entry for a known feature.
    pub fn for_feature(feature: Feature, version: Option<&str>) -> Self {
        Self {
            name: feature.as_str().to_string(),
            description: feature.description().to_string(),
            available: true,
            version: version.map(str::to_string),
        }
    }
}
