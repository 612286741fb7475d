//! The `Adapter` trait -- the contract every backend engine implements.
//!
//! The trait is object-safe so adapters can be stored as
//! `Arc<dyn Adapter>` in the [`crate::registry::AdapterRegistry`].

use std::str::FromStr;

use anyhow::Result;
use async_trait::async_trait;

use crate::model::{AgentMode, Capability, ExecutionContext, ExecutionResult, Feature};

/// Contract for one coding-agent backend.
///
/// Callers and the registry depend only on this trait, never on a concrete
/// adapter type.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Stable identifier (e.g. "claude-code").
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    /// Run one agent turn.
    ///
    /// Never fails: every failure (validation, availability, security,
    /// timeout, process errors) is reported through
    /// [`ExecutionResult::errors`].
    async fn execute_agent(
        &self,
        agent_id: &str,
        mode: AgentMode,
        context: &ExecutionContext,
    ) -> ExecutionResult;

    /// Static feature membership. Must not perform I/O.
    fn supports_feature(&self, feature: Feature) -> bool;

    fn capabilities(&self) -> Vec<Capability>;

    /// Bounded-time probe of the backend.
    ///
    /// An `Err` is treated by the registry exactly like `Ok(false)`.
    async fn health_check(&self) -> Result<bool>;

    /// String form of [`Adapter::supports_feature`]; unknown names are
    /// unsupported.
    fn supports_feature_named(&self, name: &str) -> bool {
        Feature::from_str(name).is_ok_and(|f| self.supports_feature(f))
    }
}

// Compile-time assertion: Adapter must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn Adapter) {}
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AgentConfig;

    /// A trivial adapter, used only to prove the trait can be implemented
    /// and used as `dyn Adapter`.
    struct NoopAdapter;

    #[async_trait]
    impl Adapter for NoopAdapter {
        fn name(&self) -> &str {
            "noop"
        }

        fn version(&self) -> &str {
            "0.0.0"
        }

        async fn execute_agent(
            &self,
            _agent_id: &str,
            _mode: AgentMode,
            _context: &ExecutionContext,
        ) -> ExecutionResult {
            ExecutionResult::succeeded(0)
        }

        fn supports_feature(&self, feature: Feature) -> bool {
            feature == Feature::BashExecution
        }

        fn capabilities(&self) -> Vec<Capability> {
            vec![Capability::for_feature(Feature::BashExecution, None)]
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }
    }

    #[test]
    fn adapter_is_object_safe() {
        let adapter: Box<dyn Adapter> = Box::new(NoopAdapter);
        assert_eq!(adapter.name(), "noop");
        assert_eq!(adapter.capabilities().len(), 1);
    }

    #[test]
    fn supports_feature_named_parses_names() {
        let adapter = NoopAdapter;
        assert!(adapter.supports_feature_named("bash-execution"));
        assert!(!adapter.supports_feature_named("web-search"));
        assert!(!adapter.supports_feature_named("not-a-feature"));
    }

    #[tokio::test]
    async fn noop_adapter_execute_and_probe() {
        let adapter: Box<dyn Adapter> = Box::new(NoopAdapter);
        let ctx = ExecutionContext::new("a1", AgentMode::Continuous, AgentConfig::default(), "/tmp");
        let result = adapter.execute_agent("a1", AgentMode::Continuous, &ctx).await;
        assert!(result.success);
        assert!(adapter.health_check().await.unwrap());
    }
}
