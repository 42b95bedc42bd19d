//! Orchestration sessions
//!
//! An [`Orchestrator`] owns the long-lived pieces (listing cache,
//! aggregator, executor limits). Each [`Session`] gets a freshly built,
//! immutable registry wrapped as the orchestration tool.

use crate::config::CodemodeConfig;
use crate::executor::SandboxExecutor;
use crate::facade::{make_orchestration_tool_with, ToolDescriptor};
use codemode_cache::{CacheStats, ReadThroughCache};
use codemode_registry::{
    Aggregation, AggregationReport, Capability, PreloadedListings, RegistryAggregator,
};
use std::sync::Arc;

/// Long-lived orchestrator state shared by sessions
#[derive(Debug)]
pub struct Orchestrator {
    aggregator: RegistryAggregator,
    executor: SandboxExecutor,
    listing_cache: ReadThroughCache<Vec<Capability>>,
}

impl Orchestrator {
    /// Create orchestrator with the sources named in `config`
    #[must_use]
    pub fn new(config: &CodemodeConfig) -> Self {
        let listing_cache = ReadThroughCache::bounded(config.cache.capacity);
        let aggregator = codemode_providers::aggregator_from_config(
            &config.providers,
            &listing_cache,
            config.cache.listing_ttl(),
        );
        Self {
            aggregator,
            executor: SandboxExecutor::new(config.executor.clone()),
            listing_cache,
        }
    }

    /// Replace the configured sources with a custom aggregator
    #[must_use]
    pub fn with_aggregator(mut self, aggregator: RegistryAggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    /// Cache shared by every configured tool server listing
    #[inline]
    #[must_use]
    pub fn listing_cache(&self) -> &ReadThroughCache<Vec<Capability>> {
        &self.listing_cache
    }

    /// Listing cache counters
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.listing_cache.stats()
    }

    /// Build a registry and wrap it as the orchestration tool
    pub async fn open_session(&self, preloaded: Option<PreloadedListings>) -> Session {
        let Aggregation { registry, report } = self.aggregator.build_registry(preloaded).await;
        if !report.is_complete() {
            tracing::warn!(
                failed = report.failures.len(),
                "session opened with unavailable capability sources"
            );
        }
        tracing::info!(capabilities = registry.len(), "orchestration session opened");

        Session {
            tool: make_orchestration_tool_with(Arc::new(registry), self.executor.clone()),
            report,
        }
    }
}

/// One orchestration session
#[derive(Debug, Clone)]
pub struct Session {
    /// Tool to hand to the model
    pub tool: ToolDescriptor,
    /// Which sources contributed and which failed
    pub report: AggregationReport,
}

#[cfg(test)]
mod tests {
    use super::*;
    use codemode_registry::StaticProvider;
    use codemode_test_utils::{math_add, FailingProvider};

    #[tokio::test]
    async fn unconfigured_orchestrator_has_no_capabilities() {
        let session = Orchestrator::new(&CodemodeConfig::default()).open_session(None).await;
        assert_eq!(session.tool.capability_count(), 0);
        assert!(session.report.is_complete());
    }

    #[tokio::test]
    async fn custom_sources_with_isolated_failure() {
        let aggregator = RegistryAggregator::new()
            .with_provider(Arc::new(StaticProvider::new("math").with_capability(math_add())))
            .with_provider(Arc::new(FailingProvider::new("offline")));
        let orchestrator =
            Orchestrator::new(&CodemodeConfig::default()).with_aggregator(aggregator);

        let session = orchestrator.open_session(None).await;
        assert!(session.tool.description().contains("math_mathAdd"));
        assert!(session.report.failure("offline").is_some());

        let result = session
            .tool
            .call_str(r#"{"script": "return await math_mathAdd(2, 3)"}"#)
            .await;
        assert_eq!(result.value(), Some("5"));
    }
}
