//! Best-effort registry aggregation
//!
//! [`RegistryAggregator`] asks every known provider and adapter for its
//! capabilities and merges the answers into one [`CapabilityRegistry`].
//!
//! - Sources are loaded concurrently and merged in registration order.
//! - A failing source is logged, recorded in the [`AggregationReport`] and
//!   contributes nothing; aggregation itself never fails.
//! - Provider capabilities are qualified as `{prefix}_{name}`; adapters keep
//!   their fixed names.

use crate::capability::Capability;
use crate::error::ProviderError;
use crate::provider::{CapabilityAdapter, CapabilityProvider};
use crate::registry::CapabilityRegistry;
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Listings fetched ahead of time, keyed by provider prefix
///
/// A prefix present here is not asked for its listing again.
pub type PreloadedListings = HashMap<String, Result<Vec<Capability>, ProviderError>>;

/// Kind of capability source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Prefixed multi-capability provider
    Provider,
    /// Fixed-name single-function adapter
    Adapter,
}

/// Number of capabilities a source contributed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceContribution {
    /// Provider prefix or adapter name
    pub source: String,
    /// Source kind
    pub kind: SourceKind,
    /// Capabilities contributed
    pub capabilities: usize,
}

/// A source that failed to load
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFailure {
    /// Provider prefix or adapter name
    pub source: String,
    /// Source kind
    pub kind: SourceKind,
    /// Failure message
    pub reason: String,
}

/// Outcome of one aggregation per source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregationReport {
    /// Sources that loaded, in registration order
    pub contributions: Vec<SourceContribution>,
    /// Sources that failed, in registration order
    pub failures: Vec<SourceFailure>,
}

impl AggregationReport {
    /// Check if every source loaded
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Failure recorded for a source, if any
    #[must_use]
    pub fn failure(&self, source: &str) -> Option<&SourceFailure> {
        self.failures.iter().find(|f| f.source == source)
    }
}

/// Registry together with its report
#[derive(Debug, Clone)]
pub struct Aggregation {
    /// Merged registry
    pub registry: CapabilityRegistry,
    /// Per-source outcome
    pub report: AggregationReport,
}

/// Builds capability registries from providers and adapters
#[derive(Clone, Default)]
pub struct RegistryAggregator {
    providers: Vec<Arc<dyn CapabilityProvider>>,
    adapters: Vec<Arc<dyn CapabilityAdapter>>,
}

impl RegistryAggregator {
    /// Create aggregator with no sources
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn CapabilityProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Register an adapter
    #[must_use]
    pub fn with_adapter(mut self, adapter: Arc<dyn CapabilityAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    /// Registered provider prefixes
    pub fn provider_prefixes(&self) -> impl Iterator<Item = &str> {
        self.providers.iter().map(|p| p.prefix())
    }

    /// Build a fresh registry
    ///
    /// Providers listed in `preloaded` use that listing instead of being
    /// asked again. Later sources win on name collisions.
    pub async fn build_registry(&self, preloaded: Option<PreloadedListings>) -> Aggregation {
        let mut preloaded = preloaded.unwrap_or_default();

        let provider_loads = self.providers.iter().map(|provider| {
            let listing = preloaded.remove(provider.prefix());
            async move {
                match listing {
                    Some(listing) => listing,
                    None => provider.list_capabilities().await,
                }
            }
        });
        let adapter_loads = self.adapters.iter().map(|adapter| adapter.build());

        let (provider_results, adapter_results) =
            futures::join!(join_all(provider_loads), join_all(adapter_loads));

        let mut report = AggregationReport::default();
        let mut merged: Vec<Capability> = Vec::new();

        for (provider, result) in self.providers.iter().zip(provider_results) {
            let prefix = provider.prefix();
            match result {
                Ok(capabilities) => {
                    report.contributions.push(SourceContribution {
                        source: prefix.to_string(),
                        kind: SourceKind::Provider,
                        capabilities: capabilities.len(),
                    });
                    merged.extend(capabilities.iter().map(|c| qualify(prefix, c)));
                }
                Err(e) => {
                    tracing::warn!(
                        provider = prefix,
                        error = %e,
                        "capability provider failed to load"
                    );
                    report.failures.push(SourceFailure {
                        source: prefix.to_string(),
                        kind: SourceKind::Provider,
                        reason: e.to_string(),
                    });
                }
            }
        }

        for (adapter, result) in self.adapters.iter().zip(adapter_results) {
            let name = adapter.name();
            match result {
                Ok(capability) => {
                    report.contributions.push(SourceContribution {
                        source: name.to_string(),
                        kind: SourceKind::Adapter,
                        capabilities: 1,
                    });
                    merged.push(capability.renamed(name, capability.description()));
                }
                Err(e) => {
                    tracing::warn!(
                        adapter = name,
                        error = %e,
                        "capability adapter failed to build"
                    );
                    report.failures.push(SourceFailure {
                        source: name.to_string(),
                        kind: SourceKind::Adapter,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let registry: CapabilityRegistry = merged.into_iter().collect();
        tracing::info!(
            capabilities = registry.len(),
            sources = report.contributions.len(),
            failed = report.failures.len(),
            "capability registry built"
        );

        Aggregation { registry, report }
    }
}

impl fmt::Debug for RegistryAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryAggregator")
            .field("providers", &self.providers.iter().map(|p| p.prefix()).collect::<Vec<_>>())
            .field("adapters", &self.adapters.iter().map(|a| a.name()).collect::<Vec<_>>())
            .finish()
    }
}

fn qualify(prefix: &str, capability: &Capability) -> Capability {
    let description = if capability.description().is_empty() {
        format!("{} capability provided by {prefix}", capability.name())
    } else {
        capability.description().to_string()
    };
    capability.renamed(format!("{prefix}_{}", capability.name()), description)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::StaticProvider;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    struct Unreachable(&'static str);

    #[async_trait]
    impl CapabilityProvider for Unreachable {
        fn prefix(&self) -> &str {
            self.0
        }

        async fn list_capabilities(&self) -> Result<Vec<Capability>, ProviderError> {
            Err(ProviderError::Unavailable("connection refused".to_string()))
        }
    }

    struct KeylessAdapter;

    #[async_trait]
    impl CapabilityAdapter for KeylessAdapter {
        fn name(&self) -> &str {
            "chat_completion"
        }

        async fn build(&self) -> Result<Capability, ProviderError> {
            Err(ProviderError::Misconfigured("missing API key".to_string()))
        }
    }

    fn constant(name: &str, description: &str, value: Value) -> Capability {
        Capability::from_fn(name, description, move |_args: Vec<Value>| {
            let value = value.clone();
            async move { Ok(value) }
        })
    }

    fn static_provider(prefix: &str, capability: Capability) -> Arc<dyn CapabilityProvider> {
        Arc::new(StaticProvider::new(prefix).with_capability(capability))
    }

    #[tokio::test]
    async fn qualifies_names_and_defaults_descriptions() {
        let aggregator = RegistryAggregator::new().with_provider(Arc::new(
            StaticProvider::new("kw")
                .with_capability(constant("volume", "Search volume", json!(10)))
                .with_capability(constant("related", "", json!([]))),
        ));

        let Aggregation { registry, report } = aggregator.build_registry(None).await;

        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["kw_volume", "kw_related"]);
        assert_eq!(registry.get("kw_volume").unwrap().description(), "Search volume");
        assert_eq!(
            registry.get("kw_related").unwrap().description(),
            "related capability provided by kw"
        );
        assert!(report.is_complete());
    }

    #[tokio::test]
    async fn failing_provider_is_isolated() {
        let aggregator = RegistryAggregator::new()
            .with_provider(static_provider("a", constant("x", "", json!(1))))
            .with_provider(Arc::new(Unreachable("b")))
            .with_provider(static_provider("c", constant("y", "", json!(2))));

        let Aggregation { registry, report } = aggregator.build_registry(None).await;

        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["a_x", "c_y"]);
        assert_eq!(report.contributions.len(), 2);
        let failure = report.failure("b").unwrap();
        assert_eq!(failure.kind, SourceKind::Provider);
        assert!(failure.reason.contains("connection refused"));
    }

    #[tokio::test]
    async fn preloaded_listing_replaces_provider_call() {
        let aggregator = RegistryAggregator::new().with_provider(Arc::new(Unreachable("remote")));

        let mut preloaded = PreloadedListings::new();
        preloaded.insert("remote".to_string(), Ok(vec![constant("ping", "Ping", json!("pong"))]));

        let Aggregation { registry, report } = aggregator.build_registry(Some(preloaded)).await;

        assert!(registry.contains("remote_ping"));
        assert!(report.is_complete());
    }

    #[tokio::test]
    async fn preloaded_failure_is_reported() {
        let aggregator = RegistryAggregator::new()
            .with_provider(static_provider("kw", constant("v", "", json!(0))));

        let mut preloaded = PreloadedListings::new();
        preloaded.insert(
            "kw".to_string(),
            Err(ProviderError::InvalidListing("not an array".to_string())),
        );

        let Aggregation { registry, report } = aggregator.build_registry(Some(preloaded)).await;

        assert!(registry.is_empty());
        assert!(report.failure("kw").is_some());
    }

    #[tokio::test]
    async fn adapters_use_fixed_names_and_fail_in_isolation() {
        struct Fixed;

        #[async_trait]
        impl CapabilityAdapter for Fixed {
            fn name(&self) -> &str {
                "research_search"
            }

            async fn build(&self) -> Result<Capability, ProviderError> {
                Ok(constant("whatever", "Research search", json!("answer")))
            }
        }

        let aggregator = RegistryAggregator::new()
            .with_adapter(Arc::new(KeylessAdapter))
            .with_adapter(Arc::new(Fixed));

        let Aggregation { registry, report } = aggregator.build_registry(None).await;

        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["research_search"]);
        assert_eq!(report.failure("chat_completion").unwrap().kind, SourceKind::Adapter);
    }

    #[tokio::test]
    async fn later_provider_wins_collision() {
        let aggregator = RegistryAggregator::new()
            .with_provider(static_provider("x", constant("a_b", "first", json!(1))))
            .with_provider(static_provider("x_a", constant("b", "second", json!(2))));

        let Aggregation { registry, .. } = aggregator.build_registry(None).await;

        assert_eq!(registry.len(), 1);
        let capability = registry.get("x_a_b").unwrap();
        assert_eq!(capability.description(), "second");
        assert_eq!(capability.invoke(vec![]).await.unwrap(), json!(2));
    }

    #[test]
    fn report_serializes() {
        let report = AggregationReport {
            contributions: vec![SourceContribution {
                source: "kw".to_string(),
                kind: SourceKind::Provider,
                capabilities: 3,
            }],
            failures: vec![],
        };
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            json!({
                "contributions": [{"source": "kw", "kind": "provider", "capabilities": 3}],
                "failures": []
            })
        );
    }
}
