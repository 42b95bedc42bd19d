//! Aggregation across cached, static and failing sources

use async_trait::async_trait;
use codemode_cache::ReadThroughCache;
use codemode_registry::prelude::*;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

struct Remote {
    prefix: String,
    fail: bool,
    loads: AtomicUsize,
}

impl Remote {
    fn new(prefix: &str, fail: bool) -> Arc<Self> {
        Arc::new(Self {
            prefix: prefix.to_string(),
            fail,
            loads: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl CapabilityProvider for Remote {
    fn prefix(&self) -> &str {
        &self.prefix
    }

    async fn list_capabilities(&self) -> Result<Vec<Capability>, ProviderError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ProviderError::Unavailable(format!("{} is down", self.prefix)));
        }
        let prefix = self.prefix.clone();
        Ok(vec![Capability::from_fn("whoami", "", move |_args: Vec<Value>| {
            let prefix = prefix.clone();
            async move { Ok(json!(prefix)) }
        })])
    }
}

#[tokio::test]
async fn union_of_healthy_providers() {
    let sources: Vec<Arc<Remote>> = (0..5).map(|i| Remote::new(&format!("p{i}"), i == 2)).collect();

    let aggregator = sources
        .iter()
        .fold(RegistryAggregator::new(), |agg, source| {
            agg.with_provider(Arc::clone(source) as Arc<dyn CapabilityProvider>)
        });

    let Aggregation { registry, report } = aggregator.build_registry(None).await;

    assert_eq!(
        registry.names().collect::<Vec<_>>(),
        vec!["p0_whoami", "p1_whoami", "p3_whoami", "p4_whoami"]
    );
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].source, "p2");
    assert_eq!(
        registry.get("p3_whoami").unwrap().invoke(vec![]).await.unwrap(),
        json!("p3")
    );
}

#[tokio::test(start_paused = true)]
async fn cached_listing_is_reused_across_sessions() {
    let remote = Remote::new("kw", false);
    let cache = ReadThroughCache::in_memory();
    let cached = Arc::clone(&remote).cached(cache.clone(), Duration::from_secs(3600));
    let aggregator = RegistryAggregator::new().with_provider(Arc::new(cached));

    for _ in 0..3 {
        let Aggregation { registry, .. } = aggregator.build_registry(None).await;
        assert!(registry.contains("kw_whoami"));
    }

    assert_eq!(remote.loads.load(Ordering::SeqCst), 1);
    assert_eq!(cache.stats().hits, 2);
}

#[tokio::test]
async fn failed_listing_is_not_cached() {
    let remote = Remote::new("flaky", true);
    let cached =
        Arc::clone(&remote).cached(ReadThroughCache::in_memory(), Duration::from_secs(3600));
    let aggregator = RegistryAggregator::new().with_provider(Arc::new(cached));

    aggregator.build_registry(None).await;
    aggregator.build_registry(None).await;

    assert_eq!(remote.loads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn describe_matches_registry_order() {
    let aggregator = RegistryAggregator::new()
        .with_provider(Remote::new("b", false))
        .with_provider(Remote::new("a", false));

    let Aggregation { registry, .. } = aggregator.build_registry(None).await;

    assert_eq!(
        registry.describe(),
        "- b_whoami: whoami capability provided by b\n- a_whoami: whoami capability provided by a"
    );
}
