//! Capability providers and point adapters
//!
//! - [`CapabilityProvider`]: an external backend contributing a related set
//!   of capabilities under a common prefix
//! - [`CapabilityAdapter`]: a single-function integration registered under a
//!   fixed name
//! - [`StaticProvider`]: in-process provider built from closures
//! - [`CachedProvider`]: any provider with its listing served through a
//!   [`ReadThroughCache`]

use crate::capability::Capability;
use crate::error::ProviderError;
use async_trait::async_trait;
use codemode_cache::ReadThroughCache;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Independent backend exposing named async capabilities
#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    /// Namespace prefix used to qualify this provider's capability names
    fn prefix(&self) -> &str;

    /// List this provider's capabilities
    ///
    /// # Errors
    /// Returns [`ProviderError`] when the backend cannot produce a listing.
    async fn list_capabilities(&self) -> Result<Vec<Capability>, ProviderError>;
}

/// Single-function integration appended under a fixed name
#[async_trait]
pub trait CapabilityAdapter: Send + Sync {
    /// Fixed registry name
    fn name(&self) -> &str;

    /// Build the capability
    ///
    /// # Errors
    /// Returns [`ProviderError`] when the integration cannot be set up
    /// (missing credentials, unreachable endpoint).
    async fn build(&self) -> Result<Capability, ProviderError>;
}

/// Provider serving a fixed set of in-process capabilities
#[derive(Debug, Clone)]
pub struct StaticProvider {
    prefix: String,
    capabilities: Vec<Capability>,
}

impl StaticProvider {
    /// Create empty provider
    #[inline]
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            capabilities: Vec::new(),
        }
    }

    /// Add a capability
    #[inline]
    #[must_use]
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    /// Number of capabilities
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    /// Check if provider is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}

#[async_trait]
impl CapabilityProvider for StaticProvider {
    fn prefix(&self) -> &str {
        &self.prefix
    }

    async fn list_capabilities(&self) -> Result<Vec<Capability>, ProviderError> {
        Ok(self.capabilities.clone())
    }
}

/// Provider whose listing is cached with a TTL
///
/// The cache key is `capabilities:{prefix}`, so one cache may be shared by
/// several providers.
pub struct CachedProvider<P> {
    inner: P,
    cache: ReadThroughCache<Vec<Capability>>,
    ttl: Duration,
}

impl<P: CapabilityProvider> CachedProvider<P> {
    /// Wrap provider with a listing cache
    #[inline]
    #[must_use]
    pub fn new(inner: P, cache: ReadThroughCache<Vec<Capability>>, ttl: Duration) -> Self {
        Self { inner, cache, ttl }
    }

    /// Wrapped provider
    #[inline]
    #[must_use]
    pub fn inner(&self) -> &P {
        &self.inner
    }

    fn cache_key(&self) -> String {
        format!("capabilities:{}", self.inner.prefix())
    }
}

impl<P> fmt::Debug for CachedProvider<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedProvider")
            .field("ttl", &self.ttl)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<P: CapabilityProvider> CapabilityProvider for CachedProvider<P> {
    fn prefix(&self) -> &str {
        self.inner.prefix()
    }

    async fn list_capabilities(&self) -> Result<Vec<Capability>, ProviderError> {
        let key = self.cache_key();
        self.cache
            .cached_call(&key, || self.inner.list_capabilities(), self.ttl)
            .await
    }
}

impl<T: CapabilityProvider + ?Sized> CapabilityProviderExt for T {}

/// Convenience combinators for providers
pub trait CapabilityProviderExt: CapabilityProvider {
    /// Serve this provider's listing through `cache`
    fn cached(self, cache: ReadThroughCache<Vec<Capability>>, ttl: Duration) -> CachedProvider<Self>
    where
        Self: Sized,
    {
        CachedProvider::new(self, cache, ttl)
    }
}

/// Shared providers are providers
#[async_trait]
impl<P: CapabilityProvider + ?Sized> CapabilityProvider for Arc<P> {
    fn prefix(&self) -> &str {
        (**self).prefix()
    }

    async fn list_capabilities(&self) -> Result<Vec<Capability>, ProviderError> {
        (**self).list_capabilities().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        loads: AtomicUsize,
    }

    #[async_trait]
    impl CapabilityProvider for CountingProvider {
        fn prefix(&self) -> &str {
            "counting"
        }

        async fn list_capabilities(&self) -> Result<Vec<Capability>, ProviderError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(vec![Capability::from_fn("ping", "", |_args: Vec<Value>| async {
                Ok(json!("pong"))
            })])
        }
    }

    #[tokio::test]
    async fn static_provider_lists_capabilities() {
        let provider = StaticProvider::new("math").with_capability(Capability::from_fn(
            "add",
            "Adds",
            |_args: Vec<Value>| async { Ok(json!(0)) },
        ));

        let listed = provider.list_capabilities().await.unwrap();
        assert_eq!(provider.prefix(), "math");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name(), "add");
    }

    #[tokio::test(start_paused = true)]
    async fn cached_provider_loads_once_per_ttl() {
        let provider = Arc::new(CountingProvider {
            loads: AtomicUsize::new(0),
        });
        let cached =
            Arc::clone(&provider).cached(ReadThroughCache::in_memory(), Duration::from_secs(30));

        cached.list_capabilities().await.unwrap();
        cached.list_capabilities().await.unwrap();
        assert_eq!(provider.loads.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(31)).await;
        cached.list_capabilities().await.unwrap();
        assert_eq!(provider.loads.load(Ordering::SeqCst), 2);
        assert_eq!(cached.prefix(), "counting");
    }
}
