//! Read-through cache
//!
//! Provides [`ReadThroughCache`]: serve stored values until expiry, compute
//! and store on miss. There is no stampede protection: concurrent misses for
//! one key may both compute, and the last write wins.

use crate::store::{KeyValueStore, MemoryStore, MokaStore};
use std::fmt::Debug;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Statistics for cache performance monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Calls served from the store
    pub hits: u64,
    /// Calls that ran `compute`
    pub misses: u64,
    /// Store reads or writes that failed
    pub store_errors: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    store_errors: AtomicU64,
}

/// Get-or-compute cache with per-call TTL
///
/// Cheap to clone; clones share the store and the counters.
pub struct ReadThroughCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    store: Arc<dyn KeyValueStore<V>>,
    counters: Arc<Counters>,
}

impl<V> ReadThroughCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create cache over an arbitrary store
    #[inline]
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore<V>>) -> Self {
        Self {
            store,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Create cache over an unbounded in-process map
    #[inline]
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Create cache over a bounded moka store
    #[inline]
    #[must_use]
    pub fn bounded(max_capacity: u64) -> Self {
        Self::new(Arc::new(MokaStore::new(max_capacity)))
    }

    /// Return the stored value for `key`, or compute, store and return it
    ///
    /// # Errors
    /// Returns whatever `compute` returns on failure, unmodified. Failed
    /// computations are never stored.
    pub async fn cached_call<E, F, Fut>(&self, key: &str, compute: F, ttl: Duration) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        match self.store.get(key).await {
            Ok(Some(value)) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("codemode_cache_hits_total").increment(1);
                tracing::trace!(key, "cache hit");
                return Ok(value);
            }
            Ok(None) => {}
            Err(e) => {
                self.counters.store_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(key, error = %e, "cache read failed, computing");
            }
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("codemode_cache_misses_total").increment(1);
        tracing::trace!(key, "cache miss");

        let value = compute().await?;

        if let Err(e) = self.store.set(key, value.clone(), ttl).await {
            self.counters.store_errors.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(key, error = %e, "cache write failed");
        }

        Ok(value)
    }

    /// Invalidate cache entry
    pub async fn invalidate(&self, key: &str) {
        if let Err(e) = self.store.remove(key).await {
            self.counters.store_errors.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(key, error = %e, "cache invalidation failed");
        }
    }

    /// Get cache statistics
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            store_errors: self.counters.store_errors.load(Ordering::Relaxed),
        }
    }
}

impl<V> Clone for ReadThroughCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            counters: Arc::clone(&self.counters),
        }
    }
}

impl<V> Default for ReadThroughCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::in_memory()
    }
}

impl<V> Debug for ReadThroughCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadThroughCache")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
