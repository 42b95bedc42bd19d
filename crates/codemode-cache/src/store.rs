//! Key-value stores backing the read-through cache
//!
//! Provides the [`KeyValueStore`] contract plus two in-process
//! implementations:
//! - [`MemoryStore`]: unbounded `DashMap` of [`CacheEntry`], expired entries
//!   dropped lazily on read
//! - [`MokaStore`]: bounded moka cache with per-entry time-to-live

use crate::error::StoreError;
use async_trait::async_trait;
use dashmap::DashMap;
use moka::future::Cache;
use moka::Expiry;
use std::fmt::Debug;
use std::time::Duration;
use tokio::time::Instant;

/// External key-value store with per-entry TTL
///
/// Any conforming store works: an in-process map, moka, or a distributed
/// cache. Entries are independent per key and overwritten atomically.
#[async_trait]
pub trait KeyValueStore<V>: Send + Sync
where
    V: Clone + Send + Sync + 'static,
{
    /// Fetch an unexpired value
    async fn get(&self, key: &str) -> Result<Option<V>, StoreError>;

    /// Store a value that expires after `ttl`
    async fn set(&self, key: &str, value: V, ttl: Duration) -> Result<(), StoreError>;

    /// Drop a value if present
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Single cache entry
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// Entry key
    pub key: String,
    /// Cached value
    pub value: V,
    /// Instant after which the entry is stale
    pub expires_at: Instant,
}

impl<V> CacheEntry<V> {
    /// Create entry expiring `ttl` from now
    ///
    /// TTLs past the clock's range are capped at roughly thirty years.
    #[inline]
    #[must_use]
    pub fn new(key: impl Into<String>, value: V, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            key: key.into(),
            value,
            expires_at: now
                .checked_add(ttl)
                .unwrap_or_else(|| now + FAR_FUTURE),
        }
    }

    /// Check if entry is stale at `now`
    #[inline]
    #[must_use]
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// In-process store backed by `DashMap`
///
/// Uses the tokio clock, so tests can pause and advance time.
#[derive(Debug)]
pub struct MemoryStore<V> {
    entries: DashMap<String, CacheEntry<V>>,
}

impl<V> MemoryStore<V> {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Number of entries, including stale ones not yet evicted
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if store is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<V> KeyValueStore<V> for MemoryStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<Option<V>, StoreError> {
        let now = Instant::now();

        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired_at(now) => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };

        // Shard guard is released above; a concurrent fresh write must survive
        if expired {
            self.entries.remove_if(key, |_, entry| entry.is_expired_at(now));
        }

        Ok(None)
    }

    async fn set(&self, key: &str, value: V, ttl: Duration) -> Result<(), StoreError> {
        self.entries
            .insert(key.to_string(), CacheEntry::new(key, value, ttl));
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Value wrapper carrying its own time-to-live
#[derive(Debug, Clone)]
struct TtlValue<V> {
    value: V,
    ttl: Duration,
}

/// Per-entry expiration policy for moka
struct PerEntryTtl;

impl<V> Expiry<String, TtlValue<V>> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &TtlValue<V>,
        _created_at: std::time::Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &TtlValue<V>,
        _updated_at: std::time::Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Bounded concurrent store using moka
///
/// Evicts by size (TinyLFU) and by each entry's own TTL.
#[derive(Clone)]
pub struct MokaStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    inner: Cache<String, TtlValue<V>>,
}

impl<V> MokaStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create store with max capacity
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .expire_after(PerEntryTtl)
                .build(),
        }
    }

    /// Get approximate entry count
    #[inline]
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }

    /// Invalidate all entries
    #[inline]
    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }
}

impl<V> Default for MokaStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create store with default capacity (10,000 entries)
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl<V> Debug for MokaStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaStore")
            .field("entry_count", &self.inner.entry_count())
            .finish()
    }
}

#[async_trait]
impl<V> KeyValueStore<V> for MokaStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<Option<V>, StoreError> {
        Ok(self.inner.get(key).await.map(|entry| entry.value))
    }

    async fn set(&self, key: &str, value: V, ttl: Duration) -> Result<(), StoreError> {
        self.inner
            .insert(key.to_string(), TtlValue { value, ttl })
            .await;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.inner.invalidate(key).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn memory_store_set_and_get() {
        let store = MemoryStore::new();
        store
            .set("k", 42_u32, Duration::from_secs(10))
            .await
            .unwrap();

        assert_eq!(store.get("k").await.unwrap(), Some(42));
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn memory_store_expires_entries() {
        let store = MemoryStore::new();
        store
            .set("k", "v".to_string(), Duration::from_secs(5))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(store.get("k").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(store.get("k").await.unwrap().is_none());
        assert!(store.is_empty(), "stale entry should be evicted on read");
    }

    #[tokio::test(start_paused = true)]
    async fn memory_store_overwrite_resets_ttl() {
        let store = MemoryStore::new();
        store.set("k", 1_u8, Duration::from_secs(5)).await.unwrap();
        tokio::time::advance(Duration::from_secs(4)).await;
        store.set("k", 2_u8, Duration::from_secs(5)).await.unwrap();
        tokio::time::advance(Duration::from_secs(4)).await;

        assert_eq!(store.get("k").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn memory_store_remove() {
        let store = MemoryStore::new();
        store.set("k", 1_u8, Duration::from_secs(60)).await.unwrap();
        store.remove("k").await.unwrap();

        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn memory_store_accepts_unbounded_ttl() {
        let store = MemoryStore::new();
        store.set("k", 1_u8, Duration::MAX).await.unwrap();
        tokio::time::advance(Duration::from_secs(86_400 * 365)).await;

        assert_eq!(store.get("k").await.unwrap(), Some(1));
    }

    #[test]
    fn cache_entry_expiry_boundary() {
        let entry = CacheEntry::new("k", (), Duration::from_secs(1));
        assert!(!entry.is_expired_at(entry.expires_at - Duration::from_millis(1)));
        assert!(entry.is_expired_at(entry.expires_at));
    }

    #[tokio::test]
    async fn moka_store_set_get_remove() {
        let store = MokaStore::new(100);
        store
            .set("k", "value".to_string(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("value"));

        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn moka_store_per_entry_ttl() {
        let store = MokaStore::new(100);
        store
            .set("short", 1_u32, Duration::from_millis(20))
            .await
            .unwrap();
        store
            .set("long", 2_u32, Duration::from_secs(60))
            .await
            .unwrap();

        std::thread::sleep(Duration::from_millis(50));

        assert_eq!(store.get("short").await.unwrap(), None);
        assert_eq!(store.get("long").await.unwrap(), Some(2));
    }
}
