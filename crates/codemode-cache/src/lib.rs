//! Codemode read-through cache
//!
//! Get-or-compute with TTL over any key-value store.
//!
//! # Architecture
//!
//! ```text
//! cached_call(key, compute, ttl)
//!        │
//!        ├── store.get(key) ── hit ──────────────→ value
//!        │
//!        └── miss → compute() ── Ok → store.set(key, value, ttl) → value
//!                             └─ Err → propagated, nothing stored
//! ```
//!
//! Stores are pluggable through [`KeyValueStore`]: [`MemoryStore`] for a
//! plain in-process map, [`MokaStore`] for a bounded concurrent cache, or any
//! distributed cache the host provides.
//!
//! # Example
//!
//! ```rust,ignore
//! use codemode_cache::ReadThroughCache;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), std::io::Error> {
//! let cache = ReadThroughCache::<String>::in_memory();
//! let volume = cache
//!     .cached_call("keyword:rust", || async { fetch_volume("rust").await }, Duration::from_secs(300))
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod cache;
pub mod error;
pub mod store;

pub use cache::{CacheStats, ReadThroughCache};
pub use error::StoreError;
pub use store::{CacheEntry, KeyValueStore, MemoryStore, MokaStore};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
