//! Codemode capability providers
//!
//! Concrete backends for the registry:
//!
//! ```text
//! ProvidersConfig ──→ aggregator_from_config ──→ RegistryAggregator
//!     http[]            HttpToolProvider (cached listing)
//!     chat_completion   ChatCompletionAdapter
//!     research_search   ResearchSearchAdapter
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use codemode_providers::prelude::*;
//!
//! # async fn example() {
//! let config = ProvidersConfig::new()
//!     .with_http(HttpProviderConfig::new("keywords", "http://localhost:9000"));
//! let aggregator = aggregator_from_config(&config, &ReadThroughCache::in_memory(), Duration::from_secs(300));
//! let aggregation = aggregator.build_registry(None).await;
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod adapters;
pub mod completion;
pub mod config;
pub mod error;
pub mod http;

pub use adapters::{ChatCompletionAdapter, ResearchSearchAdapter};
pub use completion::{ChatMessage, Completion, CompletionClient};
pub use config::{CompletionConfig, HttpProviderConfig, ProvidersConfig};
pub use error::RequestError;
pub use http::HttpToolProvider;

use codemode_cache::ReadThroughCache;
use codemode_registry::{Capability, CapabilityProviderExt, RegistryAggregator};
use std::sync::Arc;
use std::time::Duration;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Register every configured source on a new aggregator
///
/// Tool server listings go through `cache` with `listing_ttl`. A server
/// whose client cannot be built is logged and skipped.
#[must_use]
pub fn aggregator_from_config(
    config: &ProvidersConfig,
    cache: &ReadThroughCache<Vec<Capability>>,
    listing_ttl: Duration,
) -> RegistryAggregator {
    let mut aggregator = RegistryAggregator::new();

    for server in &config.http {
        match HttpToolProvider::from_config(server) {
            Ok(provider) => {
                let provider = provider.cached(cache.clone(), listing_ttl);
                aggregator = aggregator.with_provider(Arc::new(provider));
            }
            Err(e) => tracing::warn!(prefix = %server.prefix, error = %e, "skipping tool server"),
        }
    }

    if let Some(chat) = &config.chat_completion {
        let adapter = ChatCompletionAdapter::from_config(chat.clone());
        aggregator = aggregator.with_adapter(Arc::new(adapter));
    }
    if let Some(research) = &config.research_search {
        let adapter = ResearchSearchAdapter::from_config(research.clone());
        aggregator = aggregator.with_adapter(Arc::new(adapter));
    }

    aggregator
}

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for configuring providers
    pub use crate::adapters::{ChatCompletionAdapter, ResearchSearchAdapter};
    pub use crate::aggregator_from_config;
    pub use crate::config::{CompletionConfig, HttpProviderConfig, ProvidersConfig};
    pub use crate::http::HttpToolProvider;
    pub use codemode_cache::ReadThroughCache;
    pub use std::time::Duration;
}
