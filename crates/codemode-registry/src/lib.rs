//! Codemode capability registry
//!
//! Gathers named asynchronous capabilities from independent providers into
//! one immutable, namespaced registry.
//!
//! # Architecture
//!
//! ```text
//! CapabilityProvider ─┐
//! CapabilityProvider ─┼─ RegistryAggregator ──→ CapabilityRegistry + AggregationReport
//! CapabilityAdapter  ─┘        (per-source failure isolation)
//! ```
//!
//! A provider that fails to load contributes nothing and is reported; the
//! aggregation itself never fails.
//!
//! # Example
//!
//! ```rust,ignore
//! use codemode_registry::prelude::*;
//!
//! # async fn example() {
//! let aggregator = RegistryAggregator::new()
//!     .with_provider(Arc::new(keywords_provider))
//!     .with_adapter(Arc::new(chat_adapter));
//!
//! let Aggregation { registry, report } = aggregator.build_registry(None).await;
//! println!("{} capabilities, {} failed sources", registry.len(), report.failures.len());
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod aggregator;
pub mod capability;
pub mod error;
pub mod provider;
pub mod registry;

pub use aggregator::{
    Aggregation, AggregationReport, PreloadedListings, RegistryAggregator, SourceContribution,
    SourceFailure, SourceKind,
};
pub use capability::{Capability, CapabilityHandler, CapabilityInfo};
pub use error::{CapabilityError, ProviderError};
pub use provider::{
    CachedProvider, CapabilityAdapter, CapabilityProvider, CapabilityProviderExt, StaticProvider,
};
pub use registry::CapabilityRegistry;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for building registries
    pub use crate::aggregator::{Aggregation, AggregationReport, RegistryAggregator};
    pub use crate::capability::{Capability, CapabilityHandler};
    pub use crate::error::{CapabilityError, ProviderError};
    pub use crate::provider::{
        CachedProvider, CapabilityAdapter, CapabilityProvider, CapabilityProviderExt,
        StaticProvider,
    };
    pub use crate::registry::CapabilityRegistry;
    pub use std::sync::Arc;
}
