//! Error types for capabilities and providers
//!
//! - [`CapabilityError`]: a single capability invocation failed
//! - [`ProviderError`]: a provider or adapter could not list its capabilities

/// Capability invocation failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityError {
    /// Capability raised an error
    #[error("{0}")]
    Failed(String),

    /// Arguments did not match what the capability expects
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// Backend returned an error or could not be reached
    #[error("upstream error: {0}")]
    Upstream(String),
}

impl CapabilityError {
    /// Create generic failure
    #[inline]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Create invalid-arguments failure
    #[inline]
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::InvalidArguments(message.into())
    }
}

/// Provider loading failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// Provider backend could not be reached
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// Provider is missing configuration (credentials, endpoint)
    #[error("provider misconfigured: {0}")]
    Misconfigured(String),

    /// Provider answered with an unusable capability listing
    #[error("invalid capability listing: {0}")]
    InvalidListing(String),
}
