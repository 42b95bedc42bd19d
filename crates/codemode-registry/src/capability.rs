//! Named asynchronous capabilities
//!
//! A [`Capability`] pairs a name and a description with a shared
//! [`CapabilityHandler`]. Handlers are owned by the provider that created
//! them; registries and executors only hold `Arc` references.

use crate::error::CapabilityError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Invocation logic behind a capability
///
/// `args` are the positional arguments passed by the script, converted to
/// JSON.
#[async_trait]
pub trait CapabilityHandler: Send + Sync {
    /// Invoke the capability
    async fn invoke(&self, args: Vec<Value>) -> Result<Value, CapabilityError>;
}

/// Handler wrapping an async closure
struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> CapabilityHandler for FnHandler<F>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, CapabilityError>> + Send,
{
    async fn invoke(&self, args: Vec<Value>) -> Result<Value, CapabilityError> {
        (self.0)(args).await
    }
}

/// One named async operation
#[derive(Clone)]
pub struct Capability {
    name: String,
    description: String,
    handler: Arc<dyn CapabilityHandler>,
}

impl Capability {
    /// Create capability from a handler
    #[inline]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        handler: Arc<dyn CapabilityHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            handler,
        }
    }

    /// Create capability from an async closure
    pub fn from_fn<F, Fut>(name: impl Into<String>, description: impl Into<String>, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, CapabilityError>> + Send + 'static,
    {
        Self::new(name, description, Arc::new(FnHandler(f)))
    }

    /// Capability name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human/model readable description
    #[inline]
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Shared handler
    #[inline]
    #[must_use]
    pub fn handler(&self) -> &Arc<dyn CapabilityHandler> {
        &self.handler
    }

    /// Invoke the capability
    ///
    /// # Errors
    /// Returns the handler's [`CapabilityError`] unchanged.
    #[inline]
    pub async fn invoke(&self, args: Vec<Value>) -> Result<Value, CapabilityError> {
        self.handler.invoke(args).await
    }

    /// Copy under a new name and description, sharing the handler
    #[must_use]
    pub fn renamed(&self, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            handler: Arc::clone(&self.handler),
        }
    }

    /// Serializable name/description pair
    #[must_use]
    pub fn info(&self) -> CapabilityInfo {
        CapabilityInfo {
            name: self.name.clone(),
            description: self.description.clone(),
        }
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Name and description of a capability, without its handler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityInfo {
    /// Capability name
    pub name: String,
    /// Capability description
    #[serde(default)]
    pub description: String,
}
