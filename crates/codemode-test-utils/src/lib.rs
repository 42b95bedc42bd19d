//! Testing utilities for the codemode workspace
//!
//! Shared capability and provider fixtures.

#![allow(missing_docs)]

use async_trait::async_trait;
use codemode_registry::{
    Capability, CapabilityError, CapabilityProvider, CapabilityRegistry, ProviderError,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// `mathAdd(a, b)`: sum of the numeric arguments
pub fn math_add() -> Capability {
    Capability::from_fn("mathAdd", "Adds two numbers", |args: Vec<Value>| async move {
        let sum: f64 = args.iter().filter_map(Value::as_f64).sum();
        Ok(json!(sum))
    })
}

/// Capability that always fails with `message`
pub fn failing(name: &str, message: &str) -> Capability {
    let message = message.to_string();
    Capability::from_fn(name, "Always fails", move |_args: Vec<Value>| {
        let message = message.clone();
        async move { Err(CapabilityError::failed(message)) }
    })
}

/// Capability whose future never completes
pub fn never(name: &str) -> Capability {
    Capability::from_fn(name, "Never resolves", |_args: Vec<Value>| async {
        futures::future::pending::<Result<Value, CapabilityError>>().await
    })
}

/// Capability returning its arguments as an array
pub fn echo(name: &str) -> Capability {
    Capability::from_fn(name, "Echoes its arguments", |args: Vec<Value>| async move {
        Ok(Value::Array(args))
    })
}

/// Records the order capabilities were invoked in
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capability that appends `name` to the log and returns it
    pub fn capability(&self, name: &str) -> Capability {
        let calls = Arc::clone(&self.calls);
        let recorded = name.to_string();
        Capability::from_fn(name, "Records its invocation", move |_args: Vec<Value>| {
            let calls = Arc::clone(&calls);
            let recorded = recorded.clone();
            async move {
                calls.lock().push(recorded.clone());
                Ok(json!(recorded))
            }
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

/// Registry holding exactly `capabilities`
pub fn registry_of(capabilities: impl IntoIterator<Item = Capability>) -> Arc<CapabilityRegistry> {
    Arc::new(capabilities.into_iter().collect())
}

/// Provider that fails every listing and counts attempts
#[derive(Debug)]
pub struct FailingProvider {
    prefix: String,
    attempts: AtomicUsize,
}

impl FailingProvider {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CapabilityProvider for FailingProvider {
    fn prefix(&self) -> &str {
        &self.prefix
    }

    async fn list_capabilities(&self) -> Result<Vec<Capability>, ProviderError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(ProviderError::Unavailable(format!("{} is unreachable", self.prefix)))
    }
}

/// Provider serving fixed capabilities and counting listings
#[derive(Debug)]
pub struct CountingProvider {
    prefix: String,
    capabilities: Vec<Capability>,
    listings: AtomicUsize,
}

impl CountingProvider {
    pub fn new(prefix: &str, capabilities: Vec<Capability>) -> Self {
        Self {
            prefix: prefix.to_string(),
            capabilities,
            listings: AtomicUsize::new(0),
        }
    }

    pub fn listings(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CapabilityProvider for CountingProvider {
    fn prefix(&self) -> &str {
        &self.prefix
    }

    async fn list_capabilities(&self) -> Result<Vec<Capability>, ProviderError> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        Ok(self.capabilities.clone())
    }
}
