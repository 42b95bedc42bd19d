//! Host function boundary
//!
//! The only way a script reaches outside the interpreter is through a
//! [`HostFunction`] the embedder bound into its global scope. Arguments and
//! results cross the boundary as JSON.

use async_trait::async_trait;
use serde_json::Value as Json;

/// Async function provided by the embedder
///
/// Calls from scripts produce promises. An `Err` rejects the promise with an
/// `Error` whose message is the returned string.
#[async_trait]
pub trait HostFunction: Send + Sync {
    /// Invoke with positional JSON arguments
    async fn call(&self, args: Vec<Json>) -> Result<Json, String>;
}

#[async_trait]
impl<F> HostFunction for F
where
    F: Fn(Vec<Json>) -> Result<Json, String> + Send + Sync,
{
    async fn call(&self, args: Vec<Json>) -> Result<Json, String> {
        self(args)
    }
}
