//! Codemode Core - agent code-execution orchestrator
//!
//! Turns a set of independent capability providers into one tool a model
//! can drive with a script:
//! - Aggregates capabilities into an immutable registry per session
//! - Describes them to the model as a single `execute_code` tool
//! - Runs model-written scripts in an embedded interpreter under a deadline
//! - Reports every outcome as a structured [`ExecutionResult`]
//!
//! # Architecture
//!
//! ```text
//! Orchestrator ──→ RegistryAggregator ──→ CapabilityRegistry
//!      │ open_session                            │
//!      ▼                                         ▼
//! ToolDescriptor ── call(script) ──→ SandboxExecutor (interpreter)
//!      │
//!      └──→ ExecutionResult {success, result|error, type}
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use codemode_core::prelude::*;
//!
//! # async fn example() -> Result<(), CodemodeError> {
//! let orchestrator = Orchestrator::new(&CodemodeConfig::load("codemode.toml")?);
//! let session = orchestrator.open_session(None).await;
//!
//! println!("{}", session.tool.description());
//! let result = session.tool.call(&serde_json::json!({
//!     "script": "const [a, b] = await Promise.all([kw_volume('rust'), kw_volume('go')]); return a + b;"
//! })).await;
//! println!("{}", result.to_json());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod executor;
pub mod facade;
pub mod orchestrator;
pub mod types;

pub use config::{CacheConfig, CodemodeConfig, ExecutorConfig};
pub use error::CodemodeError;
pub use executor::SandboxExecutor;
pub use facade::{
    make_orchestration_tool, make_orchestration_tool_with, ToolDefinition, ToolDescriptor,
    TOOL_NAME,
};
pub use orchestrator::{Orchestrator, Session};
pub use types::{ExecutionId, ExecutionRequest, ExecutionResult, FailureKind};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running orchestration sessions
    pub use crate::{
        make_orchestration_tool, CodemodeConfig, CodemodeError, ExecutionRequest, ExecutionResult,
        FailureKind, Orchestrator, SandboxExecutor, Session, ToolDescriptor,
    };
    pub use codemode_registry::{Capability, CapabilityRegistry};
    pub use std::sync::Arc;
}
