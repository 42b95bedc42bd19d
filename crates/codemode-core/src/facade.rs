//! Orchestration tool facade
//!
//! Presents a whole [`CapabilityRegistry`] to a model as a single tool
//! whose only input is a script. The model learns which capabilities exist
//! from the tool description; the registry itself is never exposed.

use crate::executor::SandboxExecutor;
use crate::types::{ExecutionRequest, ExecutionResult, FailureKind};
use codemode_registry::CapabilityRegistry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Name the tool is registered under
pub const TOOL_NAME: &str = "execute_code";

const PREAMBLE: &str = "\
Execute JavaScript to orchestrate the capabilities listed below in a single step.

The script runs as the body of an async function. Every capability is an async
function: call it by name (or as `codemode.<name>` / `tools.<name>`), `await` the
result, and `return` the final value. Use `Promise.all` for independent calls and
`try`/`catch` to handle failures. Only these capabilities and standard built-ins
(JSON, Math, Object, Array, String, Promise, console) are available.";

/// What a model host registers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name
    pub name: String,
    /// Instructions plus capability listing
    pub description: String,
    /// JSON schema of [`ExecutionRequest`]
    pub input_schema: Value,
}

/// The single callable tool wrapping a registry
#[derive(Clone)]
pub struct ToolDescriptor {
    name: String,
    description: String,
    registry: Arc<CapabilityRegistry>,
    executor: SandboxExecutor,
}

impl ToolDescriptor {
    /// Tool name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tool description
    #[inline]
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Number of capabilities reachable from scripts
    #[inline]
    #[must_use]
    pub fn capability_count(&self) -> usize {
        self.registry.len()
    }

    /// Name, description and input schema
    #[must_use]
    pub fn definition(&self) -> ToolDefinition {
        let schema = schemars::schema_for!(ExecutionRequest);
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: serde_json::to_value(schema).unwrap_or(Value::Null),
        }
    }

    /// Run the tool on model-provided input `{"script": "..."}`
    ///
    /// Malformed input is reported as a failure, never as an error.
    pub async fn call(&self, input: &Value) -> ExecutionResult {
        match serde_json::from_value::<ExecutionRequest>(input.clone()) {
            Ok(request) => self.execute(&request).await,
            Err(e) => invalid_input(&e),
        }
    }

    /// Run the tool on raw JSON text
    pub async fn call_str(&self, input: &str) -> ExecutionResult {
        match serde_json::from_str::<ExecutionRequest>(input) {
            Ok(request) => self.execute(&request).await,
            Err(e) => invalid_input(&e),
        }
    }

    /// Run an already decoded request
    pub async fn execute(&self, request: &ExecutionRequest) -> ExecutionResult {
        self.executor.execute(&self.registry, &request.script).await
    }
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("capabilities", &self.registry.len())
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}

fn invalid_input(e: &serde_json::Error) -> ExecutionResult {
    tracing::warn!(error = %e, "rejected orchestration tool input");
    ExecutionResult::failure(
        format!("Invalid tool input: {e}. Expected {{\"script\": \"...\"}}"),
        FailureKind::InvalidInput,
    )
}

/// Wrap `registry` as the orchestration tool with default limits
#[must_use]
pub fn make_orchestration_tool(registry: Arc<CapabilityRegistry>) -> ToolDescriptor {
    make_orchestration_tool_with(registry, SandboxExecutor::default())
}

/// Wrap `registry` as the orchestration tool using `executor`
#[must_use]
pub fn make_orchestration_tool_with(
    registry: Arc<CapabilityRegistry>,
    executor: SandboxExecutor,
) -> ToolDescriptor {
    let listing = if registry.is_empty() {
        "(no capabilities are currently available)".to_string()
    } else {
        registry.describe()
    };

    ToolDescriptor {
        name: TOOL_NAME.to_string(),
        description: format!("{PREAMBLE}\n\nAvailable capabilities:\n{listing}"),
        registry,
        executor,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codemode_registry::Capability;
    use serde_json::json;

    fn tool() -> ToolDescriptor {
        let registry: CapabilityRegistry = [Capability::from_fn(
            "kw_volume",
            "Search volume for a keyword",
            |_args: Vec<Value>| async { Ok(json!(1200)) },
        )]
        .into_iter()
        .collect();
        make_orchestration_tool(Arc::new(registry))
    }

    #[test]
    fn description_lists_capabilities() {
        let tool = tool();
        assert_eq!(tool.name(), "execute_code");
        assert!(tool.description().contains("- kw_volume: Search volume for a keyword"));
        assert_eq!(tool.capability_count(), 1);
    }

    #[test]
    fn empty_registry_is_described() {
        let tool = make_orchestration_tool(Arc::new(CapabilityRegistry::new()));
        assert!(tool.description().contains("no capabilities"));
    }

    #[test]
    fn schema_requires_script_string() {
        let definition = tool().definition();
        assert_eq!(definition.input_schema["properties"]["script"]["type"], json!("string"));
        assert_eq!(definition.input_schema["required"], json!(["script"]));
    }

    #[tokio::test]
    async fn malformed_input_is_a_failure() {
        let tool = tool();

        let result = tool.call(&json!({"code": "return 1"})).await;
        assert_eq!(result.failure_kind(), Some(FailureKind::InvalidInput));

        let result = tool.call_str("not json").await;
        assert_eq!(result.failure_kind(), Some(FailureKind::InvalidInput));
    }

    #[tokio::test]
    async fn call_runs_script() {
        let result = tool()
            .call(&json!({"script": "return (await kw_volume('rust')) / 100;"}))
            .await;
        assert_eq!(result, ExecutionResult::success("12", "number"));
    }
}
