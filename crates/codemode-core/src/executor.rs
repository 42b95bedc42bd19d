//! Sandboxed script execution
//!
//! ```text
//! script ──→ parse ──→ Interpreter (capability globals only) ──→ ExecutionResult
//!                           │
//!                           └── InstrumentedCapability ──→ Capability::invoke
//! ```
//!
//! The interpreter scope holds nothing but the registry's capabilities:
//! each one by its bare name and under the `codemode` and `tools`
//! namespaces, plus the language intrinsics. There is no filesystem,
//! network, environment or process access.
//!
//! A run is bounded by one deadline. CPU-bound code observes it at loop
//! and call checkpoints; pending capability futures are dropped when the
//! outer timer fires.

use crate::config::ExecutorConfig;
use crate::types::{ExecutionId, ExecutionResult, FailureKind};
use async_trait::async_trait;
use codemode_registry::{Capability, CapabilityRegistry};
use codemode_script::{HostFunction, Interpreter, ScriptError, Value};
use serde_json::Value as Json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::Instrument;

/// Namespaces the capability mapping is bound under
pub const NAMESPACES: [&str; 2] = ["codemode", "tools"];

/// Timeouts above this run without a deadline
const MAX_DEADLINE: Duration = Duration::from_secs(86_400 * 365);

/// Runs orchestration scripts against a capability registry
#[derive(Debug, Clone, Default)]
pub struct SandboxExecutor {
    config: ExecutorConfig,
}

impl SandboxExecutor {
    /// Create executor
    #[inline]
    #[must_use]
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    /// Timeout used by [`SandboxExecutor::execute`]
    #[inline]
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        self.config.timeout()
    }

    /// Run `script` with the configured timeout
    pub async fn execute(&self, registry: &CapabilityRegistry, script: &str) -> ExecutionResult {
        self.execute_with_timeout(registry, script, self.default_timeout())
            .await
    }

    /// Run `script`, failing with a timeout once `timeout` has elapsed
    ///
    /// Never fails: compilation errors, uncaught exceptions and timeouts
    /// all become [`ExecutionResult::Failure`].
    pub async fn execute_with_timeout(
        &self,
        registry: &CapabilityRegistry,
        script: &str,
        timeout: Duration,
    ) -> ExecutionResult {
        let id = ExecutionId::new();
        let span = tracing::info_span!("execute", execution_id = %id);
        self.run(registry, script, timeout).instrument(span).await
    }

    async fn run(
        &self,
        registry: &CapabilityRegistry,
        script: &str,
        timeout: Duration,
    ) -> ExecutionResult {
        let started = Instant::now();

        let program = match codemode_script::parse(script) {
            Ok(program) => program,
            Err(e) => {
                tracing::warn!(error = %e, "script compilation failed");
                return record(
                    ExecutionResult::failure(
                        format!("Script compilation failed: {e}"),
                        FailureKind::Compilation,
                    ),
                    started,
                );
            }
        };

        let deadline = if timeout > MAX_DEADLINE {
            None
        } else {
            started.checked_add(timeout)
        };
        let mut builder = Interpreter::builder()
            .globals(bind_capabilities(registry))
            .yield_every(self.config.yield_every)
            .max_call_depth(self.config.max_call_depth);
        if let Some(deadline) = deadline {
            builder = builder.deadline(deadline);
        }
        let interpreter = builder.build();

        tracing::debug!(
            capabilities = registry.len(),
            timeout_ms = millis(timeout),
            "running script"
        );
        let outcome = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, interpreter.run(&program))
                .await
                .unwrap_or(Err(ScriptError::DeadlineExceeded)),
            None => interpreter.run(&program).await,
        };
        interpreter.shutdown();

        let result = match outcome {
            Ok(value) => match value.try_result_string() {
                Ok(text) => ExecutionResult::success(text, value.type_of()),
                Err(e) => ExecutionResult::failure(
                    format!("{}: {e}", e.error_name()),
                    FailureKind::Runtime,
                ),
            },
            Err(ScriptError::Uncaught { name, message }) => ExecutionResult::failure(
                uncaught_message(name.as_deref(), message),
                FailureKind::Runtime,
            ),
            Err(ScriptError::DeadlineExceeded) => timed_out(timeout),
        };

        // Work done between checkpoints still counts against the deadline
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return record(timed_out(timeout), started);
        }
        record(result, started)
    }
}

fn timed_out(timeout: Duration) -> ExecutionResult {
    ExecutionResult::failure(
        format!("Execution timed out after {}ms", millis(timeout)),
        FailureKind::Timeout,
    )
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Plain `Error`s keep their bare message; other error names are prefixed
fn uncaught_message(name: Option<&str>, message: String) -> String {
    match name {
        Some(name) if name != "Error" => format!("{name}: {message}"),
        _ => message,
    }
}

fn record(result: ExecutionResult, started: Instant) -> ExecutionResult {
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    let outcome = result.failure_kind().map_or("success", FailureKind::as_str);

    metrics::counter!("codemode_executions_total", "outcome" => outcome).increment(1);
    metrics::histogram!("codemode_execution_duration_ms").record(elapsed_ms);

    match &result {
        ExecutionResult::Success { value_type, .. } => {
            tracing::info!(elapsed_ms, value_type = %value_type, "script succeeded");
        }
        ExecutionResult::Failure { error, kind } => {
            tracing::info!(elapsed_ms, kind = %kind, error = %error, "script failed");
        }
    }
    result
}

/// Script globals for every capability in `registry`
///
/// Names that are not valid identifiers are only reachable through the
/// namespaces, e.g. `codemode["web-search"]`.
fn bind_capabilities(registry: &CapabilityRegistry) -> Vec<(String, Value)> {
    let functions: Vec<(String, Value)> = registry
        .iter()
        .map(|capability| {
            let host: Arc<dyn HostFunction> =
                Arc::new(InstrumentedCapability::new(capability.clone()));
            (
                capability.name().to_string(),
                Value::host_function(capability.name(), host),
            )
        })
        .collect();

    let mut globals: Vec<(String, Value)> = functions
        .iter()
        .filter(|(name, _)| is_identifier(name))
        .cloned()
        .collect();

    for namespace in NAMESPACES {
        globals.push((namespace.to_string(), Value::object_from(functions.iter().cloned())));
    }
    globals
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Capability call with logging, metrics and named failures
struct InstrumentedCapability {
    capability: Capability,
}

impl InstrumentedCapability {
    fn new(capability: Capability) -> Self {
        Self { capability }
    }
}

#[async_trait]
impl HostFunction for InstrumentedCapability {
    async fn call(&self, args: Vec<Json>) -> Result<Json, String> {
        let name = self.capability.name();
        let started = Instant::now();
        let result = self.capability.invoke(args).await;
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        let outcome = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(
            "codemode_capability_calls_total",
            "capability" => name.to_string(),
            "outcome" => outcome
        )
        .increment(1);
        metrics::histogram!("codemode_capability_duration_ms", "capability" => name.to_string())
            .record(duration_ms);

        match result {
            Ok(value) => {
                tracing::debug!(capability = name, duration_ms, "capability call completed");
                Ok(value)
            }
            Err(e) => {
                tracing::debug!(
                    capability = name,
                    duration_ms,
                    error = %e,
                    "capability call failed"
                );
                Err(format!("Capability '{name}' failed: {e}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codemode_registry::CapabilityError;
    use serde_json::json;

    fn registry(capabilities: Vec<Capability>) -> CapabilityRegistry {
        capabilities.into_iter().collect()
    }

    #[test]
    fn identifiers() {
        assert!(is_identifier("mathAdd"));
        assert!(is_identifier("_private$1"));
        assert!(!is_identifier("web-search"));
        assert!(!is_identifier("1st"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn uncaught_names_prefix_non_plain_errors() {
        assert_eq!(uncaught_message(Some("Error"), "boom".to_string()), "boom");
        assert_eq!(uncaught_message(None, "oops".to_string()), "oops");
        assert_eq!(
            uncaught_message(Some("ReferenceError"), "fetch is not defined".to_string()),
            "ReferenceError: fetch is not defined"
        );
    }

    #[test]
    fn bindings_cover_bare_names_and_namespaces() {
        let registry = registry(vec![
            Capability::from_fn("kw_search", "", |_args: Vec<Json>| async { Ok(json!(1)) }),
            Capability::from_fn("web-fetch", "", |_args: Vec<Json>| async { Ok(json!(2)) }),
        ]);

        let names: Vec<String> = bind_capabilities(&registry).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["kw_search", "codemode", "tools"]);
    }

    #[tokio::test]
    async fn instrumented_failure_names_capability() {
        let capability = Capability::from_fn("flaky", "", |_args: Vec<Json>| async {
            Err(CapabilityError::failed("boom"))
        });
        let err = InstrumentedCapability::new(capability).call(vec![]).await.unwrap_err();
        assert_eq!(err, "Capability 'flaky' failed: boom");
    }

    #[tokio::test]
    async fn non_identifier_capability_reachable_through_namespace() {
        let registry = registry(vec![Capability::from_fn("web-fetch", "", |_args: Vec<Json>| async {
            Ok(json!("page"))
        })]);
        let result = SandboxExecutor::default()
            .execute(&registry, r#"return await tools["web-fetch"]();"#)
            .await;
        assert_eq!(result, ExecutionResult::success("page", "string"));
    }

    #[tokio::test]
    async fn compilation_failure() {
        let result = SandboxExecutor::default()
            .execute(&CapabilityRegistry::new(), "return (1 + ;")
            .await;
        assert_eq!(result.failure_kind(), Some(FailureKind::Compilation));
        assert!(result.error().unwrap().starts_with("Script compilation failed: "));
    }
}
