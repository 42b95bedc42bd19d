//! Core types for codemode
//!
//! - [`ExecutionId`]: identifies one script run in logs
//! - [`ExecutionRequest`]: the single input of the orchestration tool
//! - [`ExecutionResult`]: structured outcome of a script run
//!
//! On the wire a result is always one flat object:
//!
//! ```text
//! {"success": true,  "result": "5",     "type": "number"}
//! {"success": false, "error":  "boom",  "type": "runtime"}
//! ```

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Unique execution identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExecutionId(pub Ulid);

impl ExecutionId {
    /// Generate new execution ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Input of the orchestration tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ExecutionRequest {
    /// JavaScript orchestration code. Runs as the body of an async function:
    /// use `await` on capability calls and `return` the final value.
    pub script: String,
}

impl ExecutionRequest {
    /// Create request
    #[inline]
    pub fn new(script: impl Into<String>) -> Self {
        Self { script: script.into() }
    }
}

/// Why a script run failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Script text could not be parsed
    Compilation,
    /// Uncaught exception, including capability failures
    Runtime,
    /// Deadline passed before the script settled
    Timeout,
    /// Tool input was not a valid [`ExecutionRequest`]
    InvalidInput,
}

impl FailureKind {
    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compilation => "compilation",
            Self::Runtime => "runtime",
            Self::Timeout => "timeout",
            Self::InvalidInput => "invalid_input",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailureKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "compilation" => Ok(Self::Compilation),
            "runtime" => Ok(Self::Runtime),
            "timeout" => Ok(Self::Timeout),
            "invalid_input" => Ok(Self::InvalidInput),
            other => Err(format!("unknown failure kind: {other}")),
        }
    }
}

/// Outcome of one script run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "WireResult", try_from = "WireResult")]
pub enum ExecutionResult {
    /// Script settled with a value
    Success {
        /// Serialised return value
        value: String,
        /// JavaScript `typeof` of the return value
        value_type: String,
    },
    /// Script did not settle normally
    Failure {
        /// Human readable message
        error: String,
        /// Failure category
        kind: FailureKind,
    },
}

impl ExecutionResult {
    /// Create success
    pub fn success(value: impl Into<String>, value_type: impl Into<String>) -> Self {
        Self::Success {
            value: value.into(),
            value_type: value_type.into(),
        }
    }

    /// Create failure
    pub fn failure(error: impl Into<String>, kind: FailureKind) -> Self {
        Self::Failure {
            error: error.into(),
            kind,
        }
    }

    /// Check if the script settled with a value
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Serialised value on success
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        match self {
            Self::Success { value, .. } => Some(value),
            Self::Failure { .. } => None,
        }
    }

    /// JavaScript `typeof` of the value on success
    #[must_use]
    pub fn value_type(&self) -> Option<&str> {
        match self {
            Self::Success { value_type, .. } => Some(value_type),
            Self::Failure { .. } => None,
        }
    }

    /// Error message on failure
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failure { error, .. } => Some(error),
            Self::Success { .. } => None,
        }
    }

    /// Failure category on failure
    #[must_use]
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Failure { kind, .. } => Some(*kind),
            Self::Success { .. } => None,
        }
    }

    /// Wire form as a JSON value
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Success { value, value_type } => json!({
                "success": true,
                "result": value,
                "type": value_type,
            }),
            Self::Failure { error, kind } => json!({
                "success": false,
                "error": error,
                "type": kind.as_str(),
            }),
        }
    }
}

/// Flat wire representation
#[derive(Serialize, Deserialize)]
struct WireResult {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(rename = "type")]
    kind: String,
}

impl From<ExecutionResult> for WireResult {
    fn from(result: ExecutionResult) -> Self {
        match result {
            ExecutionResult::Success { value, value_type } => Self {
                success: true,
                result: Some(value),
                error: None,
                kind: value_type,
            },
            ExecutionResult::Failure { error, kind } => Self {
                success: false,
                result: None,
                error: Some(error),
                kind: kind.as_str().to_string(),
            },
        }
    }
}

impl TryFrom<WireResult> for ExecutionResult {
    type Error = String;

    fn try_from(wire: WireResult) -> Result<Self, Self::Error> {
        if wire.success {
            let value = wire.result.ok_or("successful result without `result`")?;
            Ok(Self::success(value, wire.kind))
        } else {
            let error = wire.error.ok_or("failed result without `error`")?;
            Ok(Self::failure(error, wire.kind.parse()?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn success_wire_shape() {
        let result = ExecutionResult::success("5", "number");
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"success": true, "result": "5", "type": "number"})
        );
        assert_eq!(serde_json::to_value(&result).unwrap(), result.to_json());
    }

    #[test]
    fn failure_wire_shape() {
        let result =
            ExecutionResult::failure("Execution timed out after 50ms", FailureKind::Timeout);
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"success": false, "error": "Execution timed out after 50ms", "type": "timeout"})
        );
        assert_eq!(result.failure_kind(), Some(FailureKind::Timeout));
        assert!(result.value().is_none());
    }

    #[test]
    fn inconsistent_wire_is_rejected() {
        let missing_error = json!({"success": false, "type": "runtime"});
        assert!(serde_json::from_value::<ExecutionResult>(missing_error).is_err());
        let unknown_kind = json!({"success": false, "error": "x", "type": "weird"});
        assert!(serde_json::from_value::<ExecutionResult>(unknown_kind).is_err());
    }

    #[test]
    fn request_rejects_unknown_fields() {
        assert!(serde_json::from_value::<ExecutionRequest>(json!({"script": "return 1"})).is_ok());
        let extra_field = json!({"script": "", "code": ""});
        assert!(serde_json::from_value::<ExecutionRequest>(extra_field).is_err());
    }

    #[test]
    fn execution_ids_are_unique() {
        assert_ne!(ExecutionId::new(), ExecutionId::new());
    }

    fn any_kind() -> impl Strategy<Value = FailureKind> {
        prop_oneof![
            Just(FailureKind::Compilation),
            Just(FailureKind::Runtime),
            Just(FailureKind::Timeout),
            Just(FailureKind::InvalidInput),
        ]
    }

    proptest! {
        #[test]
        fn every_result_survives_the_wire(
            success in any::<bool>(),
            text in ".*",
            value_type in "[a-z]{1,9}",
            kind in any_kind(),
        ) {
            let result = if success {
                ExecutionResult::success(text, value_type)
            } else {
                ExecutionResult::failure(text, kind)
            };
            let encoded = serde_json::to_string(&result).unwrap();
            let decoded: ExecutionResult = serde_json::from_str(&encoded).unwrap();
            prop_assert_eq!(decoded, result);
        }
    }
}
