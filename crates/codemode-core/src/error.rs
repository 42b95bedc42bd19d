//! Error types for the orchestrator
//!
//! Script outcomes are never errors: they become [`ExecutionResult`]
//! failures. [`CodemodeError`] only covers setting the orchestrator up.
//!
//! [`ExecutionResult`]: crate::types::ExecutionResult

/// Orchestrator setup failure
#[derive(Debug, thiserror::Error)]
pub enum CodemodeError {
    /// Configuration is syntactically valid but unusable
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Reading a configuration or script file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid TOML for [`CodemodeConfig`]
    ///
    /// [`CodemodeConfig`]: crate::config::CodemodeConfig
    #[error("failed to parse configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON encoding or decoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CodemodeError {
    /// Create configuration error
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_convert() {
        let err: CodemodeError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "codemode.toml").into();
        assert!(err.to_string().contains("codemode.toml"));
        assert!(CodemodeError::config("timeout_ms must be positive")
            .to_string()
            .starts_with("invalid configuration"));
    }
}
