//! Orchestrator configuration
//!
//! ```toml
//! [executor]
//! timeout_ms = 30000
//! yield_every = 128
//!
//! [cache]
//! capacity = 10000
//! listing_ttl_secs = 300
//!
//! [[providers.http]]
//! prefix = "keywords"
//! base_url = "http://localhost:9000"
//!
//! [providers.chat_completion]
//! model = "gpt-4o-mini"
//! api_key_env = "OPENAI_API_KEY"
//! ```
//!
//! Every section and field is optional.

use crate::error::CodemodeError;
use codemode_providers::ProvidersConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Complete orchestrator configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodemodeConfig {
    /// Script execution limits
    pub executor: ExecutorConfig,
    /// Provider listing cache
    pub cache: CacheConfig,
    /// Capability sources
    pub providers: ProvidersConfig,
}

impl CodemodeConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate TOML text
    ///
    /// # Errors
    /// Returns [`CodemodeError::Toml`] for malformed text and
    /// [`CodemodeError::Config`] for unusable values.
    pub fn from_toml_str(text: &str) -> Result<Self, CodemodeError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    ///
    /// # Errors
    /// Returns [`CodemodeError::Io`] when the file cannot be read, otherwise
    /// as [`CodemodeConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CodemodeError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Check values that deserialise fine but cannot work
    ///
    /// # Errors
    /// Returns [`CodemodeError::Config`] naming the first bad field.
    pub fn validate(&self) -> Result<(), CodemodeError> {
        if self.executor.timeout_ms == 0 {
            return Err(CodemodeError::config("executor.timeout_ms must be positive"));
        }
        if self.executor.max_call_depth == 0 {
            return Err(CodemodeError::config("executor.max_call_depth must be positive"));
        }
        if self.cache.capacity == 0 {
            return Err(CodemodeError::config("cache.capacity must be positive"));
        }
        for server in &self.providers.http {
            if server.prefix.is_empty() {
                return Err(CodemodeError::config("providers.http prefix must not be empty"));
            }
            if !server.base_url.starts_with("http://") && !server.base_url.starts_with("https://") {
                return Err(CodemodeError::config(format!(
                    "providers.http '{}' base_url must be an http(s) URL",
                    server.prefix
                )));
            }
        }
        Ok(())
    }

    /// Set script timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.executor.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set how often loops yield to the runtime
    #[must_use]
    pub fn with_yield_every(mut self, n: u32) -> Self {
        self.executor.yield_every = n;
        self
    }

    /// Set maximum nested call depth
    #[must_use]
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.executor.max_call_depth = depth;
        self
    }

    /// Set listing cache capacity
    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: u64) -> Self {
        self.cache.capacity = capacity;
        self
    }

    /// Set listing TTL
    #[must_use]
    pub fn with_listing_ttl(mut self, ttl: Duration) -> Self {
        self.cache.listing_ttl_secs = ttl.as_secs();
        self
    }

    /// Set capability sources
    #[must_use]
    pub fn with_providers(mut self, providers: ProvidersConfig) -> Self {
        self.providers = providers;
        self
    }
}

/// Script execution limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Hard deadline per script
    pub timeout_ms: u64,
    /// Loop iterations and calls between cooperative yields
    pub yield_every: u32,
    /// Maximum nested function calls
    pub max_call_depth: usize,
}

impl ExecutorConfig {
    /// Hard deadline per script
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            yield_every: 128,
            max_call_depth: 128,
        }
    }
}

/// Provider listing cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum cached listings
    pub capacity: u64,
    /// How long a provider listing stays fresh
    pub listing_ttl_secs: u64,
}

impl CacheConfig {
    /// How long a provider listing stays fresh
    #[inline]
    #[must_use]
    pub fn listing_ttl(&self) -> Duration {
        Duration::from_secs(self.listing_ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            listing_ttl_secs: 300,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_file_is_default() {
        assert_eq!(CodemodeConfig::from_toml_str("").unwrap(), CodemodeConfig::default());
        assert_eq!(CodemodeConfig::default().executor.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let config = CodemodeConfig::from_toml_str(
            r#"
            [executor]
            timeout_ms = 500

            [[providers.http]]
            prefix = "keywords"
            base_url = "http://localhost:9000"

            [providers.research_search]
            api_key_env = "RESEARCH_KEY"
            "#,
        )
        .unwrap();

        assert_eq!(config.executor.timeout_ms, 500);
        assert_eq!(config.executor.yield_every, 128);
        assert_eq!(config.cache.listing_ttl(), Duration::from_secs(300));
        assert_eq!(config.providers.http.len(), 1);
        assert_eq!(
            config.providers.research_search.map(|r| r.api_key_env),
            Some("RESEARCH_KEY".to_string())
        );
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = CodemodeConfig::from_toml_str("[executor]\ntimeout_ms = 0").unwrap_err();
        assert!(matches!(err, CodemodeError::Config(msg) if msg.contains("timeout_ms")));

        let err = CodemodeConfig::from_toml_str(
            "[[providers.http]]\nprefix = \"kw\"\nbase_url = \"ftp://example.org\"",
        )
        .unwrap_err();
        assert!(matches!(err, CodemodeError::Config(_)));

        assert!(matches!(
            CodemodeConfig::from_toml_str("[executor\n").unwrap_err(),
            CodemodeError::Toml(_)
        ));
    }

    #[test]
    fn builders_override_fields() {
        let config = CodemodeConfig::new()
            .with_timeout(Duration::from_millis(250))
            .with_yield_every(16)
            .with_max_call_depth(64)
            .with_cache_capacity(10)
            .with_listing_ttl(Duration::from_secs(5));

        assert_eq!(config.executor.timeout_ms, 250);
        assert_eq!(config.executor.yield_every, 16);
        assert_eq!(config.executor.max_call_depth, 64);
        assert_eq!(config.cache.capacity, 10);
        assert_eq!(config.cache.listing_ttl_secs, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codemode.toml");
        std::fs::write(&path, "[cache]\ncapacity = 7\n").unwrap();

        assert_eq!(CodemodeConfig::load(&path).unwrap().cache.capacity, 7);
        assert!(matches!(
            CodemodeConfig::load(dir.path().join("missing.toml")).unwrap_err(),
            CodemodeError::Io(_)
        ));
    }
}
