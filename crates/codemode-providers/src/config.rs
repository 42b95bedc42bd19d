//! Provider configuration
//!
//! Loaded as the `[providers]` section of the codemode TOML file. API keys
//! are never stored here, only the names of the environment variables that
//! hold them.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default per-request timeout for provider backends
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;

/// Every configured capability source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Remote tool servers
    pub http: Vec<HttpProviderConfig>,
    /// `chat_completion` adapter
    pub chat_completion: Option<CompletionConfig>,
    /// `research_search` adapter
    pub research_search: Option<CompletionConfig>,
}

impl ProvidersConfig {
    /// Create empty configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a remote tool server
    #[must_use]
    pub fn with_http(mut self, provider: HttpProviderConfig) -> Self {
        self.http.push(provider);
        self
    }

    /// Enable the `chat_completion` adapter
    #[must_use]
    pub fn with_chat_completion(mut self, config: CompletionConfig) -> Self {
        self.chat_completion = Some(config);
        self
    }

    /// Enable the `research_search` adapter
    #[must_use]
    pub fn with_research_search(mut self, config: CompletionConfig) -> Self {
        self.research_search = Some(config);
        self
    }

    /// Check if no source is configured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.http.is_empty() && self.chat_completion.is_none() && self.research_search.is_none()
    }
}

/// Remote tool server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpProviderConfig {
    /// Prefix qualifying this server's tool names
    pub prefix: String,
    /// Base URL; tools are listed at `{base_url}/tools`
    pub base_url: String,
    /// Per-request timeout
    #[serde(default = "default_request_timeout_ms")]
    pub timeout_ms: u64,
}

impl HttpProviderConfig {
    /// Create with the default timeout
    #[must_use]
    pub fn new(prefix: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            base_url: base_url.into(),
            timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }

    /// Per-request timeout
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// OpenAI-compatible `/chat/completions` endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Base URL, without the `/chat/completions` suffix
    pub base_url: String,
    /// Model name sent with every request
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Per-request timeout
    pub timeout_ms: u64,
    /// Completion token limit
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    pub temperature: Option<f32>,
}

impl CompletionConfig {
    /// Defaults for a general chat model
    #[must_use]
    pub fn chat() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_ms: 60_000,
            max_tokens: None,
            temperature: None,
        }
    }

    /// Defaults for a search-grounded research model
    #[must_use]
    pub fn research() -> Self {
        Self {
            base_url: "https://api.perplexity.ai".to_string(),
            model: "sonar".to_string(),
            api_key_env: "PERPLEXITY_API_KEY".to_string(),
            timeout_ms: 60_000,
            max_tokens: None,
            temperature: None,
        }
    }

    /// Set base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set API key variable name
    #[must_use]
    pub fn with_api_key_env(mut self, name: impl Into<String>) -> Self {
        self.api_key_env = name.into();
        self
    }

    /// Per-request timeout
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Read the API key from the environment; empty values count as unset
    #[must_use]
    pub fn api_key_from_env(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok().filter(|key| !key.trim().is_empty())
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self::chat()
    }
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}
