//! Single-function adapters over chat completion endpoints
//!
//! - [`ChatCompletionAdapter`] registers `chat_completion(prompt, system?)`
//! - [`ResearchSearchAdapter`] registers `research_search(query)`
//!
//! Both resolve their API key when constructed; [`CapabilityAdapter::build`]
//! fails without one, so a missing key removes the capability instead of
//! breaking aggregation.

use crate::completion::{ChatMessage, CompletionClient};
use crate::config::CompletionConfig;
use async_trait::async_trait;
use codemode_registry::{
    Capability, CapabilityAdapter, CapabilityError, CapabilityHandler, ProviderError,
};
use serde_json::{json, Value};
use std::sync::Arc;

const RESEARCH_SYSTEM_PROMPT: &str = "You are a research assistant. Answer the query with concise, \
factual findings and cite the sources you relied on.";

fn client_for(
    config: &CompletionConfig,
    api_key: Option<&str>,
) -> Result<CompletionClient, ProviderError> {
    let key = api_key.ok_or_else(|| {
        ProviderError::Misconfigured(format!("missing API key: {} is not set", config.api_key_env))
    })?;
    CompletionClient::new(config, key).map_err(|e| ProviderError::Misconfigured(e.to_string()))
}

fn string_arg(args: &[Value], index: usize, what: &str) -> Result<String, CapabilityError> {
    match args.get(index) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        _ => Err(CapabilityError::invalid_arguments(format!(
            "expected a non-empty {what} string as argument {}",
            index + 1
        ))),
    }
}

// ---------------------------------------------------------------------------
// chat_completion

/// `chat_completion` adapter
#[derive(Debug, Clone)]
pub struct ChatCompletionAdapter {
    config: CompletionConfig,
    api_key: Option<String>,
}

impl ChatCompletionAdapter {
    /// Fixed registry name
    pub const NAME: &'static str = "chat_completion";

    /// Create adapter, reading the key from `config.api_key_env`
    #[must_use]
    pub fn from_config(config: CompletionConfig) -> Self {
        let api_key = config.api_key_from_env();
        Self { config, api_key }
    }

    /// Override the API key
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

#[async_trait]
impl CapabilityAdapter for ChatCompletionAdapter {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn build(&self) -> Result<Capability, ProviderError> {
        let client = client_for(&self.config, self.api_key.as_deref())?;
        let description = format!(
            "Ask the {} chat model. Arguments: (prompt: string, system?: string). \
             Returns the reply text.",
            client.model()
        );
        Ok(Capability::new(Self::NAME, description, Arc::new(ChatHandler { client })))
    }
}

struct ChatHandler {
    client: CompletionClient,
}

#[async_trait]
impl CapabilityHandler for ChatHandler {
    async fn invoke(&self, args: Vec<Value>) -> Result<Value, CapabilityError> {
        let prompt = string_arg(&args, 0, "prompt")?;
        let mut messages = Vec::with_capacity(2);
        if let Some(Value::String(system)) = args.get(1) {
            messages.push(ChatMessage::system(system.clone()));
        }
        messages.push(ChatMessage::user(prompt));

        let completion = self.client.complete(&messages).await?;
        Ok(Value::String(completion.content))
    }
}

// ---------------------------------------------------------------------------
// research_search

/// `research_search` adapter
#[derive(Debug, Clone)]
pub struct ResearchSearchAdapter {
    config: CompletionConfig,
    api_key: Option<String>,
}

impl ResearchSearchAdapter {
    /// Fixed registry name
    pub const NAME: &'static str = "research_search";

    /// Create adapter, reading the key from `config.api_key_env`
    #[must_use]
    pub fn from_config(config: CompletionConfig) -> Self {
        let api_key = config.api_key_from_env();
        Self { config, api_key }
    }

    /// Override the API key
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

#[async_trait]
impl CapabilityAdapter for ResearchSearchAdapter {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn build(&self) -> Result<Capability, ProviderError> {
        let client = client_for(&self.config, self.api_key.as_deref())?;
        Ok(Capability::new(
            Self::NAME,
            "Research a question on the web. Arguments: (query: string). \
             Returns {query, answer, citations}.",
            Arc::new(ResearchHandler { client }),
        ))
    }
}

struct ResearchHandler {
    client: CompletionClient,
}

#[async_trait]
impl CapabilityHandler for ResearchHandler {
    async fn invoke(&self, args: Vec<Value>) -> Result<Value, CapabilityError> {
        let query = string_arg(&args, 0, "query")?;
        let messages = [
            ChatMessage::system(RESEARCH_SYSTEM_PROMPT),
            ChatMessage::user(query.clone()),
        ];

        let completion = self.client.complete(&messages).await?;
        Ok(json!({
            "query": query,
            "answer": completion.content,
            "citations": completion.citations,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn build_fails_without_key() {
        const UNSET: &str = "CODEMODE_TEST_UNSET_VARIABLE_51C2";
        let config = CompletionConfig::chat().with_api_key_env(UNSET);
        let adapter = ChatCompletionAdapter::from_config(config);

        let err = adapter.build().await.unwrap_err();
        assert!(matches!(err, ProviderError::Misconfigured(msg) if msg.contains(UNSET)));
    }

    #[tokio::test]
    async fn explicit_key_builds_fixed_names() {
        let chat =
            ChatCompletionAdapter::from_config(CompletionConfig::chat()).with_api_key("sk-test");
        let research = ResearchSearchAdapter::from_config(CompletionConfig::research())
            .with_api_key("pk-test");

        assert_eq!(chat.build().await.unwrap().name(), "chat_completion");
        assert_eq!(research.build().await.unwrap().name(), "research_search");
    }

    #[tokio::test]
    async fn empty_prompt_is_rejected_before_any_request() {
        let config = CompletionConfig::chat().with_base_url("http://127.0.0.1:9");
        let capability = ChatCompletionAdapter::from_config(config)
            .with_api_key("sk-test")
            .build()
            .await
            .unwrap();

        let err = capability.invoke(vec![json!("  ")]).await.unwrap_err();
        assert!(matches!(err, CapabilityError::InvalidArguments(_)));
    }
}
