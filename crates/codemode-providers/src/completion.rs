//! Minimal OpenAI-compatible chat completion client
//!
//! Shared by the `chat_completion` and `research_search` adapters. Only the
//! non-streaming request shape is used.

use crate::config::CompletionConfig;
use crate::error::{truncate_body, RequestError};
use serde::{Deserialize, Serialize};

/// One chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `system`, `user` or `assistant`
    pub role: String,
    /// Message text
    pub content: String,
}

impl ChatMessage {
    /// System message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// User message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    citations: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// Assistant reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Text of the first choice
    pub content: String,
    /// Source URLs, for search-grounded models that return them
    pub citations: Vec<String>,
}

/// Client bound to one endpoint, model and key
#[derive(Debug, Clone)]
pub struct CompletionClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

impl CompletionClient {
    /// Create client for `config` authenticated with `api_key`
    ///
    /// # Errors
    /// Returns [`RequestError::Transport`] when the HTTP client cannot be
    /// constructed.
    pub fn new(
        config: &CompletionConfig,
        api_key: impl Into<String>,
    ) -> Result<Self, RequestError> {
        let http = reqwest::Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    /// Model name
    #[inline]
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send `messages` and return the first choice
    ///
    /// # Errors
    /// Returns [`RequestError`] on transport failures, non-success statuses
    /// and responses without choices.
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<Completion, RequestError> {
        let request = CompletionRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());
            return Err(RequestError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| RequestError::Decode(e.to_string()))?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| RequestError::Decode("response contained no choices".to_string()))?;

        tracing::debug!(
            model = %self.model,
            chars = choice.message.content.len(),
            "completion received"
        );

        Ok(Completion {
            content: choice.message.content,
            citations: body.citations,
        })
    }
}
