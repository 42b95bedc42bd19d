//! Remote tool server provider
//!
//! Wire contract:
//!
//! ```text
//! GET  {base}/tools          → [{"name": "...", "description": "..."}]
//! POST {base}/tools/{name}   ← {"args": [...]}
//!                            → {"result": <json>} | {"error": "..."}
//! ```

use crate::config::HttpProviderConfig;
use crate::error::{truncate_body, RequestError};
use async_trait::async_trait;
use codemode_registry::{
    Capability, CapabilityError, CapabilityHandler, CapabilityInfo, CapabilityProvider,
    ProviderError,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Serialize)]
struct InvokeRequest<'a> {
    args: &'a [Value],
}

#[derive(Debug, Default, Deserialize)]
struct InvokeResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Provider backed by a remote tool server
#[derive(Debug, Clone)]
pub struct HttpToolProvider {
    prefix: String,
    base_url: String,
    client: reqwest::Client,
}

impl HttpToolProvider {
    /// Create provider with a default HTTP client
    #[must_use]
    pub fn new(prefix: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Create provider from configuration
    ///
    /// # Errors
    /// Returns [`ProviderError::Misconfigured`] when the HTTP client cannot
    /// be constructed.
    pub fn from_config(config: &HttpProviderConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ProviderError::Misconfigured(e.to_string()))?;
        Ok(Self::new(config.prefix.clone(), config.base_url.clone()).with_client(client))
    }

    /// Use a preconfigured client
    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Server base URL
    #[inline]
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base}/{segments..}` with each segment percent-encoded
    fn endpoint(&self, segments: &[&str]) -> Result<reqwest::Url, RequestError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| RequestError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| RequestError::InvalidUrl(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn fetch_listing(&self) -> Result<Vec<CapabilityInfo>, RequestError> {
        let response = self.client.get(self.endpoint(&["tools"])?).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RequestError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        response
            .json()
            .await
            .map_err(|e| RequestError::Decode(e.to_string()))
    }
}

#[async_trait]
impl CapabilityProvider for HttpToolProvider {
    fn prefix(&self) -> &str {
        &self.prefix
    }

    async fn list_capabilities(&self) -> Result<Vec<Capability>, ProviderError> {
        let listing = self.fetch_listing().await?;
        tracing::debug!(prefix = %self.prefix, tools = listing.len(), "tool server listing loaded");

        listing
            .into_iter()
            .map(|info| -> Result<Capability, ProviderError> {
                let handler = RemoteTool {
                    client: self.client.clone(),
                    url: self.endpoint(&["tools", &info.name])?,
                };
                Ok(Capability::new(info.name, info.description, Arc::new(handler)))
            })
            .collect()
    }
}

/// One tool on a remote server
struct RemoteTool {
    client: reqwest::Client,
    url: reqwest::Url,
}

#[async_trait]
impl CapabilityHandler for RemoteTool {
    async fn invoke(&self, args: Vec<Value>) -> Result<Value, CapabilityError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&InvokeRequest { args: &args })
            .send()
            .await
            .map_err(RequestError::from)?;

        let status = response.status();
        let text = response.text().await.map_err(RequestError::from)?;

        // Error bodies may still carry a tool-level {"error"} message
        let body: InvokeResponse = match serde_json::from_str(&text) {
            Ok(body) => body,
            Err(_) if !status.is_success() => {
                return Err(RequestError::Status {
                    status: status.as_u16(),
                    body: truncate_body(&text),
                }
                .into())
            }
            Err(e) => return Err(RequestError::Decode(e.to_string()).into()),
        };

        match body {
            InvokeResponse { error: Some(message), .. } => Err(CapabilityError::Failed(message)),
            InvokeResponse { result, .. } if status.is_success() => {
                Ok(result.unwrap_or(Value::Null))
            }
            _ => Err(RequestError::Status {
                status: status.as_u16(),
                body: truncate_body(&text),
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_names_are_percent_encoded() {
        let provider = HttpToolProvider::new("remote", "http://127.0.0.1:9/api/");
        assert_eq!(
            provider.endpoint(&["tools"]).unwrap().as_str(),
            "http://127.0.0.1:9/api/tools"
        );
        assert_eq!(
            provider.endpoint(&["tools", "web search/v2?x"]).unwrap().as_str(),
            "http://127.0.0.1:9/api/tools/web%20search%2Fv2%3Fx"
        );
    }

    #[test]
    fn unusable_base_url_is_misconfigured() {
        let provider = HttpToolProvider::new("remote", "not a url");
        let err = ProviderError::from(provider.endpoint(&["tools"]).unwrap_err());
        assert!(matches!(err, ProviderError::Misconfigured(_)), "{err}");
    }
}
