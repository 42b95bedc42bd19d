//! Error types for provider backends

use codemode_registry::{CapabilityError, ProviderError};

/// HTTP exchange with a backend failed
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// Connection, timeout or body transfer failure
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Backend answered with a non-success status
    #[error("backend returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, truncated
        body: String,
    },

    /// Response body did not have the expected shape
    #[error("unexpected response: {0}")]
    Decode(String),

    /// Endpoint URL could not be built from the configured base
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(String),
}

impl From<RequestError> for ProviderError {
    fn from(e: RequestError) -> Self {
        match e {
            RequestError::Decode(msg) => Self::InvalidListing(msg),
            RequestError::InvalidUrl(msg) => Self::Misconfigured(msg),
            other => Self::Unavailable(other.to_string()),
        }
    }
}

impl From<RequestError> for CapabilityError {
    fn from(e: RequestError) -> Self {
        Self::Upstream(e.to_string())
    }
}

/// Limit error bodies so one broken backend cannot flood logs
pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 512;
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_errors_become_invalid_listings() {
        let err: ProviderError = RequestError::Decode("expected array".to_string()).into();
        assert_eq!(err, ProviderError::InvalidListing("expected array".to_string()));

        let err: ProviderError = RequestError::Status {
            status: 503,
            body: "down".to_string(),
        }
        .into();
        assert!(matches!(err, ProviderError::Unavailable(msg) if msg.contains("503")));
    }

    #[test]
    fn long_bodies_are_truncated_on_char_boundary() {
        let body = "é".repeat(400);
        let short = truncate_body(&body);
        assert!(short.ends_with("..."));
        assert!(short.len() <= 515);
        assert_eq!(truncate_body("ok"), "ok");
    }
}
