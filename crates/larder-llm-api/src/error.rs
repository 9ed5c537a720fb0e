use thiserror::Error;

use crate::config::BackendType;

/// Errors surfaced by the chat clients and the provider selector.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Missing or invalid credential, URL or provider name.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The backend answered with a non-success HTTP status.
    #[error("{backend} API error ({status}): {message}")]
    Provider {
        backend: BackendType,
        status: u16,
        message: String,
    },

    #[error("{backend} request timed out after {millis}ms")]
    Timeout { backend: BackendType, millis: u64 },

    #[error("{backend} transport error: {message}")]
    Transport { backend: BackendType, message: String },

    /// The self-hosted server refused the connection.
    #[error("LLM service unreachable at {url}; is the server running?")]
    ServiceUnreachable { url: String },

    /// A success response whose body is not the expected JSON document.
    #[error("{backend} returned an invalid response: {message}")]
    InvalidResponse { backend: BackendType, message: String },

    #[error("stream produced no data for {millis}ms")]
    StreamIdle { millis: u64 },
}

impl LlmError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::StreamIdle { .. })
    }

    /// HTTP status for provider errors
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Provider { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T, E = LlmError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message() {
        let err = LlmError::Timeout { backend: BackendType::OpenAI, millis: 30000 };
        assert_eq!(err.to_string(), "openai request timed out after 30000ms");
        assert!(err.is_timeout());
    }

    #[test]
    fn test_provider_status() {
        let err = LlmError::Provider {
            backend: BackendType::Anthropic,
            status: 429,
            message: "rate limited".to_string(),
        };
        assert_eq!(err.status(), Some(429));
        assert_eq!(err.to_string(), "anthropic API error (429): rate limited");
    }
}
