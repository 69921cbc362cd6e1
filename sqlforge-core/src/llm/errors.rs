//! Error types for generative backend calls
//!
//! Every failure of a single backend round trip maps to one of these
//! variants. Nothing in this crate retries them; `is_retryable` tells a
//! caller which ones are worth another attempt.

use std::time::Duration;
use thiserror::Error;

/// Main error type for backend operations
#[derive(Debug, Error)]
pub enum LLMError {
    /// API key is missing or invalid
    #[error("Authentication failed: {message}")]
    AuthenticationError { message: String },

    /// Rate limit or quota has been exceeded
    #[error("Rate limit exceeded: {message}. Retry after {retry_after:?}")]
    RateLimitExceeded { message: String, retry_after: Option<Duration> },

    /// Request timed out
    #[error("Request timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Network error occurred
    #[error("Network error: {message}")]
    NetworkError { message: String },

    /// API returned an error status
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// Generation stopped at the output token budget
    #[error("Output truncated at the {limit} token limit")]
    OutputTruncated { limit: usize },

    /// The response carried no usable text
    #[error("Empty response from {provider}")]
    EmptyResponse { provider: String },

    /// Content was filtered by the backend
    #[error("Content filtered: {reason}")]
    ContentFiltered { reason: String },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    /// Parsing or serialization error
    #[error("Parsing error: {message}")]
    ParseError { message: String },
}

impl LLMError {
    /// Create an authentication error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::AuthenticationError { message: message.into() }
    }

    /// Create a rate limit error
    pub fn rate_limit(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self::RateLimitExceeded { message: message.into(), retry_after }
    }

    /// Create a timeout error
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout { duration }
    }

    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError { message: message.into() }
    }

    /// Create an API error
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError { status, message: message.into() }
    }

    /// Create an empty response error
    pub fn empty(provider: impl Into<String>) -> Self {
        Self::EmptyResponse { provider: provider.into() }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigurationError { message: message.into() }
    }

    /// Create a parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self::ParseError { message: message.into() }
    }

    /// Whether a caller-side retry has a chance of succeeding
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimitExceeded { .. } | Self::Timeout { .. } | Self::NetworkError { .. } => {
                true
            }
            Self::ApiError { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Suggested wait before the next attempt, when the backend sent one
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimitExceeded { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Result type for backend operations
pub type LLMResult<T> = Result<T, LLMError>;

impl From<serde_json::Error> for LLMError {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError { message: err.to_string() }
    }
}

impl From<reqwest::Error> for LLMError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::NetworkError { message: format!("request timed out: {}", err) }
        } else if err.is_decode() {
            Self::ParseError { message: err.to_string() }
        } else {
            Self::NetworkError { message: err.to_string() }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LLMError::auth("Invalid API key");
        assert_eq!(err.to_string(), "Authentication failed: Invalid API key");

        let err = LLMError::rate_limit("Quota exhausted", Some(Duration::from_secs(60)));
        assert!(err.to_string().contains("Rate limit exceeded"));

        let err = LLMError::OutputTruncated { limit: 8192 };
        assert_eq!(err.to_string(), "Output truncated at the 8192 token limit");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(LLMError::rate_limit("429", None).is_retryable());
        assert!(LLMError::timeout(Duration::from_secs(5)).is_retryable());
        assert!(LLMError::network("connection reset").is_retryable());
        assert!(LLMError::api(503, "unavailable").is_retryable());
        assert!(!LLMError::api(400, "bad request").is_retryable());
        assert!(!LLMError::auth("no key").is_retryable());
        assert!(!LLMError::OutputTruncated { limit: 10 }.is_retryable());
    }

    #[test]
    fn test_retry_after() {
        let err = LLMError::rate_limit("slow down", Some(Duration::from_secs(3)));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
        assert_eq!(LLMError::network("x").retry_after(), None);
    }

    #[test]
    fn test_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let llm_err: LLMError = json_err.into();
        assert!(matches!(llm_err, LLMError::ParseError { .. }));
    }
}
