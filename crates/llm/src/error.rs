//! Error types for the LLM boundary.

use thiserror::Error;

/// Errors that can occur when calling the LLM API.
#[derive(Debug, Error)]
pub enum LlmError {
    /// API request failed with a non-success status.
    #[error("API error: {status_code} - {message}")]
    Api {
        /// HTTP status code.
        status_code: u16,
        /// Error body from the API.
        message: String,
    },

    /// Network or transport error.
    #[error("network error: {0}")]
    Network(String),

    /// The response carried no usable text.
    #[error("empty response from model")]
    EmptyResponse,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

/// Result type alias for LLM operations.
pub type Result<T> = std::result::Result<T, LlmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = LlmError::Api {
            status_code: 401,
            message: "invalid key".to_string(),
        };
        assert!(err.to_string().contains("401"));
        assert!(err.to_string().contains("invalid key"));
    }

    #[test]
    fn test_empty_response_display() {
        assert!(LlmError::EmptyResponse.to_string().contains("empty"));
    }
}
