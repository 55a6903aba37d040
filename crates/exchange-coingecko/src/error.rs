//! Error types for the CoinGecko client.
//!
//! Provides typed errors for API communication, payload decoding, and
//! configuration failures, with transience classification used by the
//! retry loop.

use thiserror::Error;

/// Errors that can occur when talking to CoinGecko.
#[derive(Debug, Error)]
pub enum CoinGeckoError {
    /// API request failed with a non-success status.
    #[error("API error: {status_code} - {message}")]
    Api {
        /// HTTP status code.
        status_code: u16,
        /// Error message from the API.
        message: String,
    },

    /// Rate limit exceeded (HTTP 429).
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimit {
        /// Seconds to wait before retry.
        retry_after_secs: u64,
    },

    /// Network error.
    #[error("network error: {0}")]
    Network(String),

    /// Request timeout.
    #[error("request timeout: {0}")]
    Timeout(String),

    /// OHLC row with an unexpected number of elements.
    #[error("malformed OHLC row: expected 5 or 6 elements, got {len}")]
    MalformedRow {
        /// The element count observed.
        len: usize,
    },

    /// Retry budget exhausted.
    #[error("max retries exceeded after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Description of the last failure.
        last_error: String,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl CoinGeckoError {
    /// Creates an API error from status code and message.
    pub fn api(status_code: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status_code,
            message: message.into(),
        }
    }

    /// Creates a rate limit error.
    #[must_use]
    pub fn rate_limit(retry_after_secs: u64) -> Self {
        Self::RateLimit { retry_after_secs }
    }

    /// Creates a malformed row error.
    #[must_use]
    pub fn malformed_row(len: usize) -> Self {
        Self::MalformedRow { len }
    }

    /// Returns true if the request should be re-issued after a backoff.
    ///
    /// Transient failures are rate limits, network errors, timeouts, and
    /// server-side (5xx) errors. Client errors and malformed payloads are
    /// permanent.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::RateLimit { .. } => true,
            Self::Api { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for CoinGeckoError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Network(format!("connection failed: {err}"))
        } else if err.is_decode() {
            Self::Serialization(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for CoinGeckoError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias for CoinGecko operations.
pub type Result<T> = std::result::Result<T, CoinGeckoError>;
