//! Apple Music API error types

use thiserror::Error;

/// Apple Music API client errors
#[derive(Error, Debug)]
pub enum AppleMusicError {
    /// Developer token could not be minted
    #[error("Failed to sign developer token: {0}")]
    Signing(String),

    /// Invalid input provided to API method
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("Failed to parse Apple Music response: {0}")]
    Parse(#[from] serde_json::Error),

    /// Apple Music returned a non-success status
    #[error("Apple Music API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Developer token rejected
    #[error("Apple Music rejected the developer token (status {0})")]
    Unauthorized(u16),

    /// Catalog resource not found
    #[error("Not found in catalog: {0}")]
    NotFound(String),

    /// Rate limited by Apple Music
    #[error("Rate limited by Apple Music API")]
    RateLimited,

    /// Request timeout
    #[error("Request to Apple Music timed out")]
    Timeout,
}

impl AppleMusicError {
    /// Check if this error is retryable (transient failure)
    ///
    /// Retries on timeouts, rate limiting, transport errors and 5xx
    /// responses. Client errors are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppleMusicError::Timeout | AppleMusicError::RateLimited => true,
            AppleMusicError::Api { status, .. } => *status >= 500,
            AppleMusicError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// Result type for Apple Music operations
pub type AppleMusicResult<T> = Result<T, AppleMusicError>;
