//! Error types for the LLM client

use thiserror::Error;

/// Errors that can occur when talking to a model server
#[derive(Error, Debug)]
pub enum LlmError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Failed to serialize/deserialize JSON
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Server answered with a non-success status
    #[error("LLM API error (status {status}): {body}")]
    ApiError { status: u16, body: String },

    /// Credentials rejected
    #[error("LLM server rejected credentials (status {0})")]
    Unauthorized(u16),

    /// Model not found or not pulled
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Too many requests
    #[error("Rate limited by LLM server")]
    RateLimited,

    /// Request timeout
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Response did not have the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Connection refused (server not running)
    #[error("Connection refused. Is the model server running at {0}?")]
    ConnectionRefused(String),

    /// All retry attempts exhausted
    #[error("All {attempts} retry attempts failed. Last error: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

impl LlmError {
    /// Check if this error is retryable (transient)
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Timeout(_) | LlmError::ConnectionRefused(_) | LlmError::RateLimited => true,
            LlmError::ApiError { status, .. } => *status >= 500,
            LlmError::HttpError(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// Result type for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;
