use std::result;

use crate::retry::RetryableError;
use thiserror::Error;

/// Error types for PMC retrieval operations
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Rendered request URL is longer than the transport accepts
    #[error("URL exceeds {max} bytes (got {length})")]
    UrlTooLong { length: usize, max: usize },

    /// Response was well-formed JSON but missing required fields
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Query could not be split back into two AND-joined groups
    #[error("Malformed query: {0}")]
    MalformedQuery(String),

    /// An oversized query produced no batch with both term groups
    #[error("No valid batches could be formed for a query of {query_len} bytes")]
    NoValidBatches { query_len: usize },

    /// The batch dispatch mechanism itself failed
    #[error("Batch dispatch failed: {0}")]
    DispatchFailed(String),

    /// API rate limit exceeded
    #[error("API rate limit exceeded")]
    RateLimitExceeded,

    /// Generic API error with HTTP status code
    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    /// Rejected configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = result::Result<T, RetrievalError>;

impl RetrievalError {
    /// Structural errors concern the dispatch machinery rather than a single batch
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            RetrievalError::DispatchFailed(_) | RetrievalError::NoValidBatches { .. }
        )
    }
}

impl RetryableError for RetrievalError {
    fn is_retryable(&self) -> bool {
        match self {
            RetrievalError::RequestError(err) => {
                if err.is_timeout() || err.is_connect() {
                    return true;
                }

                if let Some(status) = err.status() {
                    return status.is_server_error() || status.as_u16() == 429;
                }

                // DNS and other network errors
                !err.is_builder() && !err.is_redirect() && !err.is_decode()
            }

            RetrievalError::RateLimitExceeded => true,

            RetrievalError::ApiError { status, message } => {
                (*status >= 500 && *status < 600) || *status == 429 || {
                    let lower_msg = message.to_lowercase();
                    lower_msg.contains("temporarily unavailable")
                        || lower_msg.contains("timeout")
                        || lower_msg.contains("connection")
                }
            }

            RetrievalError::JsonError(_)
            | RetrievalError::UrlTooLong { .. }
            | RetrievalError::InvalidResponse(_)
            | RetrievalError::MalformedQuery(_)
            | RetrievalError::NoValidBatches { .. }
            | RetrievalError::DispatchFailed(_)
            | RetrievalError::InvalidConfig(_) => false,
        }
    }

    fn retry_reason(&self) -> &str {
        if self.is_retryable() {
            match self {
                RetrievalError::RequestError(err) if err.is_timeout() => "Request timeout",
                RetrievalError::RequestError(err) if err.is_connect() => "Connection error",
                RetrievalError::RequestError(_) => "Network error",
                RetrievalError::RateLimitExceeded => "Rate limit exceeded",
                RetrievalError::ApiError { status, .. } => match status {
                    429 => "Rate limit exceeded",
                    500..=599 => "Server error",
                    _ => "Temporary API error",
                },
                _ => "Transient error",
            }
        } else {
            match self {
                RetrievalError::JsonError(_) | RetrievalError::InvalidResponse(_) => {
                    "Invalid response"
                }
                RetrievalError::UrlTooLong { .. } => "Request too large",
                RetrievalError::MalformedQuery(_) => "Malformed query",
                RetrievalError::NoValidBatches { .. } | RetrievalError::DispatchFailed(_) => {
                    "Dispatch failure"
                }
                RetrievalError::InvalidConfig(_) => "Invalid configuration",
                _ => "Non-transient error",
            }
        }
    }
}
