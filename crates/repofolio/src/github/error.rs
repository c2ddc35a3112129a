//! GitHub API error types.

use thiserror::Error;

use crate::http::HttpError;

/// Errors that can occur when interacting with the GitHub API.
#[derive(Debug, Error)]
pub enum GitHubError {
    /// The request never produced a response (connection failure or timeout).
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    /// API returned a status outside 200-299.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Response body was not the expected JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Response parsed but did not have the expected shape.
    #[error("Malformed response: {0}")]
    Malformed(String),
}

// Re-export the shared short_error_message function from the error module
pub use crate::error::short_error_message;

impl GitHubError {
    /// Create a malformed-response error.
    #[inline]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    /// Status code of an API error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check if the error is a 404.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Whether retrying the same request could succeed.
    ///
    /// Transport failures, timeouts, 5xx and 429 are retryable. Other 4xx
    /// responses and unparseable bodies are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Api { status, .. } => *status >= 500 || *status == 429,
            Self::Json(_) | Self::Malformed(_) => false,
        }
    }
}
