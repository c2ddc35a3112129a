use thiserror::Error;

use crate::github::GitHubError;

/// Errors that abort a pipeline run.
///
/// Per-field enrichment failures and snapshot write failures never surface
/// here; they are logged and replaced by defaults.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Required configuration is missing or invalid.
    #[error("Invalid configuration: {message}")]
    Configuration { message: String },

    /// A remote call failed after retries.
    #[error("Remote error: {0}")]
    Remote(GitHubError),

    /// The remote answered with a body we could not interpret.
    #[error("Malformed response: {message}")]
    MalformedResponse { message: String },
}

impl PipelineError {
    /// Create a configuration error.
    #[inline]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a malformed-response error.
    #[inline]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }
}

impl From<GitHubError> for PipelineError {
    fn from(err: GitHubError) -> Self {
        match err {
            GitHubError::Json(e) => PipelineError::MalformedResponse {
                message: format!("JSON parse error: {}", e),
            },
            GitHubError::Malformed(message) => PipelineError::MalformedResponse { message },
            other => PipelineError::Remote(other),
        }
    }
}

/// Errors raised while reading or writing the snapshot file.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Snapshot store is read-only")]
    ReadOnly,
}

/// Extract a short error message suitable for display.
///
/// Takes the first line of an error message, which is useful for errors
/// that include multi-line details.
///
/// # Example
///
/// ```ignore
/// use repofolio::error::short_error_message;
/// let error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
/// assert_eq!(short_error_message(&error), "file not found");
/// ```
#[inline]
pub fn short_error_message(e: &impl std::error::Error) -> String {
    let full = e.to_string();
    full.lines().next().unwrap_or(&full).to_string()
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
