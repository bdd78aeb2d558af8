//! Error types for prr.

use thiserror::Error;

/// Main error type for prr operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level HTTP failure (DNS, connect, reset).
    #[error("HTTP error: {0}")]
    Http(String),

    /// Request timed out at the HTTP client level.
    #[error("HTTP timeout: {0}")]
    Timeout(String),

    /// API returned a terminal non-2xx status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Caller-supplied argument failed validation. Never retried.
    #[error("{0}")]
    InvalidArgument(String),

    /// A lookup completed but matched nothing (e.g. no open PRs).
    #[error("{0}")]
    NotFound(String),

    /// Git repository introspection failed.
    #[error("Git error: {0}")]
    Git(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error.
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Map an HTTP status code to an error.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Whether this error came from caller input rather than the network.
    ///
    /// Validation errors surface as protocol-level rejections; everything
    /// else is rendered as an in-band tool failure.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }
}

/// Result type alias for prr operations.
pub type Result<T> = std::result::Result<T, Error>;
