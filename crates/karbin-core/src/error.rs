//! Error types for karbin.

use thiserror::Error;

/// Result type alias using karbin's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for karbin operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Pairwise re-ranking failed
    #[error("Rerank error: {0}")]
    Rerank(String),

    /// The vector index is not loaded, so recommendations cannot be served
    #[error("Recommendation service unavailable: {0}")]
    IndexUnavailable(String),

    /// Index snapshot is missing, corrupt, or inconsistent
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True when the error means "recommendations are switched off", as
    /// opposed to a failure of this particular request.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Error::IndexUnavailable(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}
