//! Error types for the mande pipeline.

use thiserror::Error;

/// Result type alias using mande's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for mande operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found (also used for resources owned by someone else)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input (empty prompt, empty content, bad vector dimension)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Uploaded file exceeds the configured size ceiling
    #[error("File too large: {0}")]
    PayloadTooLarge(String),

    /// Uploaded file format is not supported
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    /// Every extraction strategy was exhausted
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// Network/timeout failure talking to an external service; safe to retry
    #[error("Service temporarily unavailable: {0}")]
    Transient(String),

    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Inference/generation failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// The caller abandoned the operation
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Forbidden (authenticated but not authorized)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the operation that produced this error may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transient(_))
    }

    /// Short machine-readable kind, used in structured logs and JSON bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Database(_) => "database",
            Error::NotFound(_) => "not_found",
            Error::InvalidInput(_) => "invalid_input",
            Error::PayloadTooLarge(_) => "too_large",
            Error::UnsupportedType(_) => "unsupported_type",
            Error::Extraction(_) => "extraction_failed",
            Error::Transient(_) => "service_unavailable",
            Error::Embedding(_) => "embedding",
            Error::Inference(_) => "inference",
            Error::Cancelled(_) => "cancelled",
            Error::Serialization(_) => "serialization",
            Error::Config(_) => "config",
            Error::Request(_) => "request",
            Error::Internal(_) => "internal",
            Error::Forbidden(_) => "forbidden",
            Error::Io(_) => "io",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() {
            Error::Transient(e.to_string())
        } else {
            Error::Request(e.to_string())
        }
    }
}
