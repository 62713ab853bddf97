//! Error types for the CBP backend.

use thiserror::Error;

/// Result type alias using the CBP backend's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for CBP backend operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation conflicts with current record state (409-equivalent)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Precondition not met, e.g. mutation while a job is in progress (412-equivalent)
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// LLM inference/generation failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Background job error
    #[error("Job error: {0}")]
    Job(String),

    /// Blob storage error
    #[error("Storage error: {0}")]
    Storage(String),

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

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("role mapping abc".to_string());
        assert_eq!(err.to_string(), "Not found: role mapping abc");
    }

    #[test]
    fn test_error_display_conflict() {
        let err = Error::Conflict("summary generation in progress".to_string());
        assert_eq!(err.to_string(), "Conflict: summary generation in progress");
    }

    #[test]
    fn test_error_display_precondition_failed() {
        let err = Error::PreconditionFailed("generation in progress".to_string());
        assert_eq!(err.to_string(), "Precondition failed: generation in progress");
    }

    #[test]
    fn test_error_display_inference() {
        let err = Error::Inference("empty response".to_string());
        assert_eq!(err.to_string(), "Inference error: empty response");
    }

    #[test]
    fn test_error_display_storage() {
        let err = Error::Storage("bucket unreachable".to_string());
        assert_eq!(err.to_string(), "Storage error: bucket unreachable");
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing blob");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
