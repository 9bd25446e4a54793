//! Error types for tireguard

use thiserror::Error;

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration not found")]
    NotFound,

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Failed to save configuration: {0}")]
    SaveError(String),
}

/// Coarse error classification callers can branch on.
///
/// `TransientIo` is the only recoverable kind: the write is retried later
/// through the outbox. Every other kind is surfaced to the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    MissingEvidence,
    Conflict,
    TransientIo,
    ExtractionFailure,
    InvalidState,
    InvalidInput,
    Internal,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Missing evidence: {0}")]
    MissingEvidence(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Backing store unreachable: {0}")]
    TransientIo(String),

    #[error("Extraction failed: {0}")]
    ExtractionFailure(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid image format: {0}")]
    InvalidImageFormat(String),
}

impl Error {
    /// Wrap an I/O failure against the backing store as a transient error.
    pub fn transient(err: impl std::fmt::Display) -> Self {
        Error::TransientIo(err.to_string())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::MissingEvidence(_) => ErrorKind::MissingEvidence,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::TransientIo(_) => ErrorKind::TransientIo,
            Error::ExtractionFailure(_) => ErrorKind::ExtractionFailure,
            Error::InvalidState(_) => ErrorKind::InvalidState,
            Error::InvalidInput(_)
            | Error::FileNotFound(_)
            | Error::InvalidImageFormat(_)
            | Error::Image(_) => ErrorKind::InvalidInput,
            Error::Io(_) | Error::Json(_) | Error::Config(_) => ErrorKind::Internal,
        }
    }

    /// Whether the failed write should be retried through the outbox
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::TransientIo
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_io_is_retryable() {
        assert!(Error::transient("connection refused").is_transient());
        assert!(!Error::NotFound("unit U1".to_string()).is_transient());
        assert!(!Error::Io(std::io::Error::other("disk full")).is_transient());
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            Error::MissingEvidence("photo".to_string()).kind(),
            ErrorKind::MissingEvidence
        );
        assert_eq!(Error::Conflict("x".to_string()).kind(), ErrorKind::Conflict);
        assert_eq!(
            Error::FileNotFound("a.jpg".to_string()).kind(),
            ErrorKind::InvalidInput
        );
    }
}
