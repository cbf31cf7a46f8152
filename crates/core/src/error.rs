//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid certificate status: {0}")]
    InvalidCertificateStatus(String),

    #[error("invalid signature status: {0}")]
    InvalidSignatureStatus(String),

    #[error("invalid signing status: {0}")]
    InvalidSigningStatus(String),

    #[error("invalid validator state: {0}")]
    InvalidValidatorState(String),

    #[error("malformed verification result: {0}")]
    MalformedResult(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
