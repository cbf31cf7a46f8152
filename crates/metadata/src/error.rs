//! Trust store error types.

use thiserror::Error;

/// Trust store operation errors.
///
/// Optimistic-concurrency conflicts are not errors; they are reported as
/// [`crate::SaveOutcome::Conflict`].
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("invalid stored value: {0}")]
    InvalidValue(#[from] sigwarden_core::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for MetadataError {
    fn from(e: std::io::Error) -> Self {
        MetadataError::Config(e.to_string())
    }
}

/// Result type for trust store operations.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;
