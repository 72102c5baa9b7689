//! Error types for core value parsing.

use thiserror::Error;

/// Errors produced when parsing core value types.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An identifier was not a valid UUID.
    #[error("invalid id: {0}")]
    InvalidId(String),

    /// A risk level string was not recognised.
    #[error("invalid risk level: {0}")]
    InvalidRiskLevel(String),
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
