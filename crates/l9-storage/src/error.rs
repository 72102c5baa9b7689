//! Storage error types.

/// Errors from packet storage.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A packet with the same id is already stored.
    #[error("packet already exists: {0}")]
    AlreadyExists(String),

    /// A storage operation failed.
    #[error("storage error: {0}")]
    Internal(String),

    /// Connection to the storage backend failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::Connection(e.to_string())
            },
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                Self::AlreadyExists(db.message().to_owned())
            },
            other => Self::Internal(other.to_string()),
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
