/// Errors from the task queue.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Priority outside `1..=10`.
    #[error("invalid priority {0}: must be between 1 and 10")]
    InvalidPriority(u8),

    /// Redis pool, connection, or command failure.
    #[error("redis error: {0}")]
    Redis(String),

    /// A task could not be encoded or decoded.
    #[error("task serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backend is not reachable.
    #[error("queue backend unavailable: {0}")]
    Unavailable(String),
}

impl From<deadpool_redis::redis::RedisError> for QueueError {
    fn from(e: deadpool_redis::redis::RedisError) -> Self {
        Self::Redis(e.to_string())
    }
}

impl From<deadpool_redis::PoolError> for QueueError {
    fn from(e: deadpool_redis::PoolError) -> Self {
        Self::Unavailable(e.to_string())
    }
}

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;
