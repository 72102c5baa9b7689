//! Runtime error types.

use thiserror::Error;

/// Errors that can occur while assembling or driving the runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Configuration could not be loaded.
    #[error("config error: {0}")]
    Config(#[from] l9_config::ConfigError),

    /// Governance rules could not be built.
    #[error("governance error: {0}")]
    Governance(#[from] l9_governance::GovernanceError),

    /// Kernel manifest could not be read or written.
    #[error("kernel error: {0}")]
    Kernel(#[from] l9_kernel::KernelError),

    /// Approval workflow error.
    #[error("approval error: {0}")]
    Approval(#[from] l9_approval::ApprovalError),

    /// Queue error.
    #[error("queue error: {0}")]
    Queue(#[from] l9_queue::QueueError),

    /// Packet storage error.
    #[error("storage error: {0}")]
    Storage(#[from] l9_storage::StorageError),

    /// An approval vanished between the decision and the dispatch.
    #[error("approval request {0} is no longer tracked")]
    RequestLost(String),

    /// Filesystem error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
