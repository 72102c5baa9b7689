use crate::request::{ApprovalStatus, RequestId};

/// Errors from the approval workflow.
#[derive(Debug, thiserror::Error)]
pub enum ApprovalError {
    /// No request with this id is known.
    #[error("approval request {0} not found")]
    NotFound(RequestId),

    /// The request passed its TTL before a decision was made.
    #[error("approval request {0} has expired")]
    Expired(RequestId),

    /// The request was already approved or rejected.
    #[error("approval request {request_id} is already {status}")]
    AlreadyResolved {
        /// The request.
        request_id: RequestId,
        /// Its terminal status.
        status: ApprovalStatus,
    },

    /// An approval sink failed to record an event.
    #[error("approval sink '{sink}' failed: {message}")]
    Sink {
        /// Sink name.
        sink: String,
        /// Failure description.
        message: String,
    },

    /// The notifier failed to deliver a request.
    #[error("approval notification failed: {0}")]
    Notify(String),
}

/// Result type for approval operations.
pub type ApprovalResult<T> = Result<T, ApprovalError>;
