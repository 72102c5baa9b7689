//! Best-effort side effects of the approval workflow.
//!
//! Sinks record every lifecycle event (audit trail, packet store); the
//! notifier tells a human that a new request is waiting. Failures in either
//! are logged by the manager and never change the outcome of a call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ApprovalResult;
use crate::request::{ApprovalDecision, ApprovalRequest};

/// A lifecycle event emitted by the [`ApprovalManager`](crate::ApprovalManager).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum ApprovalEvent {
    /// A request was created.
    Requested {
        /// The new request.
        request: ApprovalRequest,
    },
    /// A request was approved or rejected.
    Decided {
        /// The decision.
        decision: ApprovalDecision,
    },
    /// A request passed its TTL undecided.
    Expired {
        /// The request, with status `Expired`.
        request: ApprovalRequest,
    },
}

impl ApprovalEvent {
    /// Short event kind, for logs and packet types.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Requested { .. } => "approval_requested",
            Self::Decided { .. } => "approval_decided",
            Self::Expired { .. } => "approval_expired",
        }
    }
}

/// Records approval events somewhere durable.
#[async_trait]
pub trait ApprovalSink: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Record one event.
    async fn record(&self, event: &ApprovalEvent) -> ApprovalResult<()>;
}

/// Tells a human that a request is waiting.
#[async_trait]
pub trait ApprovalNotifier: Send + Sync {
    /// Deliver a notification for `request`.
    async fn notify(&self, request: &ApprovalRequest) -> ApprovalResult<()>;
}
