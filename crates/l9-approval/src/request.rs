//! Approval request and decision types.

use std::fmt;
use std::str::FromStr;

use l9_core::{Clock, RiskLevel, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Unique identifier for an approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub Uuid);

impl RequestId {
    /// Create a new random request ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req:{}", self.0)
    }
}

impl FromStr for RequestId {
    type Err = uuid::Error;

    /// Accepts both `req:<uuid>` and a bare UUID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("req:").unwrap_or(s);
        Uuid::parse_str(raw).map(Self)
    }
}

/// Lifecycle of a request. Leaves `Pending` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// Awaiting a decision.
    Pending,
    /// Approved by a human.
    Approved,
    /// Rejected by a human.
    Rejected,
    /// Not decided within its TTL.
    Expired,
}

impl ApprovalStatus {
    /// Whether no further transition is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

/// A request for human sign-off on a tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Unique request identifier.
    pub request_id: RequestId,
    /// Tool the agent wants to run.
    pub tool_id: String,
    /// Agent asking for the tool.
    pub agent_id: String,
    /// Task the agent is working on.
    pub task_id: String,
    /// Classified risk of the tool.
    pub risk_level: RiskLevel,
    /// Tool arguments, opaque to the workflow.
    pub arguments: Map<String, Value>,
    /// When the request was created.
    pub created_at: Timestamp,
    /// When the request stops being approvable. Always after `created_at`.
    pub expires_at: Timestamp,
    /// Current status.
    pub status: ApprovalStatus,
}

impl ApprovalRequest {
    /// Whether the request is past its TTL at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }

    /// Whether the request is past its TTL according to `clock`.
    #[must_use]
    pub fn is_expired(&self, clock: &dyn Clock) -> bool {
        self.is_expired_at(clock.now())
    }

    /// Whether the request is still awaiting a decision.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == ApprovalStatus::Pending
    }
}

impl fmt::Display for ApprovalRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {} for {} (task {}, {})",
            self.request_id, self.risk_level, self.tool_id, self.agent_id, self.task_id, self.status
        )
    }
}

/// How far an approval reaches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalScope {
    /// This request only.
    #[default]
    Single,
    /// The tool for the rest of the session.
    Session,
    /// The tool until revoked.
    Permanent,
}

impl fmt::Display for ApprovalScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => write!(f, "single"),
            Self::Session => write!(f, "session"),
            Self::Permanent => write!(f, "permanent"),
        }
    }
}

impl FromStr for ApprovalScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "single" | "once" => Ok(Self::Single),
            "session" => Ok(Self::Session),
            "permanent" | "always" => Ok(Self::Permanent),
            other => Err(format!("unknown approval scope '{other}'")),
        }
    }
}

/// A recorded decision on a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalDecision {
    /// The request decided on.
    pub request_id: RequestId,
    /// Tool from the request.
    pub tool_id: String,
    /// Task from the request.
    pub task_id: String,
    /// Approved or rejected.
    pub approved: bool,
    /// Who decided.
    pub decided_by: String,
    /// Reach of an approval. Always `Single` for rejections.
    pub scope: ApprovalScope,
    /// Free-form reason (required for rejections).
    pub reason: Option<String>,
    /// When the decision was made.
    pub decided_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use l9_core::ManualClock;

    fn request(clock: &ManualClock) -> ApprovalRequest {
        let now = clock.now();
        ApprovalRequest {
            request_id: RequestId::new(),
            tool_id: "gmp_run".into(),
            agent_id: "l-cto".into(),
            task_id: "t-1".into(),
            risk_level: RiskLevel::High,
            arguments: Map::new(),
            created_at: now,
            expires_at: now.saturating_add(TimeDelta::hours(1)),
            status: ApprovalStatus::Pending,
        }
    }

    #[test]
    fn test_is_expired_follows_clock() {
        let clock = ManualClock::starting_now();
        let req = request(&clock);
        assert!(!req.is_expired(&clock));
        clock.advance(TimeDelta::minutes(59));
        assert!(!req.is_expired(&clock));
        clock.advance(TimeDelta::minutes(1));
        assert!(req.is_expired(&clock));
    }

    #[test]
    fn test_request_id_parse_accepts_prefix() {
        let id = RequestId::new();
        assert_eq!(id.to_string().parse::<RequestId>().unwrap(), id);
        assert_eq!(id.0.to_string().parse::<RequestId>().unwrap(), id);
        assert!("req:nope".parse::<RequestId>().is_err());
    }

    #[test]
    fn test_status_terminal() {
        assert!(!ApprovalStatus::Pending.is_terminal());
        assert!(ApprovalStatus::Expired.is_terminal());
    }

    #[test]
    fn test_scope_parse() {
        assert_eq!("always".parse::<ApprovalScope>().unwrap(), ApprovalScope::Permanent);
        assert_eq!("Session".parse::<ApprovalScope>().unwrap(), ApprovalScope::Session);
        assert!("forever".parse::<ApprovalScope>().is_err());
    }
}
