//! The packet record and query filter.

use std::fmt;

use l9_core::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Unique identifier for a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PacketId(pub Uuid);

impl PacketId {
    /// Create a new random packet ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PacketId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Packet types the runtime writes.
pub mod packet_types {
    /// A tool call is waiting for approval.
    pub const APPROVAL_REQUESTED: &str = "approval_requested";
    /// A human approved or rejected a request.
    pub const APPROVAL_DECIDED: &str = "approval_decided";
    /// A request ran out its TTL.
    pub const APPROVAL_EXPIRED: &str = "approval_expired";
    /// A worker finished running a task.
    pub const EXECUTION_REPORT: &str = "execution_report";
}

/// One append-only memory record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    /// Unique packet id.
    pub packet_id: PacketId,
    /// Kind of record, e.g. `execution_report`.
    pub packet_type: String,
    /// Agent the record belongs to.
    pub agent_id: String,
    /// Record body.
    pub payload: Value,
    /// Free-form labels.
    #[serde(default)]
    pub tags: Vec<String>,
    /// When the record was written.
    pub created_at: Timestamp,
}

impl Packet {
    /// Create a packet stamped with the current time.
    #[must_use]
    pub fn new(packet_type: impl Into<String>, agent_id: impl Into<String>, payload: Value) -> Self {
        Self {
            packet_id: PacketId::new(),
            packet_type: packet_type.into(),
            agent_id: agent_id.into(),
            payload,
            tags: Vec::new(),
            created_at: Timestamp::now(),
        }
    }

    /// Add a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Override the creation time.
    #[must_use]
    pub fn with_created_at(mut self, created_at: Timestamp) -> Self {
        self.created_at = created_at;
        self
    }
}

/// Selects packets. Every set field must match; results are newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PacketFilter {
    /// Exact packet type.
    pub packet_type: Option<String>,
    /// Exact agent id.
    pub agent_id: Option<String>,
    /// Packet must carry this tag.
    pub tag: Option<String>,
    /// Created at or after this instant.
    pub since: Option<Timestamp>,
    /// Maximum number of packets returned.
    pub limit: Option<usize>,
}

impl PacketFilter {
    /// A filter that matches everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Only packets of `packet_type`.
    #[must_use]
    pub fn packet_type(mut self, packet_type: impl Into<String>) -> Self {
        self.packet_type = Some(packet_type.into());
        self
    }

    /// Only packets for `agent_id`.
    #[must_use]
    pub fn agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    /// Only packets tagged `tag`.
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Only packets created at or after `since`.
    #[must_use]
    pub fn since(mut self, since: Timestamp) -> Self {
        self.since = Some(since);
        self
    }

    /// At most `limit` packets.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `packet` passes every condition except the limit.
    #[must_use]
    pub fn matches(&self, packet: &Packet) -> bool {
        self.packet_type
            .as_ref()
            .is_none_or(|t| *t == packet.packet_type)
            && self.agent_id.as_ref().is_none_or(|a| *a == packet.agent_id)
            && self.tag.as_ref().is_none_or(|t| packet.tags.contains(t))
            && self.since.is_none_or(|s| packet.created_at >= s)
    }
}
