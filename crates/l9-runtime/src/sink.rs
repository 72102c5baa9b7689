//! Approval events written to the packet store.

use std::sync::Arc;

use async_trait::async_trait;

use l9_approval::{ApprovalError, ApprovalEvent, ApprovalResult, ApprovalSink};
use l9_storage::{Packet, PacketStore};

/// Tag carried by every approval packet.
pub const APPROVAL_TAG: &str = "approval";

/// Records each approval event as a packet.
pub struct PacketApprovalSink {
    store: Arc<dyn PacketStore>,
}

impl std::fmt::Debug for PacketApprovalSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketApprovalSink")
            .field("store", &self.store.name())
            .finish()
    }
}

impl PacketApprovalSink {
    /// Sink writing into `store`.
    #[must_use]
    pub fn new(store: Arc<dyn PacketStore>) -> Self {
        Self { store }
    }
}

fn to_packet(event: &ApprovalEvent) -> ApprovalResult<Packet> {
    let (agent_id, tool_id) = match event {
        ApprovalEvent::Requested { request } | ApprovalEvent::Expired { request } => {
            (request.agent_id.clone(), request.tool_id.clone())
        },
        ApprovalEvent::Decided { decision } => {
            (decision.decided_by.clone(), decision.tool_id.clone())
        },
    };
    let payload = serde_json::to_value(event).map_err(|e| ApprovalError::Sink {
        sink: "packets".into(),
        message: e.to_string(),
    })?;
    Ok(Packet::new(event.kind(), agent_id, payload)
        .with_tag(APPROVAL_TAG)
        .with_tag(tool_id))
}

#[async_trait]
impl ApprovalSink for PacketApprovalSink {
    fn name(&self) -> &str {
        "packets"
    }

    async fn record(&self, event: &ApprovalEvent) -> ApprovalResult<()> {
        let packet = to_packet(event)?;
        self.store
            .insert(&packet)
            .await
            .map_err(|e| ApprovalError::Sink {
                sink: self.store.name().to_owned(),
                message: e.to_string(),
            })
    }
}
