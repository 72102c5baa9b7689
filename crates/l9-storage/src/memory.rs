//! In-process packet store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{StorageError, StorageResult};
use crate::packet::{Packet, PacketFilter, PacketId};
use crate::store::PacketStore;

#[derive(Debug, Default)]
struct MemoryState {
    /// Insertion order.
    packets: Vec<Packet>,
    index: HashMap<PacketId, usize>,
}

/// A packet store that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryPacketStore {
    state: RwLock<MemoryState>,
}

impl MemoryPacketStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total packets held.
    pub async fn len(&self) -> usize {
        self.state.read().await.packets.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl PacketStore for MemoryPacketStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn insert(&self, packet: &Packet) -> StorageResult<()> {
        let mut state = self.state.write().await;
        if state.index.contains_key(&packet.packet_id) {
            return Err(StorageError::AlreadyExists(packet.packet_id.to_string()));
        }
        let position = state.packets.len();
        state.index.insert(packet.packet_id, position);
        state.packets.push(packet.clone());
        Ok(())
    }

    async fn get(&self, packet_id: PacketId) -> StorageResult<Option<Packet>> {
        let state = self.state.read().await;
        Ok(state
            .index
            .get(&packet_id)
            .and_then(|&i| state.packets.get(i))
            .cloned())
    }

    async fn query(&self, filter: &PacketFilter) -> StorageResult<Vec<Packet>> {
        let state = self.state.read().await;
        let mut matched: Vec<Packet> = state
            .packets
            .iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        // Ties keep insertion order, so the latest insert ends up first.
        matched.sort_by_key(|p| p.created_at);
        matched.reverse();
        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn count(&self, filter: &PacketFilter) -> StorageResult<usize> {
        let state = self.state.read().await;
        Ok(state.packets.iter().filter(|p| filter.matches(p)).count())
    }
}
