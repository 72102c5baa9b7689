//! The [`PacketStore`] seam.

use async_trait::async_trait;

use crate::error::StorageResult;
use crate::packet::{Packet, PacketFilter, PacketId};

/// Append-only packet storage.
#[async_trait]
pub trait PacketStore: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Store a packet. Ids are unique.
    async fn insert(&self, packet: &Packet) -> StorageResult<()>;

    /// Fetch one packet by id.
    async fn get(&self, packet_id: PacketId) -> StorageResult<Option<Packet>>;

    /// Packets matching `filter`, newest first.
    async fn query(&self, filter: &PacketFilter) -> StorageResult<Vec<Packet>>;

    /// Number of packets matching `filter`, ignoring its limit.
    async fn count(&self, filter: &PacketFilter) -> StorageResult<usize>;
}
