//! L9 Storage - the packet memory substrate.
//!
//! Every approval event and execution report is written as a [`Packet`]:
//! an append-only JSON record tagged with a type and an agent.
//!
//! # Backends
//!
//! - [`MemoryPacketStore`] - in-process, always available
//! - [`PgPacketStore`] - PostgreSQL `packet_store` table, behind the
//!   **`postgres`** feature

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod error;
pub mod memory;
pub mod packet;
pub mod store;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryPacketStore;
pub use packet::{Packet, PacketFilter, PacketId, packet_types};
pub use store::PacketStore;

#[cfg(feature = "postgres")]
pub use postgres::PgPacketStore;
