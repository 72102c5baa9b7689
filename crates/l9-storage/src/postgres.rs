//! PostgreSQL packet store.
//!
//! Writes to the `packet_store` table created by
//! `migrations/0001_packet_store.sql`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use l9_core::Timestamp;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{Executor, Postgres, QueryBuilder, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::packet::{Packet, PacketFilter, PacketId};
use crate::store::PacketStore;

const MIGRATION: &str = include_str!("../migrations/0001_packet_store.sql");

const SELECT_COLUMNS: &str =
    "SELECT packet_id, packet_type, agent_id, payload, tags, created_at FROM packet_store";

/// Packet store backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgPacketStore {
    pool: PgPool,
}

impl PgPacketStore {
    /// Connect to `database_url` and make sure the table exists.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Connection`] if the database is unreachable.
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(|e| StorageError::Connection(format!("PostgreSQL: {e}")))?;
        let store = Self::from_pool(pool);
        store.migrate().await?;
        info!("postgres packet store ready");
        Ok(store)
    }

    /// Wrap an existing pool. Does not run migrations.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `packet_store` table and indexes if missing.
    ///
    /// # Errors
    ///
    /// Returns the database error if the DDL fails.
    pub async fn migrate(&self) -> StorageResult<()> {
        self.pool.execute(MIGRATION).await?;
        Ok(())
    }
}

fn push_conditions(qb: &mut QueryBuilder<'_, Postgres>, filter: &PacketFilter) {
    qb.push(" WHERE TRUE");
    if let Some(packet_type) = &filter.packet_type {
        qb.push(" AND packet_type = ").push_bind(packet_type.clone());
    }
    if let Some(agent_id) = &filter.agent_id {
        qb.push(" AND agent_id = ").push_bind(agent_id.clone());
    }
    if let Some(tag) = &filter.tag {
        qb.push(" AND ").push_bind(tag.clone()).push(" = ANY(tags)");
    }
    if let Some(since) = filter.since {
        qb.push(" AND created_at >= ").push_bind(since.into_inner());
    }
}

fn packet_from_row(row: &PgRow) -> StorageResult<Packet> {
    let packet_id: Uuid = row.try_get("packet_id")?;
    let payload: Json<Value> = row.try_get("payload")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    Ok(Packet {
        packet_id: PacketId(packet_id),
        packet_type: row.try_get("packet_type")?,
        agent_id: row.try_get("agent_id")?,
        payload: payload.0,
        tags: row.try_get("tags")?,
        created_at: Timestamp::from_datetime(created_at),
    })
}

#[async_trait]
impl PacketStore for PgPacketStore {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn insert(&self, packet: &Packet) -> StorageResult<()> {
        sqlx::query(
            r"
            INSERT INTO packet_store (packet_id, packet_type, agent_id, payload, tags, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(packet.packet_id.0)
        .bind(&packet.packet_type)
        .bind(&packet.agent_id)
        .bind(Json(&packet.payload))
        .bind(&packet.tags)
        .bind(packet.created_at.into_inner())
        .execute(&self.pool)
        .await?;
        debug!(packet_id = %packet.packet_id, packet_type = %packet.packet_type, "packet stored");
        Ok(())
    }

    async fn get(&self, packet_id: PacketId) -> StorageResult<Option<Packet>> {
        let mut qb = QueryBuilder::<Postgres>::new(SELECT_COLUMNS);
        qb.push(" WHERE packet_id = ").push_bind(packet_id.0);
        let row = qb.build().fetch_optional(&self.pool).await?;
        row.as_ref().map(packet_from_row).transpose()
    }

    async fn query(&self, filter: &PacketFilter) -> StorageResult<Vec<Packet>> {
        let mut qb = QueryBuilder::<Postgres>::new(SELECT_COLUMNS);
        push_conditions(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC");
        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ")
                .push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }
        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(packet_from_row).collect()
    }

    async fn count(&self, filter: &PacketFilter) -> StorageResult<usize> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM packet_store");
        push_conditions(&mut qb, filter);
        let count: i64 = qb.build().fetch_one(&self.pool).await?.try_get(0)?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}
