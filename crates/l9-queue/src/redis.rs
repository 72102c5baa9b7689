//! Redis queue backend.
//!
//! Layout under a key prefix (default `l9-shared`):
//!
//! - `<prefix>:task_queue`: sorted set of task ids scored by
//!   `priority * 10^12 + seq`
//! - `<prefix>:task_payloads`: hash of task id to JSON task
//! - `<prefix>:task_seq`: `INCR` counter giving FIFO order within a priority

use std::fmt;

use async_trait::async_trait;
use deadpool_redis::redis::{self, AsyncCommands, Script};
use deadpool_redis::{Config as RedisConfig, Connection, Pool as RedisPool, Runtime};
use tracing::{debug, info};

use crate::backend::QueueBackend;
use crate::error::{QueueError, QueueResult};
use crate::task::QueuedTask;

/// Multiplier that keeps priority the dominant part of the score.
const PRIORITY_SCALE: f64 = 1e12;

/// Pops the lowest-scored id and its payload in one step. Ids whose payload
/// has vanished are discarded.
const POP_SCRIPT: &str = r"
while true do
  local popped = redis.call('ZPOPMIN', KEYS[1])
  if #popped == 0 then
    return false
  end
  local payload = redis.call('HGET', KEYS[2], popped[1])
  redis.call('HDEL', KEYS[2], popped[1])
  if payload then
    return payload
  end
end
";

/// Key names for one queue namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueKeys {
    /// Sorted set of task ids.
    pub queue: String,
    /// Hash of task payloads.
    pub payloads: String,
    /// Sequence counter.
    pub seq: String,
}

impl QueueKeys {
    /// Keys under `prefix`.
    #[must_use]
    pub fn new(prefix: &str) -> Self {
        Self {
            queue: format!("{prefix}:task_queue"),
            payloads: format!("{prefix}:task_payloads"),
            seq: format!("{prefix}:task_seq"),
        }
    }
}

/// Sorted-set score for a task: priority first, then sequence.
///
/// Priority dominates only while `seq < 10^12`; past that, scores of
/// adjacent priorities overlap. The counter is a per-prefix `INCR`, so
/// reaching it takes a trillion enqueues.
#[must_use]
pub fn score(priority: u8, seq: u64) -> f64 {
    // Exact for every seq below 10^12.
    #[allow(clippy::cast_precision_loss)]
    let seq = seq as f64;
    f64::from(priority).mul_add(PRIORITY_SCALE, seq)
}

/// Queue backed by a Redis sorted set and hash.
pub struct RedisBackend {
    pool: RedisPool,
    keys: QueueKeys,
    pop_script: Script,
}

impl fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisBackend")
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

impl RedisBackend {
    /// Build a pooled backend for `url`. Does not connect yet.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Redis`] if the URL or pool config is invalid.
    pub fn new(url: &str, prefix: &str) -> QueueResult<Self> {
        let pool = RedisConfig::from_url(url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| QueueError::Redis(e.to_string()))?;
        info!(url = %mask_url(url), prefix, "redis queue backend configured");
        Ok(Self::from_pool(pool, prefix))
    }

    /// Wrap an existing pool.
    #[must_use]
    pub fn from_pool(pool: RedisPool, prefix: &str) -> Self {
        Self {
            pool,
            keys: QueueKeys::new(prefix),
            pop_script: Script::new(POP_SCRIPT),
        }
    }

    /// The keys this backend writes.
    #[must_use]
    pub fn keys(&self) -> &QueueKeys {
        &self.keys
    }

    async fn conn(&self) -> QueueResult<Connection> {
        Ok(self.pool.get().await?)
    }
}

#[async_trait]
impl QueueBackend for RedisBackend {
    fn name(&self) -> &str {
        "redis"
    }

    async fn push(&self, task: &QueuedTask) -> QueueResult<()> {
        let json = serde_json::to_string(task)?;
        let id = task.task_id.to_string();
        let mut conn = self.conn().await?;

        let seq: u64 = conn.incr(&self.keys.seq, 1u64).await?;
        redis::pipe()
            .atomic()
            .hset(&self.keys.payloads, &id, json)
            .ignore()
            .zadd(&self.keys.queue, &id, score(task.priority, seq))
            .ignore()
            .query_async::<_, ()>(&mut *conn)
            .await?;

        debug!(task_id = %id, priority = task.priority, seq, "task pushed to redis");
        Ok(())
    }

    async fn pop(&self) -> QueueResult<Option<QueuedTask>> {
        let mut conn = self.conn().await?;
        let payload: Option<String> = self
            .pop_script
            .key(&self.keys.queue)
            .key(&self.keys.payloads)
            .invoke_async(&mut *conn)
            .await?;
        payload
            .map(|json| serde_json::from_str(&json).map_err(QueueError::from))
            .transpose()
    }

    async fn peek(&self) -> QueueResult<Option<QueuedTask>> {
        let mut conn = self.conn().await?;
        let head: Vec<String> = conn.zrange(&self.keys.queue, 0, 0).await?;
        let Some(id) = head.first() else {
            return Ok(None);
        };
        let payload: Option<String> = conn.hget(&self.keys.payloads, id).await?;
        payload
            .map(|json| serde_json::from_str(&json).map_err(QueueError::from))
            .transpose()
    }

    async fn peek_all(&self) -> QueueResult<Vec<QueuedTask>> {
        let mut conn = self.conn().await?;
        let ids: Vec<String> = conn.zrange(&self.keys.queue, 0, -1).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let payloads: Vec<Option<String>> = redis::cmd("HMGET")
            .arg(&self.keys.payloads)
            .arg(&ids)
            .query_async(&mut *conn)
            .await?;
        payloads
            .into_iter()
            .flatten()
            .map(|json| serde_json::from_str(&json).map_err(QueueError::from))
            .collect()
    }

    async fn len(&self) -> QueueResult<usize> {
        let mut conn = self.conn().await?;
        Ok(conn.zcard(&self.keys.queue).await?)
    }

    async fn ping(&self) -> QueueResult<()> {
        let mut conn = self.conn().await?;
        let _: String = redis::cmd("PING").query_async(&mut *conn).await?;
        Ok(())
    }
}

/// Hide any password in a connection URL.
fn mask_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => format!(
            "{}://***@{}",
            url.get(..scheme_end).unwrap_or_default(),
            url.get(at.saturating_add(1)..).unwrap_or_default()
        ),
        _ => url.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_use_prefix() {
        let keys = QueueKeys::new("l9-shared");
        assert_eq!(keys.queue, "l9-shared:task_queue");
        assert_eq!(keys.payloads, "l9-shared:task_payloads");
        assert_eq!(keys.seq, "l9-shared:task_seq");
    }

    #[test]
    fn test_score_orders_priority_then_sequence() {
        assert!(score(1, 500) < score(2, 1));
        assert!(score(3, 7) < score(3, 8));
        assert!(score(10, 1_000_000) > score(9, 999_999_999));
    }

    #[test]
    fn test_score_exact_up_to_sequence_limit() {
        let last = 999_999_999_999;
        assert!(score(9, 999_999_999_998) < score(9, last));
        assert!(score(9, last) < score(10, 0));
        assert!(score(1, last) < score(2, 0));
    }

    #[test]
    fn test_mask_url() {
        assert_eq!(
            mask_url("redis://:secret@cache:6379"),
            "redis://***@cache:6379"
        );
        assert_eq!(mask_url("redis://localhost:6379"), "redis://localhost:6379");
    }

    #[tokio::test]
    async fn test_unreachable_server_errors() {
        // Port 1 is never a Redis server.
        let backend = RedisBackend::new("redis://127.0.0.1:1", "l9-test").unwrap();
        assert!(backend.ping().await.is_err());
        let task = QueuedTask::new("a", "gmp", serde_json::Map::new());
        assert!(backend.push(&task).await.is_err());
    }
}
