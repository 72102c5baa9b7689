//! The [`TaskQueue`] supervisor: a primary backend with an in-memory fallback.
//!
//! Every primary failure is absorbed: the call is served from memory, the
//! failure is logged at warn, and the queue reports itself degraded until
//! [`TaskQueue::reconcile`] moves the fallback items back to the primary.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use l9_core::TaskId;

use crate::backend::QueueBackend;
use crate::error::{QueueError, QueueResult};
use crate::memory::MemoryBackend;
use crate::redis::RedisBackend;
use crate::task::{QueuedTask, validate_priority};

/// Overall queue state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum QueueState {
    /// The primary backend is serving.
    Healthy,
    /// A primary call failed; memory is absorbing writes.
    Degraded {
        /// Last primary failure.
        reason: String,
    },
    /// No primary is configured.
    MemoryOnly,
}

impl fmt::Display for QueueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded { reason } => write!(f, "degraded: {reason}"),
            Self::MemoryOnly => write!(f, "memory only"),
        }
    }
}

/// Snapshot returned by [`TaskQueue::health`].
#[derive(Debug, Clone, Serialize)]
pub struct QueueHealth {
    /// Overall state.
    pub state: QueueState,
    /// Name of the primary backend, if any.
    pub primary: Option<String>,
    /// Tasks in the primary, if it answered.
    pub primary_len: Option<usize>,
    /// Tasks held in the memory fallback.
    pub fallback_len: usize,
}

/// Priority task queue with failover.
pub struct TaskQueue {
    primary: Option<Arc<dyn QueueBackend>>,
    fallback: MemoryBackend,
    degraded: RwLock<Option<String>>,
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("primary", &self.primary.as_ref().map(|p| p.name().to_owned()))
            .finish_non_exhaustive()
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::memory()
    }
}

impl TaskQueue {
    /// A queue with no primary backend.
    #[must_use]
    pub fn memory() -> Self {
        Self {
            primary: None,
            fallback: MemoryBackend::new(),
            degraded: RwLock::new(None),
        }
    }

    /// A queue with `primary` in front of the memory fallback.
    #[must_use]
    pub fn with_primary(primary: Arc<dyn QueueBackend>) -> Self {
        Self {
            primary: Some(primary),
            ..Self::memory()
        }
    }

    /// Connect to Redis at `url`, falling back to memory on any failure.
    ///
    /// If the pool cannot be built the queue is memory-only. If the server
    /// does not answer a ping the Redis backend is kept and the queue starts
    /// degraded, so a later [`reconcile`](Self::reconcile) can recover it.
    pub async fn connect_redis(url: &str, prefix: &str) -> Self {
        let backend = match RedisBackend::new(url, prefix) {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "redis backend unavailable, using memory queue");
                return Self::memory();
            },
        };
        let queue = Self::with_primary(Arc::new(backend));
        if let Some(primary) = &queue.primary
            && let Err(e) = primary.ping().await
        {
            queue.mark_degraded(&e).await;
        }
        queue
    }

    /// Enqueue a new task and return its id.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidPriority`] for a priority outside `1..=10`.
    /// Backend failures never surface here.
    pub async fn enqueue(
        &self,
        name: impl Into<String>,
        payload: Map<String, Value>,
        handler: impl Into<String>,
        priority: u8,
        tags: Vec<String>,
    ) -> QueueResult<TaskId> {
        let task = QueuedTask::new(name, handler, payload)
            .with_priority(priority)
            .with_tags(tags);
        self.enqueue_task(task).await
    }

    /// Enqueue a prepared task and return its id.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidPriority`] for a priority outside `1..=10`.
    pub async fn enqueue_task(&self, task: QueuedTask) -> QueueResult<TaskId> {
        validate_priority(task.priority)?;
        let task_id = task.task_id;

        if let Some(primary) = &self.primary {
            match primary.push(&task).await {
                Ok(()) => {
                    debug!(%task_id, backend = primary.name(), "task enqueued");
                    return Ok(task_id);
                },
                Err(e) => self.mark_degraded(&e).await,
            }
        }

        self.fallback.push(&task).await?;
        debug!(%task_id, backend = self.fallback.name(), "task enqueued");
        Ok(task_id)
    }

    /// Remove and return the most urgent task across both backends.
    ///
    /// Heads are compared by priority then age, so tasks written to memory
    /// during an outage are served in order once the primary returns.
    pub async fn dequeue(&self) -> QueueResult<Option<QueuedTask>> {
        let Some(primary) = &self.primary else {
            return self.fallback.pop().await;
        };

        let primary_head = match primary.peek().await {
            Ok(head) => head,
            Err(e) => {
                self.mark_degraded(&e).await;
                return self.fallback.pop().await;
            },
        };
        let fallback_head = self.fallback.peek().await?;

        let take_fallback = match (&primary_head, &fallback_head) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(p), Some(f)) => f.urgency_cmp(p).is_lt(),
        };
        if take_fallback {
            return self.fallback.pop().await;
        }

        match primary.pop().await {
            Ok(Some(task)) => Ok(Some(task)),
            Ok(None) => self.fallback.pop().await,
            Err(e) => {
                self.mark_degraded(&e).await;
                self.fallback.pop().await
            },
        }
    }

    /// Every queued task across both backends, in dequeue order.
    pub async fn peek_all(&self) -> QueueResult<Vec<QueuedTask>> {
        let mut tasks = self.fallback.peek_all().await?;
        if let Some(primary) = &self.primary {
            match primary.peek_all().await {
                Ok(primary_tasks) => tasks.extend(primary_tasks),
                Err(e) => self.mark_degraded(&e).await,
            }
        }
        tasks.sort_by(QueuedTask::urgency_cmp);
        Ok(tasks)
    }

    /// Total number of queued tasks that can currently be seen.
    pub async fn len(&self) -> QueueResult<usize> {
        Ok(self.health().await.total())
    }

    /// Whether no task is visible.
    pub async fn is_empty(&self) -> QueueResult<bool> {
        Ok(self.len().await? == 0)
    }

    /// Current backend state and sizes.
    pub async fn health(&self) -> QueueHealth {
        let fallback_len = self.fallback.len().await.unwrap_or_default();
        let Some(primary) = &self.primary else {
            return QueueHealth {
                state: QueueState::MemoryOnly,
                primary: None,
                primary_len: None,
                fallback_len,
            };
        };

        let primary_len = match primary.len().await {
            Ok(n) => Some(n),
            Err(e) => {
                self.mark_degraded(&e).await;
                None
            },
        };
        let state = match self.degraded.read().await.clone() {
            Some(reason) => QueueState::Degraded { reason },
            None => QueueState::Healthy,
        };
        QueueHealth {
            state,
            primary: Some(primary.name().to_owned()),
            primary_len,
            fallback_len,
        }
    }

    /// Probe the primary and, if it answers, drain the fallback into it.
    ///
    /// Returns the number of tasks moved.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Unavailable`] if the primary is still down or
    /// fails part-way; unmoved tasks stay in memory in their original order.
    pub async fn reconcile(&self) -> QueueResult<usize> {
        let Some(primary) = &self.primary else {
            return Ok(0);
        };
        if let Err(e) = primary.ping().await {
            self.mark_degraded(&e).await;
            return Err(QueueError::Unavailable(e.to_string()));
        }

        let mut moved = 0usize;
        while let Some((key, task)) = self.fallback.pop_entry().await {
            if let Err(e) = primary.push(&task).await {
                self.fallback.restore(key, task).await;
                self.mark_degraded(&e).await;
                return Err(QueueError::Unavailable(e.to_string()));
            }
            moved = moved.saturating_add(1);
        }

        *self.degraded.write().await = None;
        info!(moved, backend = primary.name(), "queue reconciled");
        Ok(moved)
    }

    async fn mark_degraded(&self, error: &QueueError) {
        let backend = self.primary.as_ref().map_or("primary", |p| p.name());
        warn!(backend, error = %error, "queue backend failed, using memory fallback");
        *self.degraded.write().await = Some(error.to_string());
    }
}

impl QueueHealth {
    /// Tasks visible across both backends.
    #[must_use]
    pub fn total(&self) -> usize {
        self.primary_len
            .unwrap_or_default()
            .saturating_add(self.fallback_len)
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
