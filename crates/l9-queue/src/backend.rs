//! The storage seam behind [`TaskQueue`](crate::TaskQueue).

use async_trait::async_trait;

use crate::error::QueueResult;
use crate::task::QueuedTask;

/// A priority-ordered task store.
///
/// Implementations pop the lowest priority value first and break ties by
/// insertion order.
#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Name used in logs and health reports.
    fn name(&self) -> &str;

    /// Store a task.
    async fn push(&self, task: &QueuedTask) -> QueueResult<()>;

    /// Remove and return the most urgent task.
    async fn pop(&self) -> QueueResult<Option<QueuedTask>>;

    /// The most urgent task, without removing it.
    async fn peek(&self) -> QueueResult<Option<QueuedTask>> {
        Ok(self.peek_all().await?.into_iter().next())
    }

    /// Every task in pop order.
    async fn peek_all(&self) -> QueueResult<Vec<QueuedTask>>;

    /// Number of stored tasks.
    async fn len(&self) -> QueueResult<usize>;

    /// Whether the backend holds no tasks.
    async fn is_empty(&self) -> QueueResult<bool> {
        Ok(self.len().await? == 0)
    }

    /// Check that the backend is reachable.
    async fn ping(&self) -> QueueResult<()>;
}
