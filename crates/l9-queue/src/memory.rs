//! In-process queue backend.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::backend::QueueBackend;
use crate::error::QueueResult;
use crate::task::QueuedTask;

/// Position of a task: (priority, insertion sequence).
pub(crate) type EntryKey = (u8, u64);

#[derive(Debug, Default)]
struct MemoryState {
    tasks: BTreeMap<EntryKey, QueuedTask>,
    next_seq: u64,
}

/// A queue that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove the most urgent task along with its position.
    pub(crate) async fn pop_entry(&self) -> Option<(EntryKey, QueuedTask)> {
        self.state.lock().await.tasks.pop_first()
    }

    /// Put a task back at the position [`pop_entry`](Self::pop_entry) gave it.
    pub(crate) async fn restore(&self, key: EntryKey, task: QueuedTask) {
        self.state.lock().await.tasks.insert(key, task);
    }
}

#[async_trait]
impl QueueBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn push(&self, task: &QueuedTask) -> QueueResult<()> {
        let mut state = self.state.lock().await;
        let seq = state.next_seq;
        state.next_seq = seq.saturating_add(1);
        state.tasks.insert((task.priority, seq), task.clone());
        Ok(())
    }

    async fn pop(&self) -> QueueResult<Option<QueuedTask>> {
        Ok(self.state.lock().await.tasks.pop_first().map(|(_, task)| task))
    }

    async fn peek(&self) -> QueueResult<Option<QueuedTask>> {
        Ok(self
            .state
            .lock()
            .await
            .tasks
            .first_key_value()
            .map(|(_, task)| task.clone()))
    }

    async fn peek_all(&self) -> QueueResult<Vec<QueuedTask>> {
        Ok(self.state.lock().await.tasks.values().cloned().collect())
    }

    async fn len(&self) -> QueueResult<usize> {
        Ok(self.state.lock().await.tasks.len())
    }

    async fn ping(&self) -> QueueResult<()> {
        Ok(())
    }
}
