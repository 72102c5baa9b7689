//! Mock implementations for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use l9_approval::{
    ApprovalError, ApprovalEvent, ApprovalNotifier, ApprovalRequest, ApprovalResult, ApprovalSink,
};
use l9_queue::{MemoryBackend, QueueBackend, QueueError, QueueResult, QueuedTask};
use l9_runtime::{ExecutionReport, TaskExecutor};

/// Queue backend that fails every call, like an unreachable Redis.
#[derive(Debug, Default)]
pub struct FailingBackend {
    calls: AtomicUsize,
}

impl FailingBackend {
    /// Create a failing backend.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of calls attempted so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> QueueResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(QueueError::Unavailable("connection refused".into()))
    }
}

#[async_trait]
impl QueueBackend for FailingBackend {
    fn name(&self) -> &str {
        "failing"
    }

    async fn push(&self, _task: &QueuedTask) -> QueueResult<()> {
        self.fail()
    }

    async fn pop(&self) -> QueueResult<Option<QueuedTask>> {
        self.fail()
    }

    async fn peek_all(&self) -> QueueResult<Vec<QueuedTask>> {
        self.fail()
    }

    async fn len(&self) -> QueueResult<usize> {
        self.fail()
    }

    async fn ping(&self) -> QueueResult<()> {
        self.fail()
    }
}

/// Queue backend backed by memory that can be taken down and brought back.
///
/// Tasks stored while up survive an outage, as they would in Redis.
#[derive(Debug)]
pub struct FlakyBackend {
    up: AtomicBool,
    inner: MemoryBackend,
}

impl FlakyBackend {
    /// Create a backend, initially up or down.
    #[must_use]
    pub fn new(up: bool) -> Arc<Self> {
        Arc::new(Self {
            up: AtomicBool::new(up),
            inner: MemoryBackend::new(),
        })
    }

    /// Bring the backend up or take it down.
    pub fn set_up(&self, up: bool) {
        self.up.store(up, Ordering::SeqCst);
    }

    /// Tasks currently stored, regardless of availability.
    pub async fn stored(&self) -> usize {
        self.inner.len().await.unwrap_or(0)
    }

    fn check(&self) -> QueueResult<()> {
        if self.up.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(QueueError::Redis("connection reset by peer".into()))
        }
    }
}

#[async_trait]
impl QueueBackend for FlakyBackend {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn push(&self, task: &QueuedTask) -> QueueResult<()> {
        self.check()?;
        self.inner.push(task).await
    }

    async fn pop(&self) -> QueueResult<Option<QueuedTask>> {
        self.check()?;
        self.inner.pop().await
    }

    async fn peek_all(&self) -> QueueResult<Vec<QueuedTask>> {
        self.check()?;
        self.inner.peek_all().await
    }

    async fn len(&self) -> QueueResult<usize> {
        self.check()?;
        self.inner.len().await
    }

    async fn ping(&self) -> QueueResult<()> {
        self.check()
    }
}

/// Approval sink that keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ApprovalEvent>>,
    fail: AtomicBool,
}

impl RecordingSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every subsequent `record` fail (after capturing the event).
    pub fn fail_writes(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Every event recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<ApprovalEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// The `kind()` of every event, in order.
    #[must_use]
    pub fn kinds(&self) -> Vec<&'static str> {
        self.events().iter().map(ApprovalEvent::kind).collect()
    }
}

#[async_trait]
impl ApprovalSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn record(&self, event: &ApprovalEvent) -> ApprovalResult<()> {
        if let Ok(mut guard) = self.events.lock() {
            guard.push(event.clone());
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(ApprovalError::Sink {
                sink: "recording".into(),
                message: "disk full".into(),
            });
        }
        Ok(())
    }
}

/// Notifier that records each request it was asked to announce.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notified: Mutex<Vec<ApprovalRequest>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    /// Create a notifier that always succeeds.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Create a notifier whose deliveries fail, like an unreachable chat service.
    #[must_use]
    pub fn failing() -> Arc<Self> {
        let notifier = Self::default();
        notifier.fail.store(true, Ordering::SeqCst);
        Arc::new(notifier)
    }

    /// Requests seen so far.
    #[must_use]
    pub fn notified(&self) -> Vec<ApprovalRequest> {
        self.notified.lock().map(|n| n.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ApprovalNotifier for RecordingNotifier {
    async fn notify(&self, request: &ApprovalRequest) -> ApprovalResult<()> {
        if let Ok(mut guard) = self.notified.lock() {
            guard.push(request.clone());
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(ApprovalError::Notify("webhook returned 503".into()));
        }
        Ok(())
    }
}

/// Executor that records tasks and reports success without spawning anything.
#[derive(Debug)]
pub struct RecordingExecutor {
    handler: String,
    executed: Mutex<Vec<QueuedTask>>,
}

impl RecordingExecutor {
    /// Executor registered under `handler`.
    #[must_use]
    pub fn new(handler: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            handler: handler.into(),
            executed: Mutex::new(Vec::new()),
        })
    }

    /// Tasks executed so far.
    #[must_use]
    pub fn executed(&self) -> Vec<QueuedTask> {
        self.executed.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TaskExecutor for RecordingExecutor {
    fn handler(&self) -> &str {
        &self.handler
    }

    async fn execute(&self, task: &QueuedTask) -> ExecutionReport {
        if let Ok(mut guard) = self.executed.lock() {
            guard.push(task.clone());
        }
        ExecutionReport {
            task_id: task.task_id,
            handler: task.handler.clone(),
            exit_code: Some(0),
            stdout: format!("ran {}", task.name),
            stderr: String::new(),
            duration_ms: 0,
            success: true,
            timed_out: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    #[tokio::test]
    async fn test_failing_backend_counts_calls() {
        let backend = FailingBackend::new();
        let task = QueuedTask::new("t", "gmp", Map::new());
        assert!(backend.push(&task).await.is_err());
        assert!(backend.ping().await.is_err());
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn test_flaky_backend_keeps_tasks_across_outage() {
        let backend = FlakyBackend::new(true);
        let task = QueuedTask::new("t", "gmp", Map::new());
        backend.push(&task).await.unwrap();

        backend.set_up(false);
        assert!(backend.pop().await.is_err());
        assert_eq!(backend.stored().await, 1);

        backend.set_up(true);
        assert_eq!(backend.pop().await.unwrap().unwrap().task_id, task.task_id);
    }

    #[tokio::test]
    async fn test_failing_notifier_still_records() {
        let notifier = RecordingNotifier::failing();
        let manager = l9_approval::ApprovalManager::new(Arc::new(l9_core::ManualClock::starting_now()));
        let request = manager
            .request_approval("git_push", "l-cto", "t-1", Map::new())
            .await;
        assert!(notifier.notify(&request).await.is_err());
        assert_eq!(notifier.notified().len(), 1);
    }
}
