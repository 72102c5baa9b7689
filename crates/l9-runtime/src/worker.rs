//! The GMP/Git worker.
//!
//! Polls the queue, refuses anything not stamped `approved_by_igor = true`,
//! and hands the rest to the executor registered for the task's handler.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use l9_core::TaskId;
use l9_queue::{APPROVAL_FLAG, QueuedTask, TaskQueue};
use l9_storage::{Packet, PacketStore, packet_types};

use crate::error::RuntimeResult;
use crate::executor::{ExecutionReport, TaskExecutor};

/// What one poll did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// A task ran (successfully or not).
    Executed(ExecutionReport),
    /// A task without the approval flag was dropped.
    Unapproved(TaskId),
    /// No executor is registered for the task's handler.
    UnknownHandler {
        /// The dropped task.
        task_id: TaskId,
        /// Its handler.
        handler: String,
    },
    /// The queue was empty.
    Empty,
}

/// Counters kept across a [`Worker::run`] loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Tasks that ran and exited 0.
    pub succeeded: u64,
    /// Tasks that ran and failed or timed out.
    pub failed: u64,
    /// Tasks dropped as unapproved or unroutable.
    pub dropped: u64,
}

/// Polls a [`TaskQueue`] and runs approved tasks.
pub struct Worker {
    queue: Arc<TaskQueue>,
    packets: Arc<dyn PacketStore>,
    executors: HashMap<String, Arc<dyn TaskExecutor>>,
    poll_interval: Duration,
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut handlers: Vec<&str> = self.executors.keys().map(String::as_str).collect();
        handlers.sort_unstable();
        f.debug_struct("Worker")
            .field("handlers", &handlers)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl Worker {
    /// Worker with no executors.
    #[must_use]
    pub fn new(
        queue: Arc<TaskQueue>,
        packets: Arc<dyn PacketStore>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            queue,
            packets,
            executors: HashMap::new(),
            poll_interval,
        }
    }

    /// Register `executor` under its handler name, replacing any previous one.
    #[must_use]
    pub fn with_executor(mut self, executor: Arc<dyn TaskExecutor>) -> Self {
        self.executors.insert(executor.handler().to_owned(), executor);
        self
    }

    /// Take one task off the queue and deal with it.
    ///
    /// # Errors
    ///
    /// Returns a queue error if a task could not be decoded.
    pub async fn run_once(&self) -> RuntimeResult<WorkerOutcome> {
        let Some(task) = self.queue.dequeue().await? else {
            return Ok(WorkerOutcome::Empty);
        };
        Ok(self.process(task).await)
    }

    async fn process(&self, task: QueuedTask) -> WorkerOutcome {
        if !task.is_approved() {
            warn!(
                task_id = %task.task_id,
                handler = %task.handler,
                flag = APPROVAL_FLAG,
                "dropping task without approval"
            );
            return WorkerOutcome::Unapproved(task.task_id);
        }

        let Some(executor) = self.executors.get(&task.handler) else {
            warn!(task_id = %task.task_id, handler = %task.handler, "no executor for handler");
            return WorkerOutcome::UnknownHandler {
                task_id: task.task_id,
                handler: task.handler,
            };
        };

        info!(task_id = %task.task_id, handler = %task.handler, name = %task.name, "executing task");
        let report = executor.execute(&task).await;
        if report.success {
            info!(task_id = %task.task_id, duration_ms = report.duration_ms, "task succeeded");
        } else {
            warn!(
                task_id = %task.task_id,
                exit_code = ?report.exit_code,
                timed_out = report.timed_out,
                "task failed"
            );
        }
        self.record(&task, &report).await;
        WorkerOutcome::Executed(report)
    }

    async fn record(&self, task: &QueuedTask, report: &ExecutionReport) {
        let payload = match serde_json::to_value(report) {
            Ok(v) => v,
            Err(e) => {
                warn!(task_id = %task.task_id, error = %e, "failed to encode execution report");
                return;
            },
        };
        let packet = Packet::new(packet_types::EXECUTION_REPORT, task.agent_id.clone(), payload)
            .with_tag(task.handler.clone())
            .with_tag(task.task_id.to_string());
        if let Err(e) = self.packets.insert(&packet).await {
            warn!(
                task_id = %task.task_id,
                store = self.packets.name(),
                error = %e,
                "failed to store execution report"
            );
        }
    }

    /// Poll until `shutdown` is cancelled.
    ///
    /// Sleeps `poll_interval` whenever the queue is empty or a poll fails.
    /// A task already running finishes before shutdown is observed.
    pub async fn run(&self, shutdown: CancellationToken) -> WorkerStats {
        let mut stats = WorkerStats::default();
        info!(poll_interval = ?self.poll_interval, "worker started");

        while !shutdown.is_cancelled() {
            let idle = match self.run_once().await {
                Ok(WorkerOutcome::Executed(report)) => {
                    if report.success {
                        stats.succeeded = stats.succeeded.saturating_add(1);
                    } else {
                        stats.failed = stats.failed.saturating_add(1);
                    }
                    false
                },
                Ok(WorkerOutcome::Unapproved(_) | WorkerOutcome::UnknownHandler { .. }) => {
                    stats.dropped = stats.dropped.saturating_add(1);
                    false
                },
                Ok(WorkerOutcome::Empty) => true,
                Err(e) => {
                    error!(error = %e, "worker poll failed");
                    true
                },
            };

            if idle {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    () = tokio::time::sleep(self.poll_interval) => {
                        debug!("worker poll tick");
                    },
                }
            }
        }

        info!(
            succeeded = stats.succeeded,
            failed = stats.failed,
            dropped = stats.dropped,
            "worker stopped"
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use l9_storage::{MemoryPacketStore, PacketFilter};
    use serde_json::{Map, Value, json};
    use std::sync::Mutex;

    struct EchoExecutor {
        seen: Mutex<Vec<TaskId>>,
    }

    impl EchoExecutor {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl TaskExecutor for EchoExecutor {
        fn handler(&self) -> &str {
            "gmp"
        }

        async fn execute(&self, task: &QueuedTask) -> ExecutionReport {
            self.seen.lock().unwrap().push(task.task_id);
            ExecutionReport {
                task_id: task.task_id,
                handler: task.handler.clone(),
                exit_code: Some(0),
                stdout: "done".into(),
                stderr: String::new(),
                duration_ms: 1,
                success: true,
                timed_out: false,
            }
        }
    }

    fn setup() -> (Worker, Arc<TaskQueue>, Arc<MemoryPacketStore>, Arc<EchoExecutor>) {
        let queue = Arc::new(TaskQueue::memory());
        let store = Arc::new(MemoryPacketStore::new());
        let exec = EchoExecutor::new();
        let worker = Worker::new(queue.clone(), store.clone(), Duration::from_millis(10))
            .with_executor(exec.clone());
        (worker, queue, store, exec)
    }

    fn unapproved(extra: Value) -> Map<String, Value> {
        extra.as_object().cloned().unwrap_or_default()
    }

    fn approved(extra: Value) -> Map<String, Value> {
        let mut payload = extra.as_object().cloned().unwrap_or_default();
        payload.insert(APPROVAL_FLAG.into(), Value::Bool(true));
        payload
    }

    #[tokio::test]
    async fn test_empty_queue() {
        let (worker, _queue, _store, _exec) = setup();
        assert_eq!(worker.run_once().await.unwrap(), WorkerOutcome::Empty);
    }

    #[tokio::test]
    async fn test_unapproved_task_never_executes() {
        let (worker, queue, store, exec) = setup();
        let id = queue
            .enqueue("sneaky", unapproved(json!({"prompt": "x"})), "gmp", 1, vec![])
            .await
            .unwrap();

        assert_eq!(worker.run_once().await.unwrap(), WorkerOutcome::Unapproved(id));
        assert!(exec.seen.lock().unwrap().is_empty());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_flag_must_be_boolean_true() {
        let (worker, queue, _store, exec) = setup();
        let payload = json!({"approved_by_igor": "true"}).as_object().cloned().unwrap();
        let id = queue.enqueue("t", payload, "gmp", 1, vec![]).await.unwrap();
        assert_eq!(worker.run_once().await.unwrap(), WorkerOutcome::Unapproved(id));
        assert!(exec.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_approved_task_executes_and_reports() {
        let (worker, queue, store, exec) = setup();
        let id = queue
            .enqueue("tidy", approved(json!({"agent_id": "l-cto"})), "gmp", 2, vec![])
            .await
            .unwrap();

        let WorkerOutcome::Executed(report) = worker.run_once().await.unwrap() else {
            panic!("expected execution");
        };
        assert_eq!(report.task_id, id);
        assert_eq!(*exec.seen.lock().unwrap(), vec![id]);

        let packets = store
            .query(&PacketFilter::new().packet_type(packet_types::EXECUTION_REPORT))
            .await
            .unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].agent_id, "l-cto");
        assert_eq!(packets[0].payload["stdout"], "done");
    }

    #[tokio::test]
    async fn test_unknown_handler() {
        let (worker, queue, _store, _exec) = setup();
        let id = queue
            .enqueue("deploy", approved(json!({})), "helm", 5, vec![])
            .await
            .unwrap();
        assert_eq!(
            worker.run_once().await.unwrap(),
            WorkerOutcome::UnknownHandler {
                task_id: id,
                handler: "helm".into()
            }
        );
    }

    #[tokio::test]
    async fn test_run_drains_then_stops_on_cancel() {
        let (worker, queue, _store, exec) = setup();
        for _ in 0..3 {
            queue.enqueue("t", approved(json!({})), "gmp", 5, vec![]).await.unwrap();
        }
        queue.enqueue("bad", Map::new(), "gmp", 5, vec![]).await.unwrap();

        let shutdown = CancellationToken::new();
        let worker = Arc::new(worker);
        let handle = tokio::spawn({
            let worker = worker.clone();
            let shutdown = shutdown.clone();
            async move { worker.run(shutdown).await }
        });

        while !queue.is_empty().await.unwrap() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        shutdown.cancel();
        let stats = handle.await.unwrap();

        assert_eq!(stats.succeeded, 3);
        assert_eq!(stats.dropped, 1);
        assert_eq!(exec.seen.lock().unwrap().len(), 3);
    }
}
