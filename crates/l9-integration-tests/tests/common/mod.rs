//! Shared test harness for integration tests.

use std::sync::Arc;
use std::time::Duration;

use l9_core::ManualClock;
use l9_queue::TaskQueue;
use l9_runtime::{Runtime, RuntimeBuilder, Worker};
use l9_storage::{MemoryPacketStore, PacketFilter, PacketStore};
use l9_test::{KernelFixture, RecordingExecutor, RecordingSink, test_config};

/// A runtime wired to in-memory backends, a manual clock, and a complete
/// kernel fixture.
#[allow(dead_code)]
pub struct RuntimeTestHarness {
    /// The runtime under test.
    pub runtime: Runtime,
    /// Clock driving approval TTLs.
    pub clock: Arc<ManualClock>,
    /// Packet store shared with the runtime.
    pub packets: Arc<MemoryPacketStore>,
    /// Sink capturing every approval event.
    pub sink: Arc<RecordingSink>,
    /// Kernel files (held to prevent cleanup).
    pub kernels: KernelFixture,
}

#[allow(dead_code)]
impl RuntimeTestHarness {
    /// Harness over the memory queue.
    pub async fn new() -> Self {
        Self::with_queue(Arc::new(TaskQueue::memory())).await
    }

    /// Harness over a caller-supplied queue.
    pub async fn with_queue(queue: Arc<TaskQueue>) -> Self {
        let kernels = KernelFixture::complete();
        let clock = Arc::new(ManualClock::starting_now());
        let packets = Arc::new(MemoryPacketStore::new());
        let runtime = RuntimeBuilder::new(test_config(kernels.root()))
            .workspace(kernels.root())
            .clock(clock.clone())
            .queue(queue)
            .packets(packets.clone())
            .build()
            .await
            .unwrap();
        let sink = RecordingSink::new();
        runtime.approvals().add_sink(sink.clone()).await;
        Self {
            runtime,
            clock,
            packets,
            sink,
            kernels,
        }
    }

    /// Worker over the harness queue with a recording executor per handler.
    pub fn worker(&self, handlers: &[&str]) -> (Worker, Vec<Arc<RecordingExecutor>>) {
        let mut worker = Worker::new(
            self.runtime.queue().clone(),
            self.runtime.packets().clone(),
            Duration::from_millis(5),
        );
        let mut executors = Vec::with_capacity(handlers.len());
        for handler in handlers {
            let executor = RecordingExecutor::new(*handler);
            worker = worker.with_executor(executor.clone());
            executors.push(executor);
        }
        (worker, executors)
    }

    /// Number of stored packets of `packet_type`.
    pub async fn packet_count(&self, packet_type: &str) -> usize {
        self.packets
            .count(&PacketFilter::new().packet_type(packet_type))
            .await
            .unwrap()
    }
}
