//! L9 Queue - priority task queue for approved work.
//!
//! Tasks are ordered by priority (1 is most urgent) and then by enqueue
//! order. [`TaskQueue`] writes to Redis when it can and to an in-process
//! [`MemoryBackend`] when it cannot; callers never see a backend failure.
//!
//! # Example
//!
//! ```
//! use l9_queue::TaskQueue;
//!
//! # tokio_test_block_on(async {
//! let queue = TaskQueue::memory();
//! let id = queue
//!     .enqueue("refactor auth", Default::default(), "gmp", 2, vec![])
//!     .await
//!     .unwrap();
//! let task = queue.dequeue().await.unwrap().unwrap();
//! assert_eq!(task.task_id, id);
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod backend;
/// Error types for queue operations.
pub mod error;
pub mod memory;
pub mod redis;
pub mod supervisor;
pub mod task;

pub use backend::QueueBackend;
pub use error::{QueueError, QueueResult};
pub use memory::MemoryBackend;
pub use redis::{QueueKeys, RedisBackend};
pub use supervisor::{QueueHealth, QueueState, TaskQueue};
pub use task::{
    APPROVAL_FLAG, DEFAULT_PRIORITY, DEFAULT_STATUS, MAX_PRIORITY, MIN_PRIORITY, QueuedTask,
    validate_priority,
};
