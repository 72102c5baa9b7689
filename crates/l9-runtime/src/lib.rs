//! L9 Runtime - assembles the governed agent runtime.
//!
//! This crate wires the lower layers together:
//!
//! - [`Runtime`]: the explicit context object holding the kernel stack,
//!   rule engine, approval manager, task queue and packet store
//! - [`ToolGate`]: governance check, then approval check, for every tool call
//! - [`Worker`]: drains the queue and runs approved GMP and Git tasks
//! - [`inspect_workspace`]: the bootstrap health checks behind `l9 init-workspace`
//!
//! # Example
//!
//! ```rust,no_run
//! use l9_approval::ApprovalScope;
//! use l9_config::Config;
//! use l9_runtime::{GateOutcome, Runtime};
//! use serde_json::Map;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let runtime = Runtime::from_config(Config::default(), ".").await?;
//!
//! let outcome = runtime
//!     .gate()
//!     .invoke("git_push", "l-cto", "t-1", Map::new())
//!     .await;
//! if let GateOutcome::PendingApproval(request) = outcome {
//!     runtime
//!         .approve_and_dispatch(request.request_id, "igor", ApprovalScope::Single, "git")
//!         .await?;
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod bootstrap;
pub mod config_bridge;
pub mod error;
pub mod executor;
pub mod gate;
pub mod runtime;
pub mod sink;
pub mod worker;

pub use bootstrap::{
    CheckState, WorkspaceCheck, WorkspaceReport, WorkspaceStatus, inspect_workspace,
    prepare_workspace,
};
pub use error::{RuntimeError, RuntimeResult};
pub use executor::{
    DEFAULT_GMP_ARGS, ExecutionReport, GitExecutor, GmpExecutor, MAX_OUTPUT_BYTES, ProcessSpec,
    TaskExecutor, run_process,
};
pub use gate::{GateOutcome, ToolGate};
pub use runtime::{APPROVED_STATUS, Runtime, RuntimeBuilder};
pub use sink::{APPROVAL_TAG, PacketApprovalSink};
pub use worker::{Worker, WorkerOutcome, WorkerStats};
