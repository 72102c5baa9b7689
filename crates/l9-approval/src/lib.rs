//! L9 Approval - human sign-off for high-risk tool calls.
//!
//! An agent that wants a high-risk tool (`gmp_run`, `git_push`, ...) gets an
//! [`ApprovalRequest`] back instead of a result. Nothing runs until a human
//! approves the request; the runtime then dispatches the work.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use l9_approval::{ApprovalManager, ApprovalScope};
//! use l9_core::SystemClock;
//!
//! # tokio_test_block_on(async {
//! let manager = ApprovalManager::new(Arc::new(SystemClock));
//! let request = manager
//!     .request_approval("gmp_run", "l-cto", "task-42", Default::default())
//!     .await;
//!
//! let decision = manager
//!     .approve(request.request_id, "igor", ApprovalScope::Single)
//!     .await
//!     .unwrap();
//! assert!(decision.approved);
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

/// Error types for the approval workflow.
pub mod error;
pub mod manager;
pub mod request;
pub mod sink;

pub use error::{ApprovalError, ApprovalResult};
pub use manager::{ApprovalManager, DEFAULT_TTL};
pub use request::{ApprovalDecision, ApprovalRequest, ApprovalScope, ApprovalStatus, RequestId};
pub use sink::{ApprovalEvent, ApprovalNotifier, ApprovalSink};
