//! L9 Test - shared test utilities for the L9 runtime.
//!
//! Mock backends, recording sinks and notifiers, and on-disk kernel
//! fixtures, for use as a dev-dependency.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! l9-test.workspace = true
//! ```
//!
//! ```rust,ignore
//! use l9_queue::TaskQueue;
//! use l9_test::FlakyBackend;
//!
//! #[tokio::test]
//! async fn test_survives_outage() {
//!     let redis = FlakyBackend::new(false);
//!     let queue = TaskQueue::with_primary(redis.clone());
//!     // ...
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;

/// Install a test subscriber honoring `RUST_LOG`. Safe to call repeatedly.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
