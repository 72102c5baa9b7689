//! L9 Kernel - the ordered YAML kernel stack that defines agent identity.
//!
//! A kernel is one YAML mapping (identity, safety rules, execution limits,
//! ...). The stack loads them in a fixed order, hashes every file for
//! integrity checks, and answers dotted-path rule lookups.
//!
//! # Example
//!
//! ```no_run
//! use l9_kernel::{KernelActivation, KernelStack};
//! use serde_yaml::Value;
//!
//! let stack = KernelStack::load(".");
//! let depth = stack.get_rule("execution", "limits.max_depth", Value::from(3));
//! match KernelActivation::resolve(true, &stack) {
//!     KernelActivation::Active => println!("kernels active, depth {depth:?}"),
//!     other => println!("kernels {other}"),
//! }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod activation;
/// Error types for manifest I/O.
pub mod error;
pub mod manifest;
pub mod path;
pub mod sequence;
pub mod stack;

pub use activation::KernelActivation;
pub use error::{KernelError, KernelResult};
pub use manifest::{IntegrityViolation, KernelManifest};
pub use sequence::{DEFAULT_KERNEL_IDS, KernelSpec, default_sequence};
pub use stack::{KernelStack, KernelStatus};

pub use serde_yaml::{Mapping, Value};
