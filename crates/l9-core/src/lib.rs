//! L9 Core - Foundation types for the L9 governed agent runtime.
//!
//! This crate provides:
//! - Identifier and timestamp types shared by every other crate
//! - The [`RiskLevel`] classification used by governance and approvals
//! - The injectable [`Clock`] used for TTL and expiry checks

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod clock;
pub mod error;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CoreError, CoreResult};
pub use types::{RiskLevel, TaskId, Timestamp};
