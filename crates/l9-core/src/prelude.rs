//! Commonly used items, for glob import.

pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::error::{CoreError, CoreResult};
pub use crate::types::{RiskLevel, TaskId, Timestamp};
