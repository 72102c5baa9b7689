//! L9 Telemetry - logging setup for the L9 runtime.
//!
//! Every crate logs through `tracing`; binaries call [`setup_logging`] once
//! at startup to install a subscriber.
//!
//! # Example
//!
//! ```rust,no_run
//! use l9_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), l9_telemetry::TelemetryError> {
//! let config = LogConfig::new("debug")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("l9_queue=trace");
//! setup_logging(&config)?;
//! tracing::info!("worker starting");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{FileRotation, LogConfig, LogFormat, LogTarget, setup_logging};
