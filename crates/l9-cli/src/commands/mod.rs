//! CLI commands.
//!
//! Each handler returns the process exit code.

pub(crate) mod config;
pub(crate) mod init;
pub(crate) mod kernels;
pub(crate) mod queue;
pub(crate) mod scan;
pub(crate) mod worker;
