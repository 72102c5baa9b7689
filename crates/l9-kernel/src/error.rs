use std::path::PathBuf;

/// Errors from kernel manifest I/O.
///
/// Loading a [`KernelStack`](crate::KernelStack) never fails; per-kernel
/// problems are recorded as [`KernelStatus`](crate::KernelStatus) instead.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    /// A file could not be read.
    #[error("failed to read {path}: {source}")]
    ReadError {
        /// Path that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A file could not be written.
    #[error("failed to write {path}: {source}")]
    WriteError {
        /// Path that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A YAML document could not be parsed or produced.
    #[error("invalid YAML in {path}: {source}")]
    YamlError {
        /// Path of the document.
        path: PathBuf,
        /// Underlying YAML error.
        source: serde_yaml::Error,
    },
}

/// Result type for kernel operations.
pub type KernelResult<T> = Result<T, KernelError>;
