//! Kernel integrity manifest.
//!
//! A manifest pins each kernel id to the SHA-256 digest of its file. It is
//! written with `l9 kernels lock` and checked with `l9 kernels verify`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{KernelError, KernelResult};

/// Current manifest format version.
pub const MANIFEST_VERSION: u32 = 1;

/// Recorded kernel digests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelManifest {
    /// Format version.
    #[serde(default = "default_version")]
    pub version: u32,
    /// Kernel id → SHA-256 hex digest.
    #[serde(default)]
    pub kernels: BTreeMap<String, String>,
}

fn default_version() -> u32 {
    MANIFEST_VERSION
}

impl Default for KernelManifest {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION,
            kernels: BTreeMap::new(),
        }
    }
}

impl KernelManifest {
    /// Read a manifest from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid manifest.
    pub fn load(path: &Path) -> KernelResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| KernelError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| KernelError::YamlError {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the manifest as YAML, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> KernelResult<()> {
        let content = serde_yaml::to_string(self).map_err(|source| KernelError::YamlError {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| KernelError::WriteError {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, content).map_err(|source| KernelError::WriteError {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// A difference between a manifest and a loaded stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum IntegrityViolation {
    /// The file changed since the manifest was recorded.
    Mismatch {
        /// Kernel id.
        kernel_id: String,
        /// Digest in the manifest.
        expected: String,
        /// Digest of the file on disk.
        actual: String,
    },
    /// The manifest lists a kernel whose file could not be read.
    MissingKernel {
        /// Kernel id.
        kernel_id: String,
    },
    /// A kernel was read that the manifest does not list.
    Unexpected {
        /// Kernel id.
        kernel_id: String,
    },
}

impl fmt::Display for IntegrityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mismatch {
                kernel_id,
                expected,
                actual,
            } => write!(
                f,
                "{kernel_id}: digest mismatch (expected {}, found {})",
                short(expected),
                short(actual)
            ),
            Self::MissingKernel { kernel_id } => write!(f, "{kernel_id}: file missing"),
            Self::Unexpected { kernel_id } => write!(f, "{kernel_id}: not in manifest"),
        }
    }
}

fn short(digest: &str) -> &str {
    digest.get(..12).unwrap_or(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("kernels.lock.yaml");
        let mut manifest = KernelManifest::default();
        manifest
            .kernels
            .insert("identity".to_owned(), "ab".repeat(32));
        manifest.save(&path).unwrap();

        let loaded = KernelManifest::load(&path).unwrap();
        assert_eq!(loaded, manifest);
        assert_eq!(loaded.version, MANIFEST_VERSION);
    }

    #[test]
    fn test_load_invalid_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "kernels: [1, 2").unwrap();
        assert!(matches!(
            KernelManifest::load(&path),
            Err(KernelError::YamlError { .. })
        ));
    }

    #[test]
    fn test_violation_display_truncates_digest() {
        let v = IntegrityViolation::Mismatch {
            kernel_id: "safety".to_owned(),
            expected: "0123456789abcdef".to_owned(),
            actual: "fedcba9876543210".to_owned(),
        };
        assert_eq!(
            v.to_string(),
            "safety: digest mismatch (expected 0123456789ab, found fedcba987654)"
        );
    }
}
