//! Kernel sequence definitions.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One entry in a kernel sequence: an id and a path relative to the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelSpec {
    /// Short kernel id (`identity`, `safety`, ...).
    pub id: String,
    /// Path of the YAML file, relative to the stack root.
    pub path: PathBuf,
}

impl KernelSpec {
    /// Create a spec from an id and relative path.
    #[must_use]
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
        }
    }
}

/// Default kernel ids in load order.
pub const DEFAULT_KERNEL_IDS: [&str; 10] = [
    "master",
    "identity",
    "cognitive",
    "behavioral",
    "memory",
    "worldmodel",
    "execution",
    "safety",
    "developer",
    "packet_protocol",
];

/// The fixed default sequence, `kernels/NN_<id>_kernel.yaml`.
#[must_use]
pub fn default_sequence() -> Vec<KernelSpec> {
    DEFAULT_KERNEL_IDS
        .iter()
        .zip(1u8..)
        .map(|(id, n)| KernelSpec::new(*id, format!("kernels/{n:02}_{id}_kernel.yaml")))
        .collect()
}
