//! Test fixtures: on-disk kernels and ready-made configuration.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tempfile::TempDir;

use l9_config::{Config, QueueBackendKind};
use l9_kernel::{DEFAULT_KERNEL_IDS, default_sequence};

/// A temporary kernel root laid out like a real agent directory.
///
/// Files follow the default sequence, `kernels/NN_<id>_kernel.yaml`.
#[derive(Debug)]
pub struct KernelFixture {
    dir: TempDir,
}

impl KernelFixture {
    /// An empty kernel root.
    ///
    /// # Panics
    ///
    /// Panics if a temporary directory cannot be created.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn empty() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    /// A kernel root with every default kernel present and valid.
    #[must_use]
    pub fn complete() -> Self {
        let fixture = Self::empty();
        for id in DEFAULT_KERNEL_IDS {
            fixture.write(id, &format!("kernel: {id}\nversion: 1\nrules:\n  enabled: true\n"));
        }
        fixture
    }

    /// Root directory the sequence resolves against.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Path of the file for `kernel_id` in the default sequence.
    ///
    /// # Panics
    ///
    /// Panics if `kernel_id` is not a default kernel.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn path_of(&self, kernel_id: &str) -> PathBuf {
        let spec = default_sequence()
            .into_iter()
            .find(|s| s.id == kernel_id)
            .expect("not a default kernel id");
        self.root().join(spec.path)
    }

    /// Write `yaml` as the kernel file for `kernel_id`.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    #[allow(clippy::expect_used)]
    pub fn write(&self, kernel_id: &str, yaml: &str) {
        let path = self.path_of(kernel_id);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create kernel dir");
        }
        std::fs::write(path, yaml).expect("failed to write kernel");
    }

    /// Delete the kernel file for `kernel_id`, if present.
    pub fn remove(&self, kernel_id: &str) {
        let _ = std::fs::remove_file(self.path_of(kernel_id));
    }

    /// Default manifest location for this root.
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.root().join("kernels").join("manifest.yaml")
    }
}

/// Config with the memory queue, no database, and kernels under `kernel_root`.
#[must_use]
pub fn test_config(kernel_root: &Path) -> Config {
    let mut config = Config::default();
    config.queue.backend = QueueBackendKind::Memory;
    config.storage.database_url = None;
    config.kernels.root = kernel_root.to_path_buf();
    config
}

/// Turn a `json!({...})` literal into tool arguments.
#[must_use]
pub fn args(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
