//! The loaded kernel stack.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::manifest::{IntegrityViolation, KernelManifest};
use crate::path::{deep_merge, lookup};
use crate::sequence::{KernelSpec, default_sequence};

/// Load outcome for a single kernel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum KernelStatus {
    /// Parsed into a mapping.
    Loaded,
    /// The file does not exist (or could not be read).
    Missing,
    /// The file exists but is not a YAML mapping.
    Invalid {
        /// Parser or shape error.
        error: String,
    },
}

impl KernelStatus {
    /// Whether the kernel contributed a mapping to the stack.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded)
    }
}

impl fmt::Display for KernelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loaded => write!(f, "loaded"),
            Self::Missing => write!(f, "missing"),
            Self::Invalid { error } => write!(f, "invalid: {error}"),
        }
    }
}

/// An ordered set of YAML kernels that together define agent identity.
///
/// Built once by [`KernelStack::load`] and immutable afterwards; share it as
/// `Arc<KernelStack>`.
#[derive(Debug, Clone)]
pub struct KernelStack {
    root: PathBuf,
    sequence: Vec<KernelSpec>,
    kernels: HashMap<String, Mapping>,
    hashes: BTreeMap<String, String>,
    statuses: BTreeMap<String, KernelStatus>,
    merged: Mapping,
    empty: Mapping,
}

impl KernelStack {
    /// Load the default ten-kernel sequence from `root`.
    #[must_use]
    pub fn load(root: impl AsRef<Path>) -> Self {
        Self::load_sequence(root, &default_sequence())
    }

    /// Load an explicit kernel sequence from `root`.
    ///
    /// Never fails: a kernel that is missing or does not parse to a mapping
    /// is recorded with an empty mapping and a non-`Loaded` status.
    #[must_use]
    pub fn load_sequence(root: impl AsRef<Path>, sequence: &[KernelSpec]) -> Self {
        let root = root.as_ref().to_path_buf();
        let mut kernels = HashMap::with_capacity(sequence.len());
        let mut hashes = BTreeMap::new();
        let mut statuses = BTreeMap::new();
        let mut merged = Mapping::new();

        for spec in sequence {
            let full = root.join(&spec.path);
            let bytes = match std::fs::read(&full) {
                Ok(b) => b,
                Err(e) => {
                    warn!(kernel = %spec.id, path = %full.display(), error = %e, "kernel file unavailable");
                    kernels.insert(spec.id.clone(), Mapping::new());
                    statuses.insert(spec.id.clone(), KernelStatus::Missing);
                    continue;
                },
            };

            hashes.insert(path_key(&spec.path), hex::encode(Sha256::digest(&bytes)));

            let status = match serde_yaml::from_slice::<Value>(&bytes) {
                Ok(Value::Mapping(map)) => {
                    deep_merge(&mut merged, &map);
                    kernels.insert(spec.id.clone(), map);
                    debug!(kernel = %spec.id, "kernel loaded");
                    KernelStatus::Loaded
                },
                Ok(other) => {
                    let error = format!("expected a mapping, found {}", value_kind(&other));
                    warn!(kernel = %spec.id, %error, "kernel ignored");
                    kernels.insert(spec.id.clone(), Mapping::new());
                    KernelStatus::Invalid { error }
                },
                Err(e) => {
                    warn!(kernel = %spec.id, error = %e, "kernel failed to parse");
                    kernels.insert(spec.id.clone(), Mapping::new());
                    KernelStatus::Invalid {
                        error: e.to_string(),
                    }
                },
            };
            statuses.insert(spec.id.clone(), status);
        }

        let stack = Self {
            root,
            sequence: sequence.to_vec(),
            kernels,
            hashes,
            statuses,
            merged,
            empty: Mapping::new(),
        };
        info!(
            root = %stack.root.display(),
            loaded = stack.loaded_count(),
            total = stack.sequence.len(),
            active = stack.is_active(),
            "kernel stack loaded"
        );
        stack
    }

    /// Root directory the sequence was resolved against.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The sequence this stack was loaded from.
    #[must_use]
    pub fn sequence(&self) -> &[KernelSpec] {
        &self.sequence
    }

    /// The parsed mapping for `kernel_id`; empty if absent or unknown.
    #[must_use]
    pub fn get_kernel(&self, kernel_id: &str) -> &Mapping {
        self.kernels.get(kernel_id).unwrap_or(&self.empty)
    }

    /// Look up a value by dotted path inside one kernel.
    #[must_use]
    pub fn rule(&self, kernel_id: &str, dotted: &str) -> Option<&Value> {
        lookup(self.get_kernel(kernel_id), dotted)
    }

    /// Look up a value by dotted path, returning `default` if any segment is
    /// missing or an intermediate value is not a mapping.
    #[must_use]
    pub fn get_rule(&self, kernel_id: &str, dotted: &str, default: Value) -> Value {
        self.rule(kernel_id, dotted).cloned().unwrap_or(default)
    }

    /// All loaded kernels merged in sequence order.
    #[must_use]
    pub fn merged(&self) -> &Mapping {
        &self.merged
    }

    /// Dotted-path lookup against [`merged`](Self::merged).
    #[must_use]
    pub fn merged_rule(&self, dotted: &str, default: Value) -> Value {
        lookup(&self.merged, dotted).cloned().unwrap_or(default)
    }

    /// True iff the sequence is non-empty and every kernel loaded.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.sequence.is_empty()
            && self
                .sequence
                .iter()
                .all(|s| self.statuses.get(&s.id).is_some_and(KernelStatus::is_loaded))
    }

    /// Number of kernels that loaded.
    #[must_use]
    pub fn loaded_count(&self) -> usize {
        self.statuses.values().filter(|s| s.is_loaded()).count()
    }

    /// Ids of kernels that did not load, in sequence order.
    #[must_use]
    pub fn not_loaded(&self) -> Vec<String> {
        self.sequence
            .iter()
            .filter(|s| !self.statuses.get(&s.id).is_some_and(KernelStatus::is_loaded))
            .map(|s| s.id.clone())
            .collect()
    }

    /// Relative kernel path → SHA-256 hex digest, for every file that was read.
    #[must_use]
    pub fn hashes(&self) -> &BTreeMap<String, String> {
        &self.hashes
    }

    /// Digest of the file backing `kernel_id`, if it was read.
    #[must_use]
    pub fn hash_of(&self, kernel_id: &str) -> Option<&str> {
        let spec = self.sequence.iter().find(|s| s.id == kernel_id)?;
        self.hashes.get(&path_key(&spec.path)).map(String::as_str)
    }

    /// Kernel id → load status.
    #[must_use]
    pub fn statuses(&self) -> &BTreeMap<String, KernelStatus> {
        &self.statuses
    }

    /// Snapshot the current digests into a manifest.
    #[must_use]
    pub fn manifest(&self) -> KernelManifest {
        let mut manifest = KernelManifest::default();
        for spec in &self.sequence {
            if let Some(hash) = self.hash_of(&spec.id) {
                manifest.kernels.insert(spec.id.clone(), hash.to_owned());
            }
        }
        manifest
    }

    /// Compare the loaded digests against a previously recorded manifest.
    #[must_use]
    pub fn verify(&self, manifest: &KernelManifest) -> Vec<IntegrityViolation> {
        let mut violations = Vec::new();
        for (kernel_id, expected) in &manifest.kernels {
            match self.hash_of(kernel_id) {
                None => violations.push(IntegrityViolation::MissingKernel {
                    kernel_id: kernel_id.clone(),
                }),
                Some(actual) if actual != expected => {
                    violations.push(IntegrityViolation::Mismatch {
                        kernel_id: kernel_id.clone(),
                        expected: expected.clone(),
                        actual: actual.to_owned(),
                    });
                },
                Some(_) => {},
            }
        }
        for spec in &self.sequence {
            if self.hash_of(&spec.id).is_some() && !manifest.kernels.contains_key(&spec.id) {
                violations.push(IntegrityViolation::Unexpected {
                    kernel_id: spec.id.clone(),
                });
            }
        }
        violations
    }
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_kernel(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn two_kernel_sequence() -> Vec<KernelSpec> {
        vec![
            KernelSpec::new("identity", "kernels/identity.yaml"),
            KernelSpec::new("safety", "kernels/safety.yaml"),
        ]
    }

    #[test]
    fn test_get_rule_walks_dotted_path() {
        let dir = tempfile::tempdir().unwrap();
        write_kernel(
            dir.path(),
            "kernels/identity.yaml",
            "identity:\n  designation: L\n  limits:\n    max_depth: 3\n",
        );
        write_kernel(dir.path(), "kernels/safety.yaml", "mode: strict\n");

        let stack = KernelStack::load_sequence(dir.path(), &two_kernel_sequence());
        assert!(stack.is_active());
        assert_eq!(
            stack.get_rule("identity", "identity.limits.max_depth", Value::Null),
            Value::from(3)
        );
        assert_eq!(
            stack.get_rule("identity", "identity.limits.missing", Value::from("d")),
            Value::from("d")
        );
        assert_eq!(
            stack.get_rule("identity", "identity.designation.x", Value::from(0)),
            Value::from(0)
        );
        assert_eq!(
            stack.get_rule("nonexistent", "a", Value::Bool(false)),
            Value::Bool(false)
        );
    }

    #[test]
    fn test_missing_and_invalid_kernels_degrade() {
        let dir = tempfile::tempdir().unwrap();
        write_kernel(dir.path(), "kernels/identity.yaml", "- just\n- a list\n");

        let stack = KernelStack::load_sequence(dir.path(), &two_kernel_sequence());
        assert!(!stack.is_active());
        assert!(stack.get_kernel("identity").is_empty());
        assert!(matches!(
            stack.statuses().get("identity"),
            Some(KernelStatus::Invalid { .. })
        ));
        assert_eq!(stack.statuses().get("safety"), Some(&KernelStatus::Missing));
        assert_eq!(stack.not_loaded(), vec!["identity", "safety"]);
        // Read but invalid files are still hashed.
        assert!(stack.hash_of("identity").is_some());
        assert!(stack.hash_of("safety").is_none());
    }

    #[test]
    fn test_unparseable_yaml_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        write_kernel(dir.path(), "kernels/identity.yaml", "a: [unclosed\n");
        let stack = KernelStack::load_sequence(dir.path(), &two_kernel_sequence());
        assert!(matches!(
            stack.statuses().get("identity"),
            Some(KernelStatus::Invalid { .. })
        ));
    }

    #[test]
    fn test_hash_is_sha256_hex() {
        let dir = tempfile::tempdir().unwrap();
        write_kernel(dir.path(), "kernels/identity.yaml", "a: 1\n");
        let stack = KernelStack::load_sequence(dir.path(), &two_kernel_sequence());
        let expected = hex::encode(Sha256::digest(b"a: 1\n"));
        assert_eq!(
            stack.hashes().get("kernels/identity.yaml"),
            Some(&expected)
        );
        assert_eq!(expected.len(), 64);
    }

    #[test]
    fn test_merged_view_later_layers_win() {
        let dir = tempfile::tempdir().unwrap();
        write_kernel(
            dir.path(),
            "kernels/identity.yaml",
            "tone: formal\nlimits:\n  tokens: 100\n",
        );
        write_kernel(dir.path(), "kernels/safety.yaml", "limits:\n  tokens: 50\n");
        let stack = KernelStack::load_sequence(dir.path(), &two_kernel_sequence());
        assert_eq!(stack.merged_rule("limits.tokens", Value::Null), Value::from(50));
        assert_eq!(stack.merged_rule("tone", Value::Null), Value::from("formal"));
    }

    #[test]
    fn test_empty_sequence_is_not_active() {
        let dir = tempfile::tempdir().unwrap();
        let stack = KernelStack::load_sequence(dir.path(), &[]);
        assert!(!stack.is_active());
        assert_eq!(stack.loaded_count(), 0);
    }

    #[test]
    fn test_default_sequence_on_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let stack = KernelStack::load(dir.path());
        assert_eq!(stack.sequence().len(), 10);
        assert_eq!(stack.not_loaded().len(), 10);
    }

    #[test]
    fn test_verify_detects_changes() {
        let dir = tempfile::tempdir().unwrap();
        write_kernel(dir.path(), "kernels/identity.yaml", "a: 1\n");
        write_kernel(dir.path(), "kernels/safety.yaml", "b: 2\n");
        let manifest = KernelStack::load_sequence(dir.path(), &two_kernel_sequence()).manifest();
        assert_eq!(manifest.kernels.len(), 2);

        write_kernel(dir.path(), "kernels/identity.yaml", "a: 2\n");
        std::fs::remove_file(dir.path().join("kernels/safety.yaml")).unwrap();
        let stack = KernelStack::load_sequence(dir.path(), &two_kernel_sequence());
        let violations = stack.verify(&manifest);
        assert_eq!(violations.len(), 2);
        assert!(violations
            .iter()
            .any(|v| matches!(v, IntegrityViolation::Mismatch { kernel_id, .. } if kernel_id == "identity")));
        assert!(violations
            .iter()
            .any(|v| matches!(v, IntegrityViolation::MissingKernel { kernel_id } if kernel_id == "safety")));
    }

    #[test]
    fn test_verify_reports_unexpected() {
        let dir = tempfile::tempdir().unwrap();
        write_kernel(dir.path(), "kernels/identity.yaml", "a: 1\n");
        let stack = KernelStack::load_sequence(dir.path(), &two_kernel_sequence());
        let violations = stack.verify(&KernelManifest::default());
        assert_eq!(
            violations,
            vec![IntegrityViolation::Unexpected {
                kernel_id: "identity".to_owned()
            }]
        );
        assert!(stack.verify(&stack.manifest()).is_empty());
    }
}
