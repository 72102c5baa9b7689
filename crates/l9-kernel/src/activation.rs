//! Whether agents should trust kernel-derived behavior.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::stack::KernelStack;

/// Resolved kernel activation for a process.
///
/// Combines the `kernels.enabled` setting (`L9_USE_KERNELS`) with the state of
/// the loaded stack. Callers enforce it; the stack itself never refuses reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum KernelActivation {
    /// Enabled and every kernel loaded.
    Active,
    /// Disabled by configuration.
    Disabled,
    /// Enabled but some kernels did not load.
    Degraded {
        /// Ids of kernels that did not load.
        missing: Vec<String>,
    },
}

impl KernelActivation {
    /// Resolve activation from the configuration flag and a loaded stack.
    #[must_use]
    pub fn resolve(use_kernels: bool, stack: &KernelStack) -> Self {
        if !use_kernels {
            Self::Disabled
        } else if stack.is_active() {
            Self::Active
        } else {
            Self::Degraded {
                missing: stack.not_loaded(),
            }
        }
    }

    /// Only a fully active stack should drive agent behavior.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for KernelActivation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Disabled => write!(f, "disabled"),
            Self::Degraded { missing } if missing.is_empty() => write!(f, "degraded"),
            Self::Degraded { missing } => write!(f, "degraded (missing: {})", missing.join(", ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::KernelSpec;

    #[test]
    fn test_resolve() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.yaml"), "x: 1\n").unwrap();

        let full = KernelStack::load_sequence(dir.path(), &[KernelSpec::new("a", "a.yaml")]);
        assert_eq!(KernelActivation::resolve(true, &full), KernelActivation::Active);
        assert_eq!(KernelActivation::resolve(false, &full), KernelActivation::Disabled);

        let partial = KernelStack::load_sequence(
            dir.path(),
            &[KernelSpec::new("a", "a.yaml"), KernelSpec::new("b", "b.yaml")],
        );
        let activation = KernelActivation::resolve(true, &partial);
        assert_eq!(
            activation,
            KernelActivation::Degraded {
                missing: vec!["b".to_owned()]
            }
        );
        assert!(!activation.is_active());
        assert_eq!(activation.to_string(), "degraded (missing: b)");
    }
}
