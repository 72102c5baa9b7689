//! L9 Governance - rule-table mistake detection, credential scanning, and
//! tool risk classification.
//!
//! Governance is data-driven: a [`RuleTable`] of id/pattern/severity/action
//! rows, evaluated by one function, [`RuleEngine::evaluate`], into a tagged
//! [`Verdict`].
//!
//! # Example
//!
//! ```
//! use l9_governance::{CredentialScanner, RuleEngine, RuleTable, Verdict};
//!
//! let engine = RuleEngine::new(RuleTable::builtin_mistakes().unwrap())
//!     .with_credential_scan(CredentialScanner::new());
//!
//! assert_eq!(engine.evaluate("cargo fmt"), Verdict::Allow);
//! assert!(engine.evaluate("git push --force origin main").is_blocked());
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod credentials;
pub mod engine;
/// Error types for rule loading.
pub mod error;
pub mod risk;
pub mod rules;

pub use credentials::{CredentialFinding, CredentialScanner};
pub use engine::{CREDENTIAL_RULE_ID, Finding, RuleEngine, Verdict};
pub use error::{GovernanceError, GovernanceResult};
pub use risk::ToolRiskTable;
pub use rules::{Rule, RuleAction, RuleTable};
