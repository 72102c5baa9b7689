//! Declarative rule tables.
//!
//! Rules are data: an id, a regex, a severity, an action, and a message.
//! Tables load from YAML and can be layered, with later rules replacing
//! earlier ones of the same id. Overriding a rule with `action: allow`
//! switches it off.
//!
//! ```yaml
//! rules:
//!   - id: force-push
//!     pattern: 'git\s+push\s+.*--force'
//!     severity: high
//!     action: block
//!     message: force pushes rewrite shared history
//! ```

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use l9_core::RiskLevel;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{GovernanceError, GovernanceResult};

/// What to do when a rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    /// Ignore the match.
    Allow,
    /// Report the match but let the action proceed.
    Warn,
    /// Refuse the action.
    Block,
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => write!(f, "allow"),
            Self::Warn => write!(f, "warn"),
            Self::Block => write!(f, "block"),
        }
    }
}

/// A rule as written in a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Stable identifier, unique within a table.
    pub id: String,
    /// Regular expression matched against each line of input.
    pub pattern: String,
    /// How serious a match is.
    #[serde(default = "default_severity")]
    pub severity: RiskLevel,
    /// What a match does to the verdict.
    pub action: RuleAction,
    /// Human-readable explanation shown with each finding.
    pub message: String,
}

fn default_severity() -> RiskLevel {
    RiskLevel::Medium
}

impl Rule {
    /// Build a rule in code.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        pattern: impl Into<String>,
        severity: RiskLevel,
        action: RuleAction,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            pattern: pattern.into(),
            severity,
            action,
            message: message.into(),
        }
    }
}

/// A rule with its pattern compiled.
#[derive(Debug, Clone)]
pub(crate) struct CompiledRule {
    pub(crate) rule: Rule,
    pub(crate) regex: Regex,
}

impl CompiledRule {
    fn compile(rule: Rule) -> GovernanceResult<Self> {
        let regex = Regex::new(&rule.pattern).map_err(|source| GovernanceError::InvalidPattern {
            rule_id: rule.id.clone(),
            source,
        })?;
        Ok(Self { rule, regex })
    }
}

#[derive(Deserialize)]
struct RuleDocument {
    #[serde(default)]
    rules: Vec<Rule>,
}

/// An ordered, id-unique set of compiled rules.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    pub(crate) rules: Vec<CompiledRule>,
}

impl RuleTable {
    /// Compile a list of rules.
    ///
    /// # Errors
    ///
    /// Fails on a duplicate id or an invalid pattern.
    pub fn from_rules(rules: Vec<Rule>) -> GovernanceResult<Self> {
        let mut seen = HashSet::with_capacity(rules.len());
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            if !seen.insert(rule.id.clone()) {
                return Err(GovernanceError::DuplicateRule(rule.id));
            }
            compiled.push(CompiledRule::compile(rule)?);
        }
        Ok(Self { rules: compiled })
    }

    /// Parse a YAML document with a top-level `rules:` list.
    ///
    /// # Errors
    ///
    /// Fails on malformed YAML, a duplicate id, or an invalid pattern.
    pub fn from_yaml(yaml: &str) -> GovernanceResult<Self> {
        let doc: RuleDocument = serde_yaml::from_str(yaml)?;
        Self::from_rules(doc.rules)
    }

    /// Read and parse a YAML rule file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or [`from_yaml`](Self::from_yaml) fails.
    pub fn from_file(path: &Path) -> GovernanceResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| GovernanceError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// The built-in mistake-detection rules for shell commands, SQL and
    /// generated code.
    ///
    /// # Errors
    ///
    /// Only fails if a built-in pattern is invalid.
    pub fn builtin_mistakes() -> GovernanceResult<Self> {
        use RiskLevel::{Critical, High, Medium};
        use RuleAction::{Block, Warn};

        Self::from_rules(vec![
            Rule::new(
                "rm-root",
                r"\brm\s+-[a-zA-Z]*[rR][a-zA-Z]*\s+(/|~/?|\$HOME/?)(\s|$|\*)",
                Critical,
                Block,
                "recursive delete of a root or home directory",
            ),
            Rule::new(
                "curl-pipe-shell",
                r"\b(curl|wget)\b[^|\n]*\|\s*(sudo\s+)?(ba|z)?sh\b",
                High,
                Block,
                "piping a download straight into a shell",
            ),
            Rule::new(
                "drop-database",
                r"(?i)\bdrop\s+(table|database|schema)\b",
                Critical,
                Block,
                "destructive schema change",
            ),
            Rule::new(
                "force-push",
                r"\bgit\s+push\b.*(\s--force\b|\s-f\b)",
                High,
                Block,
                "force push rewrites shared history",
            ),
            Rule::new(
                "hard-reset",
                r"\bgit\s+reset\s+--hard\b",
                Medium,
                Warn,
                "hard reset discards uncommitted work",
            ),
            Rule::new(
                "chmod-world-writable",
                r"\bchmod\s+(-R\s+)?0?777\b",
                Medium,
                Warn,
                "world-writable permissions",
            ),
            Rule::new(
                "sudo",
                r"(^|[;&|]\s*|\s)sudo\s",
                Medium,
                Warn,
                "privilege escalation",
            ),
            Rule::new(
                "tls-verify-disabled",
                r"(?i)(\bverify\s*=\s*false\b|\s--insecure\b|\bNODE_TLS_REJECT_UNAUTHORIZED\s*=\s*['\x22]?0)",
                Medium,
                Warn,
                "TLS certificate verification disabled",
            ),
        ])
    }

    /// Layer `overlay` on top of this table. Rules with a known id replace
    /// the existing rule in place; new ids are appended.
    #[must_use]
    pub fn merged_with(mut self, overlay: Self) -> Self {
        for incoming in overlay.rules {
            if let Some(existing) = self
                .rules
                .iter_mut()
                .find(|r| r.rule.id == incoming.rule.id)
            {
                *existing = incoming;
            } else {
                self.rules.push(incoming);
            }
        }
        self
    }

    /// The rules in evaluation order.
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().map(|c| &c.rule)
    }

    /// Look up a rule by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules().find(|r| r.id == id)
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_mistakes_compile() {
        let table = RuleTable::builtin_mistakes().unwrap();
        assert!(table.len() >= 8);
        assert_eq!(table.get("force-push").unwrap().action, RuleAction::Block);
    }

    #[test]
    fn test_from_yaml_defaults_severity() {
        let table = RuleTable::from_yaml(
            r"
rules:
  - id: no-print
    pattern: '\bprint\('
    action: warn
    message: stray debug output
",
        )
        .unwrap();
        let rule = table.get("no-print").unwrap();
        assert_eq!(rule.severity, RiskLevel::Medium);
        assert_eq!(rule.action, RuleAction::Warn);
    }

    #[test]
    fn test_invalid_pattern_names_rule() {
        let err = RuleTable::from_yaml(
            "rules:\n  - id: broken\n    pattern: '(unclosed'\n    action: block\n    message: x\n",
        )
        .unwrap_err();
        assert!(matches!(err, GovernanceError::InvalidPattern { ref rule_id, .. } if rule_id == "broken"));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let rule = Rule::new("a", "x", RiskLevel::Low, RuleAction::Warn, "m");
        let err = RuleTable::from_rules(vec![rule.clone(), rule]).unwrap_err();
        assert!(matches!(err, GovernanceError::DuplicateRule(id) if id == "a"));
    }

    #[test]
    fn test_unknown_action_is_parse_error() {
        let result = RuleTable::from_yaml(
            "rules:\n  - id: a\n    pattern: x\n    action: explode\n    message: m\n",
        );
        assert!(matches!(result, Err(GovernanceError::ParseError(_))));
    }

    #[test]
    fn test_merged_with_replaces_by_id() {
        let base = RuleTable::builtin_mistakes().unwrap();
        let before = base.len();
        let overlay = RuleTable::from_rules(vec![
            Rule::new("sudo", r"\bsudo\b", RiskLevel::Low, RuleAction::Allow, "ok here"),
            Rule::new("extra", "secret-project", RiskLevel::High, RuleAction::Block, "m"),
        ])
        .unwrap();
        let merged = base.merged_with(overlay);
        assert_eq!(merged.len(), before + 1);
        assert_eq!(merged.get("sudo").unwrap().action, RuleAction::Allow);
        assert_eq!(merged.rules().last().unwrap().id, "extra");
    }

    #[test]
    fn test_from_file_missing() {
        let result = RuleTable::from_file(Path::new("/nonexistent/rules.yaml"));
        assert!(matches!(result, Err(GovernanceError::ReadError { .. })));
    }
}
