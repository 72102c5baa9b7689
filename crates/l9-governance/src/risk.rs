//! Static tool risk classification.

use std::collections::BTreeMap;

use l9_core::RiskLevel;

/// Built-in tool classifications. Tools not listed are [`RiskLevel::Low`].
const BUILTIN_TOOL_RISKS: &[(&str, RiskLevel)] = &[
    ("gmp_run", RiskLevel::High),
    ("git_commit", RiskLevel::High),
    ("git_push", RiskLevel::Critical),
    ("shell_exec", RiskLevel::Critical),
    ("mac_agent_exec", RiskLevel::Critical),
    ("file_delete", RiskLevel::High),
    ("file_write", RiskLevel::Medium),
    ("memory_write", RiskLevel::Medium),
    ("file_read", RiskLevel::Low),
    ("memory_search", RiskLevel::Low),
];

/// Maps tool ids to risk levels.
#[derive(Debug, Clone)]
pub struct ToolRiskTable {
    risks: BTreeMap<String, RiskLevel>,
}

impl Default for ToolRiskTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ToolRiskTable {
    /// The built-in table.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            risks: BUILTIN_TOOL_RISKS
                .iter()
                .map(|(tool, risk)| ((*tool).to_owned(), *risk))
                .collect(),
        }
    }

    /// Raise the listed tools to at least [`RiskLevel::High`].
    #[must_use]
    pub fn with_high_risk<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for tool in tools {
            let entry = self.risks.entry(tool.into()).or_insert(RiskLevel::High);
            if *entry < RiskLevel::High {
                *entry = RiskLevel::High;
            }
        }
        self
    }

    /// Set an explicit risk level for a tool.
    pub fn set(&mut self, tool_id: impl Into<String>, risk: RiskLevel) {
        self.risks.insert(tool_id.into(), risk);
    }

    /// Risk level of `tool_id`; unknown tools are low risk.
    #[must_use]
    pub fn risk_of(&self, tool_id: &str) -> RiskLevel {
        self.risks.get(tool_id).copied().unwrap_or(RiskLevel::Low)
    }

    /// Whether `tool_id` needs human sign-off before running.
    #[must_use]
    pub fn requires_approval(&self, tool_id: &str) -> bool {
        self.risk_of(tool_id).requires_approval()
    }

    /// Every tool that needs approval, sorted.
    #[must_use]
    pub fn high_risk_tools(&self) -> Vec<&str> {
        self.risks
            .iter()
            .filter(|(_, risk)| risk.requires_approval())
            .map(|(tool, _)| tool.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_high_risk_tools() {
        let table = ToolRiskTable::builtin();
        for tool in [
            "gmp_run",
            "git_commit",
            "git_push",
            "shell_exec",
            "mac_agent_exec",
            "file_delete",
        ] {
            assert!(table.requires_approval(tool), "{tool} should need approval");
        }
        assert!(!table.requires_approval("file_read"));
        assert!(!table.requires_approval("file_write"));
    }

    #[test]
    fn test_unknown_tool_is_low_risk() {
        let table = ToolRiskTable::builtin();
        assert_eq!(table.risk_of("weather_lookup"), RiskLevel::Low);
        assert!(!table.requires_approval("weather_lookup"));
    }

    #[test]
    fn test_with_high_risk_raises_but_never_lowers() {
        let table = ToolRiskTable::builtin().with_high_risk(["file_write", "deploy", "git_push"]);
        assert_eq!(table.risk_of("file_write"), RiskLevel::High);
        assert_eq!(table.risk_of("deploy"), RiskLevel::High);
        assert_eq!(table.risk_of("git_push"), RiskLevel::Critical);
        assert!(table.high_risk_tools().contains(&"deploy"));
    }
}
