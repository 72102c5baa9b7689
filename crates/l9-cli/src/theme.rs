//! CLI theme and styling.

use colored::Colorize;
use l9_core::RiskLevel;
use l9_runtime::CheckState;

/// CLI theme configuration.
pub(crate) struct Theme;

impl Theme {
    /// Format a header.
    pub(crate) fn header(text: &str) -> String {
        format!("{}", text.bold().cyan())
    }

    /// Format a success message.
    pub(crate) fn success(text: &str) -> String {
        format!("{} {}", "✓".green(), text)
    }

    /// Format an error message.
    pub(crate) fn error(text: &str) -> String {
        format!("{} {}", "✗".red(), text.red())
    }

    /// Format a warning message.
    pub(crate) fn warning(text: &str) -> String {
        format!("{} {}", "!".yellow(), text.yellow())
    }

    /// Format an info message.
    pub(crate) fn info(text: &str) -> String {
        format!("{} {}", "i".blue(), text)
    }

    /// Format a dimmed message.
    pub(crate) fn dimmed(text: &str) -> String {
        format!("{}", text.dimmed())
    }

    /// Format a separator line.
    pub(crate) fn separator() -> String {
        "━".repeat(50).dimmed().to_string()
    }

    /// Format a key-value pair.
    pub(crate) fn kv(key: &str, value: &str) -> String {
        format!("{}: {}", key.bold(), value)
    }

    /// Format a risk level.
    pub(crate) fn risk_level(level: RiskLevel) -> String {
        match level {
            RiskLevel::Low => "Low".green().to_string(),
            RiskLevel::Medium => "Medium".yellow().to_string(),
            RiskLevel::High => "High".red().to_string(),
            RiskLevel::Critical => "Critical".red().bold().to_string(),
        }
    }

    /// Format a readiness check state.
    pub(crate) fn check_state(state: CheckState) -> String {
        match state {
            CheckState::Ok => "OK".green().to_string(),
            CheckState::Warn => "WARN".yellow().to_string(),
            CheckState::Fail => "FAIL".red().to_string(),
        }
    }

    /// Format an id (shortened).
    pub(crate) fn short_id(id: &str) -> String {
        let short = id.get(..8).unwrap_or(id);
        format!("{}", short.cyan())
    }

    /// Format a timestamp.
    pub(crate) fn timestamp(dt: &chrono::DateTime<chrono::Utc>) -> String {
        dt.format("%Y-%m-%d %H:%M").to_string().dimmed().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id() {
        colored::control::set_override(false);
        assert_eq!(Theme::short_id("0123456789abcdef"), "01234567");
        assert_eq!(Theme::short_id("abc"), "abc");
    }
}
