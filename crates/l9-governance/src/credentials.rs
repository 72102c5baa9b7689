//! Credential detection and redaction.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Credential formats and their patterns. A `secret` capture group, when
/// present, narrows the span that gets redacted.
static CREDENTIAL_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("private_key", r"-----BEGIN (?:[A-Z]+ )?PRIVATE KEY-----"),
        ("anthropic_api_key", r"\bsk-ant-[A-Za-z0-9_\-]{20,}"),
        ("openai_api_key", r"\bsk-(?:proj-)?[A-Za-z0-9_\-]{20,}"),
        ("aws_access_key_id", r"\b(?:AKIA|ASIA)[0-9A-Z]{16}\b"),
        ("github_token", r"\bgh[pousr]_[A-Za-z0-9]{36,}\b"),
        ("slack_token", r"\bxox[abprs]-[A-Za-z0-9\-]{10,}"),
        (
            "connection_string_password",
            r"\b[a-z][a-z0-9+]*://[^:/\s@]+:(?P<secret>[^@\s]+)@",
        ),
        (
            "assigned_secret",
            r#"(?i)\b(?:api[_-]?key|secret|password|passwd|token)\b["']?\s*[:=]\s*["']?(?P<secret>[A-Za-z0-9/+_\-]{12,})"#,
        ),
    ]
    .into_iter()
    .map(|(kind, pattern)| (kind, Regex::new(pattern).expect("invalid regex")))
    .collect()
});

/// A credential found in text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialFinding {
    /// Credential format (`openai_api_key`, `github_token`, ...).
    pub kind: String,
    /// 1-based line number.
    pub line: usize,
    /// Byte offset of the secret in the scanned text.
    pub start: usize,
    /// Byte offset one past the end of the secret.
    pub end: usize,
    /// Masked preview safe to log.
    pub preview: String,
}

/// Scans text for well-known credential formats.
#[derive(Debug, Clone, Copy, Default)]
pub struct CredentialScanner;

impl CredentialScanner {
    /// Create a scanner with the built-in patterns.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Find credentials in `text`, ordered by position, without overlaps.
    #[must_use]
    pub fn scan(&self, text: &str) -> Vec<CredentialFinding> {
        let mut spans: Vec<(usize, usize, &'static str)> = Vec::new();
        for (kind, regex) in CREDENTIAL_PATTERNS.iter() {
            for caps in regex.captures_iter(text) {
                let Some(m) = caps.name("secret").or_else(|| caps.get(0)) else {
                    continue;
                };
                spans.push((m.start(), m.end(), *kind));
            }
        }
        // Earlier start first, then the longer span. Exact ties keep pattern order.
        spans.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

        let mut findings = Vec::with_capacity(spans.len());
        let mut covered_to = 0usize;
        for (start, end, kind) in spans {
            if start < covered_to {
                continue;
            }
            covered_to = end;
            findings.push(CredentialFinding {
                kind: kind.to_owned(),
                line: line_of(text, start),
                start,
                end,
                preview: mask(text.get(start..end).unwrap_or_default()),
            });
        }
        findings
    }

    /// Whether `text` contains any credential.
    #[must_use]
    pub fn contains_credentials(&self, text: &str) -> bool {
        CREDENTIAL_PATTERNS.iter().any(|(_, re)| re.is_match(text))
    }

    /// Replace each credential with `[REDACTED:<kind>]`.
    #[must_use]
    pub fn redact(&self, text: &str) -> String {
        let findings = self.scan(text);
        if findings.is_empty() {
            return text.to_owned();
        }
        let mut out = String::with_capacity(text.len());
        let mut cursor = 0usize;
        for f in &findings {
            out.push_str(text.get(cursor..f.start).unwrap_or_default());
            out.push_str("[REDACTED:");
            out.push_str(&f.kind);
            out.push(']');
            cursor = f.end;
        }
        out.push_str(text.get(cursor..).unwrap_or_default());
        out
    }
}

/// 1-based line number of a byte offset.
pub(crate) fn line_of(text: &str, offset: usize) -> usize {
    text.get(..offset)
        .map_or(0, |prefix| prefix.matches('\n').count())
        .saturating_add(1)
}

fn mask(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    format!("{visible}****")
}
