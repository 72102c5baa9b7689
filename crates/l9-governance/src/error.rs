use std::path::PathBuf;

/// Errors raised while building governance tables.
#[derive(Debug, thiserror::Error)]
pub enum GovernanceError {
    /// A rule's pattern is not a valid regular expression.
    #[error("rule '{rule_id}' has an invalid pattern: {source}")]
    InvalidPattern {
        /// Offending rule.
        rule_id: String,
        /// Regex compile error.
        source: regex::Error,
    },

    /// Two rules in the same table share an id.
    #[error("duplicate rule id '{0}'")]
    DuplicateRule(String),

    /// A rule table document is malformed.
    #[error("invalid rule table: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// A rule file could not be read.
    #[error("failed to read rule file {path}: {source}")]
    ReadError {
        /// Path that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Result type for governance operations.
pub type GovernanceResult<T> = Result<T, GovernanceError>;
