//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Upper bound for a single GMP execution (6 hours).
const MAX_GMP_TIMEOUT_SECS: u64 = 6 * 60 * 60;

/// Upper bound for an approval TTL (7 days).
const MAX_APPROVAL_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Validate a fully merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_approvals(config)?;
    validate_queue(config)?;
    validate_worker(config)?;
    validate_logging(config)?;
    Ok(())
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_owned(),
        message: message.into(),
    }
}

fn validate_approvals(config: &Config) -> ConfigResult<()> {
    let ttl = config.approvals.ttl_secs;
    if ttl == 0 || ttl > MAX_APPROVAL_TTL_SECS {
        return Err(invalid(
            "approvals.ttl_secs",
            format!("must be between 1 and {MAX_APPROVAL_TTL_SECS}"),
        ));
    }
    if config
        .approvals
        .extra_high_risk_tools
        .iter()
        .any(|t| t.trim().is_empty())
    {
        return Err(invalid(
            "approvals.extra_high_risk_tools",
            "tool ids must not be empty",
        ));
    }
    Ok(())
}

fn validate_queue(config: &Config) -> ConfigResult<()> {
    let q = &config.queue;
    if q.redis_host.trim().is_empty() {
        return Err(invalid("queue.redis_host", "must not be empty"));
    }
    if q.redis_port == 0 {
        return Err(invalid("queue.redis_port", "must not be 0"));
    }
    if q.key_prefix.is_empty() || q.key_prefix.contains(char::is_whitespace) {
        return Err(invalid(
            "queue.key_prefix",
            "must be non-empty and contain no whitespace",
        ));
    }
    Ok(())
}

fn validate_worker(config: &Config) -> ConfigResult<()> {
    let w = &config.worker;
    if w.cursor_cli_path.trim().is_empty() {
        return Err(invalid("worker.cursor_cli_path", "must not be empty"));
    }
    if w.gmp_timeout_secs == 0 || w.gmp_timeout_secs > MAX_GMP_TIMEOUT_SECS {
        return Err(invalid(
            "worker.gmp_timeout_secs",
            format!("must be between 1 and {MAX_GMP_TIMEOUT_SECS}"),
        ));
    }
    if w.poll_interval_ms == 0 {
        return Err(invalid("worker.poll_interval_ms", "must be positive"));
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let l = &config.logging;
    if !matches!(
        l.level.to_ascii_lowercase().as_str(),
        "trace" | "debug" | "info" | "warn" | "error" | "off"
    ) {
        return Err(invalid(
            "logging.level",
            format!(
                "unknown level '{}'; expected trace, debug, info, warn, error or off",
                l.level
            ),
        ));
    }
    if !matches!(l.format.as_str(), "pretty" | "compact" | "json") {
        return Err(invalid(
            "logging.format",
            format!("unknown format '{}'; expected pretty, compact or json", l.format),
        ));
    }
    Ok(())
}
