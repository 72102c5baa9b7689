//! Environment variable overrides.
//!
//! Deployment knobs (`REDIS_HOST`, `GMP_TIMEOUT_SECONDS`, ...) are applied on
//! top of every file layer. Variables are read once into a map so tests can
//! pass their own.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::merge::{ConfigLayer, FieldSources, set_nested};

#[derive(Debug, Clone, Copy)]
enum EnvKind {
    Str,
    Bool,
    Port,
    Uint,
}

/// Variable name, dotted config path, value shape.
const ENV_OVERRIDES: &[(&str, &str, EnvKind)] = &[
    ("OPENAI_API_KEY", "llm.api_key", EnvKind::Str),
    ("L9_USE_KERNELS", "kernels.enabled", EnvKind::Bool),
    ("L9_KERNEL_ROOT", "kernels.root", EnvKind::Str),
    ("REDIS_HOST", "queue.redis_host", EnvKind::Str),
    ("REDIS_PORT", "queue.redis_port", EnvKind::Port),
    ("CURSOR_CLI_PATH", "worker.cursor_cli_path", EnvKind::Str),
    ("GMP_TIMEOUT_SECONDS", "worker.gmp_timeout_secs", EnvKind::Uint),
    ("DATABASE_URL", "storage.database_url", EnvKind::Str),
    ("L9_LOG", "logging.level", EnvKind::Str),
];

/// Recognised variables and the dotted field each one overrides.
pub fn env_overrides() -> impl Iterator<Item = (&'static str, &'static str)> {
    ENV_OVERRIDES.iter().map(|(name, path, _)| (*name, *path))
}

/// Snapshot the process environment variables this crate understands.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    ENV_OVERRIDES
        .iter()
        .map(|(name, _, _)| *name)
        .chain(std::iter::once("L9_HOME"))
        .filter_map(|name| std::env::var(name).ok().map(|v| (name.to_owned(), v)))
        .collect()
}

/// Apply every recognised variable in `env_vars` onto `merged`.
///
/// Empty values are ignored. Returns the number of overrides applied.
///
/// # Errors
///
/// Returns [`ConfigError::EnvError`] if a variable cannot be parsed into the
/// shape its field expects.
pub fn apply_env_overrides(
    merged: &mut toml::Value,
    sources: &mut FieldSources,
    env_vars: &HashMap<String, String>,
) -> ConfigResult<usize> {
    let mut applied = 0usize;
    for (name, path, kind) in ENV_OVERRIDES {
        let Some(raw) = env_vars.get(*name).map(|v| v.trim()) else {
            continue;
        };
        if raw.is_empty() {
            continue;
        }
        let value = parse_value(name, raw, *kind)?;
        let segments: Vec<&str> = path.split('.').collect();
        if set_nested(merged, &segments, value) {
            sources.insert((*path).to_owned(), ConfigLayer::Environment((*name).to_owned()));
            applied = applied.saturating_add(1);
            debug!(var = name, field = path, "applied environment override");
        }
    }
    Ok(applied)
}

fn parse_value(name: &str, raw: &str, kind: EnvKind) -> ConfigResult<toml::Value> {
    let err = |message: String| ConfigError::EnvError {
        var_name: name.to_owned(),
        message,
    };
    match kind {
        EnvKind::Str => Ok(toml::Value::String(raw.to_owned())),
        EnvKind::Bool => parse_bool(raw)
            .map(toml::Value::Boolean)
            .ok_or_else(|| err(format!("expected a boolean, got '{raw}'"))),
        EnvKind::Port => raw
            .parse::<u16>()
            .map(|p| toml::Value::Integer(i64::from(p)))
            .map_err(|e| err(format!("expected a port number: {e}"))),
        EnvKind::Uint => raw
            .parse::<u32>()
            .map(|n| toml::Value::Integer(i64::from(n)))
            .map_err(|e| err(format!("expected a non-negative integer: {e}"))),
    }
}

/// Parse the boolean spellings accepted in environment variables.
#[must_use]
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
