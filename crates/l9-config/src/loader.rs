//! Config file discovery and layered loading.
//!
//! Implements the `Config::load()` algorithm:
//! 1. Parse embedded `defaults.toml` → base
//! 2. Merge `~/.l9/config.toml` (or `$L9_HOME/config.toml`)
//! 3. Merge `{workspace}/.l9/config.toml`
//! 4. Apply environment variable overrides
//! 5. Deserialize the merged tree → `Config`
//! 6. Validate

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::env::{apply_env_overrides, collect_env_vars};
use crate::error::{ConfigError, ConfigResult};
use crate::merge::{ConfigLayer, FieldSources, deep_merge_tracking, record_leaves};
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// Name of the per-user and per-workspace config directory.
pub const CONFIG_DIR_NAME: &str = ".l9";

/// A loaded configuration together with where each value came from.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    /// The final configuration.
    pub config: Config,
    /// Dotted field path → layer that set it.
    #[serde(skip)]
    pub field_sources: FieldSources,
    /// Files that contributed, in merge order.
    pub loaded_files: Vec<String>,
}

/// Paths consulted by [`load`], for `l9 config paths`.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    /// User-level config file.
    pub user: PathBuf,
    /// Workspace-level config file, if a workspace was given.
    pub workspace: Option<PathBuf>,
}

/// Resolve the user and workspace config paths without reading them.
///
/// # Errors
///
/// Returns [`ConfigError::NoHomeDir`] if no home directory can be found and
/// `L9_HOME` is unset.
pub fn config_paths(
    workspace_root: Option<&Path>,
    env_vars: &HashMap<String, String>,
) -> ConfigResult<ConfigPaths> {
    let user_dir = match env_vars.get("L9_HOME") {
        Some(home) if !home.trim().is_empty() => PathBuf::from(home),
        _ => home_directory()?.join(CONFIG_DIR_NAME),
    };
    Ok(ConfigPaths {
        user: user_dir.join("config.toml"),
        workspace: workspace_root.map(|ws| ws.join(CONFIG_DIR_NAME).join("config.toml")),
    })
}

/// Load configuration using the process environment.
///
/// # Errors
///
/// Returns a [`ConfigError`] if any config file is malformed, an environment
/// variable cannot be parsed, or the merged result fails validation.
pub fn load(workspace_root: Option<&Path>) -> ConfigResult<ResolvedConfig> {
    let env_vars = collect_env_vars();
    let paths = config_paths(workspace_root, &env_vars)?;
    load_layers(&paths, &env_vars)
}

/// Load configuration from explicit layer paths and an explicit environment.
///
/// # Errors
///
/// See [`load`].
pub fn load_layers(
    paths: &ConfigPaths,
    env_vars: &HashMap<String, String>,
) -> ConfigResult<ResolvedConfig> {
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;

    let mut field_sources = FieldSources::new();
    let mut loaded_files = Vec::new();
    record_leaves(&merged, "", &ConfigLayer::Defaults, &mut field_sources);

    if let Some(overlay) = try_load_file(&paths.user)? {
        deep_merge_tracking(&mut merged, &overlay, "", &ConfigLayer::User, &mut field_sources);
        loaded_files.push(paths.user.display().to_string());
        info!(path = %paths.user.display(), "loaded user config");
    }

    if let Some(ws_path) = &paths.workspace
        && let Some(overlay) = try_load_file(ws_path)?
    {
        deep_merge_tracking(
            &mut merged,
            &overlay,
            "",
            &ConfigLayer::Workspace,
            &mut field_sources,
        );
        loaded_files.push(ws_path.display().to_string());
        info!(path = %ws_path.display(), "loaded workspace config");
    }

    let env_count = apply_env_overrides(&mut merged, &mut field_sources, env_vars)?;
    if env_count > 0 {
        debug!(count = env_count, "applied environment variable overrides");
    }

    let config: Config =
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: "<merged config>".to_owned(),
                source: e,
            })?;

    validate::validate(&config)?;

    Ok(ResolvedConfig {
        config,
        field_sources,
        loaded_files,
    })
}

/// Load a config from a single file on top of the defaults (no env, no layering).
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed, or validated.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let overlay = try_load_file(path)?.ok_or_else(|| ConfigError::ReadError {
        path: path.display().to_string(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "config file not found"),
    })?;
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;
    let mut sources = FieldSources::new();
    deep_merge_tracking(&mut merged, &overlay, "", &ConfigLayer::User, &mut sources);
    let config: Config = merged
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::ParseError {
            path: path.display().to_string(),
            source: e,
        })?;
    validate::validate(&config)?;
    Ok(config)
}

/// Try to load a file, returning `None` if it doesn't exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };

    if content.len() as u64 > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit",
                content.len()
            ),
        });
    }

    let value: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(Some(value))
}

fn home_directory() -> ConfigResult<PathBuf> {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .ok_or(ConfigError::NoHomeDir)
}
