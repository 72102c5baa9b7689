//! CLI handlers for the `l9 config` subcommand.

use std::path::Path;

use anyhow::{Context, Result};
use l9_config::loader::config_paths;
use l9_config::{ConfigLayer, ResolvedConfig, env};

use crate::theme::Theme;

/// Show the resolved configuration, then every field not left at its default.
pub(crate) fn show_config(resolved: &ResolvedConfig, format: &str) -> Result<i32> {
    let output = match format {
        "json" => serde_json::to_string_pretty(&resolved.config)
            .context("failed to format config as JSON")?,
        "toml" => {
            toml::to_string_pretty(&resolved.config).context("failed to format config as TOML")?
        },
        other => anyhow::bail!("unknown format '{other}' (expected toml or json)"),
    };
    println!("{output}");

    let overridden: Vec<_> = resolved
        .field_sources
        .iter()
        .filter(|(_, layer)| **layer != ConfigLayer::Defaults)
        .collect();
    if !overridden.is_empty() {
        println!("{}", Theme::header("# Sources"));
        for (field, layer) in overridden {
            println!("# {field} <- {layer}");
        }
    }
    Ok(0)
}

/// Show every config file consulted and the environment overrides.
pub(crate) fn show_paths(workspace: &Path) -> Result<i32> {
    let vars = env::collect_env_vars();
    let paths = config_paths(Some(workspace), &vars)?;

    println!("Configuration files checked (lowest to highest precedence):\n");
    println!("  1. <embedded defaults>");
    let files = std::iter::once(paths.user).chain(paths.workspace);
    for (i, path) in files.enumerate() {
        let status = if path.exists() { "found" } else { "not found" };
        println!("  {}. {}  [{status}]", i.saturating_add(2), path.display());
    }

    println!("\nEnvironment variable overrides (applied last):");
    for (name, field) in env::env_overrides() {
        let marker = if vars.contains_key(name) { "set" } else { "unset" };
        println!("  {name:<20} -> {field:<24} [{marker}]");
    }
    println!("  {:<20} -> user config directory", "L9_HOME");
    Ok(0)
}
