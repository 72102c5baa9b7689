//! Deep merge of TOML values with per-field source tracking.
//!
//! The merge works on raw [`toml::Value`] trees rather than deserialized
//! structs, so a key absent from an overlay never resets the base value.

use std::collections::BTreeMap;
use std::fmt;

/// Which configuration layer a value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLayer {
    /// Compiled-in defaults (`defaults.toml`).
    Defaults,
    /// User-level configuration (`~/.l9/config.toml`).
    User,
    /// Workspace-level configuration (`{workspace}/.l9/config.toml`).
    Workspace,
    /// Environment variable override.
    Environment(String),
}

impl fmt::Display for ConfigLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Defaults => write!(f, "defaults"),
            Self::User => write!(f, "user (~/.l9/config.toml)"),
            Self::Workspace => write!(f, "workspace (.l9/config.toml)"),
            Self::Environment(var) => write!(f, "environment ({var})"),
        }
    }
}

/// Tracks which layer set each leaf field, keyed by dotted path.
pub type FieldSources = BTreeMap<String, ConfigLayer>;

/// Deep-merge `overlay` into `base`, recording which layer set each leaf.
///
/// Tables merge recursively; scalars and arrays from the overlay replace
/// the base value.
pub fn deep_merge_tracking(
    base: &mut toml::Value,
    overlay: &toml::Value,
    prefix: &str,
    layer: &ConfigLayer,
    sources: &mut FieldSources,
) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let path = join_path(prefix, key);
                if let Some(base_val) = base_table.get_mut(key) {
                    if overlay_val.is_table() {
                        deep_merge_tracking(base_val, overlay_val, &path, layer, sources);
                    } else {
                        *base_val = overlay_val.clone();
                        sources.insert(path, layer.clone());
                    }
                } else {
                    base_table.insert(key.clone(), overlay_val.clone());
                    record_leaves(overlay_val, &path, layer, sources);
                }
            }
        },
        (base, overlay) => {
            *base = overlay.clone();
            sources.insert(prefix.to_owned(), layer.clone());
        },
    }
}

/// Record every leaf under `val` as coming from `layer`.
pub fn record_leaves(
    val: &toml::Value,
    prefix: &str,
    layer: &ConfigLayer,
    sources: &mut FieldSources,
) {
    match val {
        toml::Value::Table(table) if !table.is_empty() => {
            for (key, child) in table {
                record_leaves(child, &join_path(prefix, key), layer, sources);
            }
        },
        toml::Value::Table(_) => {},
        _ => {
            sources.insert(prefix.to_owned(), layer.clone());
        },
    }
}

/// Set `new_val` at a dotted path, creating intermediate tables as needed.
///
/// Returns `false` if an intermediate segment exists but is not a table.
pub fn set_nested(root: &mut toml::Value, path: &[&str], new_val: toml::Value) -> bool {
    let Some((leaf, parents)) = path.split_last() else {
        return false;
    };

    let mut current = root;
    for segment in parents {
        let Some(table) = current.as_table_mut() else {
            return false;
        };
        current = table
            .entry((*segment).to_owned())
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }

    match current.as_table_mut() {
        Some(table) => {
            table.insert((*leaf).to_owned(), new_val);
            true
        },
        None => false,
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_owned()
    } else {
        format!("{prefix}.{key}")
    }
}
