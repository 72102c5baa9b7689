//! Dotted-path lookup and deep merge over YAML mappings.

use serde_yaml::{Mapping, Value};

/// Walk `root` along a `.`-separated path.
///
/// Returns `None` if any segment is missing or an intermediate value is not
/// a mapping.
#[must_use]
pub fn lookup<'a>(root: &'a Mapping, dotted: &str) -> Option<&'a Value> {
    let mut segments = dotted.split('.');
    let first = segments.next()?;
    let mut current = root.get(first)?;
    for segment in segments {
        current = current.as_mapping()?.get(segment)?;
    }
    Some(current)
}

/// Merge `overlay` into `base`. Mappings merge recursively; any other value
/// in the overlay replaces the base value.
pub fn deep_merge(base: &mut Mapping, overlay: &Mapping) {
    for (key, overlay_val) in overlay {
        if let (Some(Value::Mapping(base_map)), Value::Mapping(overlay_map)) =
            (base.get_mut(key), overlay_val)
        {
            deep_merge(base_map, overlay_map);
            continue;
        }
        base.insert(key.clone(), overlay_val.clone());
    }
}
