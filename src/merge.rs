//! Deep merge for structured fragments
//!
//! Merge rule: later fragment wins, sequences replace wholesale, mappings
//! merge recursively. Everything downstream depends on this behaving
//! exactly that way.

use serde_yaml_ng::{Mapping, Value};

/// Merge `overlay` into `base` and return the combined value.
///
/// When both sides are mappings their keys merge recursively; any other
/// pairing (sequence/sequence included) resolves to `overlay`.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(mut base_map), Value::Mapping(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                // Insert-on-existing keeps the base key's position, so
                // output ordering stays stable across runs.
                let merged = match base_map.get(&key) {
                    Some(base_value) => deep_merge(base_value.clone(), overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Mapping(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Fold an ordered sequence of fragments into one document, starting from
/// an empty mapping.
pub fn merge_all<I: IntoIterator<Item = Value>>(fragments: I) -> Value {
    fragments
        .into_iter()
        .fold(Value::Mapping(Mapping::new()), deep_merge)
}
