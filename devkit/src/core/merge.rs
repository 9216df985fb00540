//! List deduplication and JSON deep merge used by the resolver and the
//! manifest writer.

use serde_json::Value;

/// Remove duplicates, keeping the first occurrence of each item.
pub fn unique<T: PartialEq + Clone>(items: &[T]) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
    out
}

/// Merge `patch` into `base`.
///
/// Objects are merged key by key, recursively. Everything else (scalars,
/// arrays, null) in `patch` replaces the value in `base`.
pub fn deep_merge(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (key, patch_value) in patch_map {
                match base_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, patch_value),
                    None => {
                        base_map.insert(key.clone(), patch_value.clone());
                    }
                }
            }
        }
        (base, patch) => *base = patch.clone(),
    }
}

/// JSON type name for error messages.
pub fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Fold `patches` into one value, later patches winning.
pub fn merge_all<'a>(patches: impl IntoIterator<Item = &'a Value>) -> Value {
    let mut merged = Value::Object(serde_json::Map::new());
    for patch in patches {
        deep_merge(&mut merged, patch);
    }
    merged
}
