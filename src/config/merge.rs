//! Field-by-field merging of configuration tiers.
//!
//! Higher tiers override lower ones key by key. Lists and scalars are
//! replaced wholesale; a `null` in a higher tier leaves the lower value alone.

use serde_json::Value;

/// Merge `overlay` onto `base`.
///
/// ```
/// use serde_json::json;
/// use due_date_hook::config::deep_merge;
///
/// let defaults = json!({"rules": {"cascade_shift_days": 2, "stage_field": "stage"}});
/// let project = json!({"rules": {"cascade_shift_days": 3}});
/// let merged = deep_merge(defaults, project);
/// assert_eq!(merged, json!({"rules": {"cascade_shift_days": 3, "stage_field": "stage"}}));
/// ```
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut merged), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                let value = match merged.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                merged.insert(key, value);
            }
            Value::Object(merged)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

/// Merge tiers in order, lowest priority first.
pub fn deep_merge_all(values: impl IntoIterator<Item = Value>) -> Value {
    values.into_iter().fold(Value::Null, deep_merge)
}
