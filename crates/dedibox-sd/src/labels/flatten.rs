//! Depth-bounded flattening of a JSON tree into `prefix_key_0`-style labels.

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;

/// Flatten `value` into `out`, one entry per scalar leaf.
///
/// Object keys and array indices are joined onto `prefix` with `_`. A leaf is
/// emitted only if it sits at most `max_depth` segments below the prefix;
/// nulls are skipped. Object members are visited in sorted key order, so when
/// two paths collapse to the same name the later one wins deterministically.
pub fn flatten_into(
    value: &JsonValue,
    prefix: &str,
    max_depth: usize,
    out: &mut BTreeMap<String, String>,
) {
    walk(value, prefix.to_string(), 0, max_depth, out);
}

fn walk(
    value: &JsonValue,
    key: String,
    depth: usize,
    max_depth: usize,
    out: &mut BTreeMap<String, String>,
) {
    match value {
        JsonValue::Null => {}
        JsonValue::Bool(b) => emit(key, b.to_string(), out),
        JsonValue::Number(n) => emit(key, n.to_string(), out),
        JsonValue::String(s) => emit(key, s.clone(), out),
        JsonValue::Array(items) => {
            if depth >= max_depth {
                return;
            }
            for (i, item) in items.iter().enumerate() {
                walk(item, join(&key, &i.to_string()), depth + 1, max_depth, out);
            }
        }
        JsonValue::Object(map) => {
            if depth >= max_depth {
                return;
            }
            for (k, v) in map {
                walk(v, join(&key, k), depth + 1, max_depth, out);
            }
        }
    }
}

fn emit(key: String, value: String, out: &mut BTreeMap<String, String>) {
    // empty prefix + scalar root
    if key.is_empty() {
        return;
    }
    out.insert(key, value);
}

fn join(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}_{segment}")
    }
}
