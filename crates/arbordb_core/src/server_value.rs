//! Server values: placeholders resolved when a write is applied.
//!
//! A server value is an object with exactly one property, `.sv`, naming the
//! value to compute, e.g. `{".sv": "timestamp"}`.

use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

/// Property name marking a server value.
pub const SERVER_VALUE_KEY: &str = ".sv";

/// Resolves a server value by name. Unknown names resolve to null.
#[must_use]
pub fn resolve(name: &str) -> Value {
    match name {
        "timestamp" => Value::from(unix_seconds()),
        _ => Value::Null,
    }
}

/// Returns the resolved value if `payload` is a server value placeholder.
#[must_use]
pub fn as_server_value(payload: &Value) -> Option<Value> {
    let map = payload.as_object()?;
    if map.len() != 1 {
        return None;
    }
    let name = map.get(SERVER_VALUE_KEY)?;
    Some(name.as_str().map_or(Value::Null, resolve))
}

/// Replaces every placeholder nested inside `payload`.
#[must_use]
pub fn resolve_nested(payload: Value) -> Value {
    if let Some(resolved) = as_server_value(&payload) {
        return resolved;
    }
    match payload {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(name, child)| (name, resolve_nested(child)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(resolve_nested).collect()),
        scalar => scalar,
    }
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn timestamp_is_current_seconds() {
        let before = unix_seconds();
        let value = resolve("timestamp").as_u64().unwrap();
        assert!(value >= before && value <= before + 5);
    }

    #[test]
    fn unknown_names_resolve_to_null() {
        assert_eq!(resolve("increment"), Value::Null);
        assert_eq!(as_server_value(&json!({".sv": 5})), Some(Value::Null));
    }

    #[test]
    fn only_exact_placeholders_match() {
        assert!(as_server_value(&json!({".sv": "timestamp"})).is_some());
        assert!(as_server_value(&json!({".sv": "timestamp", "x": 1})).is_none());
        assert!(as_server_value(&json!({"sv": "timestamp"})).is_none());
        assert!(as_server_value(&json!("timestamp")).is_none());
    }

    #[test]
    fn nested_placeholders_resolve_in_place() {
        let resolved = resolve_nested(json!({
            "msg": "hi",
            "meta": {"at": {".sv": "timestamp"}, "who": {".sv": "nobody"}},
            "list": [{".sv": "nobody"}]
        }));
        assert!(resolved["meta"]["at"].is_u64());
        assert_eq!(resolved["meta"]["who"], Value::Null);
        assert_eq!(resolved["list"], json!([null]));
        assert_eq!(resolved["msg"], "hi");
    }
}
