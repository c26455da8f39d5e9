//! Property-based test generators using proptest.
//!
//! JSON strategies never produce empty objects or arrays: an empty container
//! has no flat pairs and cannot survive a flatten/unflatten round trip.

use arbordb_core::LogicalPath;
use proptest::prelude::*;
use serde_json::{Map, Value};

/// Strategy for object field names, including the characters the flat key
/// encoding escapes.
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9_~/\\[\\]. -]{1,8}")
        .expect("Invalid regex")
        .prop_filter("server value key", |name| name != ".sv")
}

/// Strategy for path segments as clients send them.
pub fn segment_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9_-]{1,8}").expect("Invalid regex")
}

/// Strategy for logical paths up to four segments deep, root included.
pub fn path_strategy() -> impl Strategy<Value = LogicalPath> {
    prop::collection::vec(segment_strategy(), 0..4).prop_map(LogicalPath::from_segments)
}

/// Strategy for JSON scalars.
///
/// Floats are binary fractions so their JSON text parses back exactly.
pub fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        (-4096i32..4096).prop_map(|n| Value::from(f64::from(n) / 8.0)),
        prop::string::string_regex("[ -~]{0,12}")
            .expect("Invalid regex")
            .prop_map(Value::String),
    ]
}

/// Strategy for JSON documents without empty containers.
pub fn json_value_strategy() -> impl Strategy<Value = Value> {
    scalar_strategy().prop_recursive(4, 64, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..6).prop_map(Value::Array),
            prop::collection::btree_map(field_name_strategy(), inner, 1..6)
                .prop_map(|fields| Value::Object(fields.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

/// Strategy for JSON objects without empty containers.
pub fn json_object_strategy() -> impl Strategy<Value = Value> {
    prop::collection::btree_map(field_name_strategy(), json_value_strategy(), 1..6)
        .prop_map(|fields| Value::Object(fields.into_iter().collect()))
}

/// Paths of every node in `value`, root first.
pub fn node_paths(value: &Value) -> Vec<LogicalPath> {
    fn walk(value: &Value, at: &mut Vec<String>, out: &mut Vec<LogicalPath>) {
        out.push(LogicalPath::from_segments(at.iter().cloned()));
        match value {
            Value::Object(map) => {
                for (name, child) in map {
                    at.push(name.clone());
                    walk(child, at, out);
                    at.pop();
                }
            }
            Value::Array(items) => {
                for (index, child) in items.iter().enumerate() {
                    at.push(index.to_string());
                    walk(child, at, out);
                    at.pop();
                }
            }
            _ => {}
        }
    }

    let mut out = Vec::new();
    walk(value, &mut Vec::new(), &mut out);
    out
}

/// Strategy for a clock that mostly stalls or steps backwards, in
/// milliseconds.
pub fn clock_strategy(len: usize) -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(
        prop_oneof![
            3 => Just(1_700_000_000_000u64),
            1 => 1_699_999_999_000u64..1_700_000_001_000,
        ],
        1..len,
    )
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

/// Returns true if `value` contains an empty object or array anywhere.
pub fn has_empty_container(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.is_empty() || items.iter().any(has_empty_container),
        Value::Object(map) => map.is_empty() || map.values().any(has_empty_container),
        _ => false,
    }
}
