//! Flattening JSON trees into flat key/value pairs and back.

use crate::error::{CoreError, CoreResult};
use crate::path::{array_index, parse_key, push_field, push_index, KeySegment, LogicalPath};
use serde_json::{Map, Value};
use std::collections::btree_map::{self, BTreeMap};
use std::collections::HashSet;

/// A JSON subtree flattened into `flat key → leaf JSON` pairs.
///
/// Keys follow the encoding documented in [`crate::path`]. Leaves are stored as
/// the JSON text of the scalar so strings, numbers, booleans and null survive
/// the round trip. Empty objects and arrays emit no pairs.
///
/// # Example
///
/// ```rust
/// use arbordb_core::{FlatJsonObject, LogicalPath};
/// use serde_json::json;
///
/// let flat = FlatJsonObject::new(&json!({"tags": ["a", "b"]}), &LogicalPath::parse("post"));
/// assert_eq!(flat.get("/post/tags[1]"), Some("\"b\""));
/// assert_eq!(flat.unflatten().unwrap(), Some(json!({"post": {"tags": ["a", "b"]}})));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatJsonObject {
    entries: BTreeMap<String, String>,
}

impl FlatJsonObject {
    /// Flattens `value` rooted at `prefix`.
    #[must_use]
    pub fn new(value: &Value, prefix: &LogicalPath) -> Self {
        let mut entries = BTreeMap::new();
        let mut key = prefix.token_prefix();
        flatten_into(value, &mut key, &mut entries);
        Self { entries }
    }

    /// Wraps pairs read back from a store.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            entries: pairs.into_iter().collect(),
        }
    }

    /// Returns the number of pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no pairs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the leaf stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Returns true if `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Iterates pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Consumes the object, returning the pairs.
    #[must_use]
    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.entries
    }

    /// Rewrites canonical integer field tokens as array slots wherever the
    /// parent is listed in `array_levels`.
    ///
    /// `array_levels` holds the [`logical_key`](crate::path::logical_key) of
    /// every container already stored as an array, so a write through
    /// `list/1` lands on `/list[1]` next to its siblings.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CorruptEntry`] if a key cannot be decoded.
    pub fn align_slots(self, array_levels: &HashSet<String>) -> CoreResult<Self> {
        if array_levels.is_empty() {
            return Ok(self);
        }
        let mut entries = BTreeMap::new();
        for (key, leaf) in self.entries {
            let mut aligned = String::with_capacity(key.len());
            let mut logical = String::new();
            for segment in parse_key(&key)? {
                match &segment {
                    KeySegment::Field(name) => match array_index(name) {
                        Some(index) if array_levels.contains(&logical) => {
                            push_index(&mut aligned, index);
                        }
                        _ => push_field(&mut aligned, name),
                    },
                    KeySegment::Index(index) => push_index(&mut aligned, *index),
                }
                push_field(&mut logical, &segment.name());
            }
            entries.insert(aligned, leaf);
        }
        Ok(Self { entries })
    }

    /// Rebuilds the realm tree the pairs describe.
    ///
    /// Returns `None` when there are no pairs.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CorruptEntry`] if a key or leaf cannot be decoded.
    pub fn unflatten(&self) -> CoreResult<Option<Value>> {
        if self.entries.is_empty() {
            return Ok(None);
        }
        let mut root = Node::default();
        for (key, leaf) in &self.entries {
            let value: Value = serde_json::from_str(leaf)
                .map_err(|e| CoreError::corrupt_entry(key.as_str(), e.to_string()))?;
            root.insert(parse_key(key)?, value);
        }
        Ok(Some(root.into_value()))
    }
}

impl IntoIterator for FlatJsonObject {
    type Item = (String, String);
    type IntoIter = btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

fn flatten_into(value: &Value, key: &mut String, out: &mut BTreeMap<String, String>) {
    let mark = key.len();
    match value {
        Value::Object(map) => {
            for (name, child) in map {
                push_field(key, name);
                flatten_into(child, key, out);
                key.truncate(mark);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                push_index(key, index);
                flatten_into(child, key, out);
                key.truncate(mark);
            }
        }
        scalar => {
            out.insert(key.clone(), scalar.to_string());
        }
    }
}

#[derive(Default)]
struct Node {
    leaf: Option<Value>,
    children: BTreeMap<String, Child>,
}

struct Child {
    /// `Some` while every key reaching this child used an array slot.
    index: Option<usize>,
    node: Node,
}

impl Node {
    fn insert(&mut self, segments: Vec<KeySegment>, value: Value) {
        let mut node = self;
        for segment in segments {
            let (name, index) = match segment {
                KeySegment::Field(name) => (name, None),
                KeySegment::Index(index) => (index.to_string(), Some(index)),
            };
            let child = node.children.entry(name).or_insert_with(|| Child {
                index,
                node: Node::default(),
            });
            if index.is_none() {
                child.index = None;
            }
            node = &mut child.node;
        }
        node.leaf = Some(value);
    }

    fn into_value(self) -> Value {
        if self.children.is_empty() {
            return self.leaf.unwrap_or(Value::Null);
        }
        let indices: Option<Vec<usize>> = self.children.values().map(|c| c.index).collect();
        match indices.and_then(|indices| indices.into_iter().max()) {
            Some(max) => {
                let mut items = vec![Value::Null; max + 1];
                for child in self.children.into_values() {
                    if let Some(index) = child.index {
                        items[index] = child.node.into_value();
                    }
                }
                Value::Array(items)
            }
            None => Value::Object(
                self.children
                    .into_iter()
                    .map(|(name, child)| (name, child.node.into_value()))
                    .collect::<Map<_, _>>(),
            ),
        }
    }
}

/// Navigates `tree` to `path`. Numeric segments index arrays.
#[must_use]
pub fn select<'a>(tree: &'a Value, path: &LogicalPath) -> Option<&'a Value> {
    path.segments()
        .iter()
        .try_fold(tree, |node, segment| match node {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => array_index(segment).and_then(|i| items.get(i)),
            _ => None,
        })
}

/// Collapses the immediate children of `value`.
///
/// Object children that are containers become `true`, array elements that are
/// containers become `false`, and scalars are kept. A scalar is returned as is.
#[must_use]
pub fn shallow(value: &Value) -> Value {
    let is_container = |v: &Value| v.is_object() || v.is_array();
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(name, child)| {
                    let collapsed = if is_container(child) {
                        Value::Bool(true)
                    } else {
                        child.clone()
                    };
                    (name.clone(), collapsed)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|child| {
                    if is_container(child) {
                        Value::Bool(false)
                    } else {
                        child.clone()
                    }
                })
                .collect(),
        ),
        scalar => scalar.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn roundtrip(value: Value, at: &str) {
        let path = LogicalPath::parse(at);
        let tree = FlatJsonObject::new(&value, &path).unflatten().unwrap().unwrap();
        assert_eq!(select(&tree, &path), Some(&value));
    }

    #[test]
    fn flatten_nested_document() {
        let flat = FlatJsonObject::new(
            &json!({"name": "ada", "age": 36, "langs": ["en", {"x": null}]}),
            &LogicalPath::root(),
        );
        let pairs: Vec<_> = flat.iter().collect();
        assert_eq!(
            pairs,
            vec![
                ("/age", "36"),
                ("/langs[0]", "\"en\""),
                ("/langs[1]/x", "null"),
                ("/name", "\"ada\""),
            ]
        );
    }

    #[test]
    fn scalar_payload_lands_on_prefix() {
        let flat = FlatJsonObject::new(&json!(true), &LogicalPath::parse("a/b"));
        assert_eq!(flat.len(), 1);
        assert_eq!(flat.get("/a/b"), Some("true"));
    }

    #[test]
    fn empty_containers_emit_nothing() {
        let flat = FlatJsonObject::new(&json!({"a": {}, "b": []}), &LogicalPath::root());
        assert!(flat.is_empty());
        assert_eq!(flat.unflatten().unwrap(), None);
    }

    #[test]
    fn roundtrip_preserves_types() {
        roundtrip(json!({"s": "1", "n": 1, "f": 1.5, "b": false, "z": null}), "");
        roundtrip(json!([[1, 2], [3]]), "grid");
        roundtrip(json!("plain"), "deep/leaf");
        roundtrip(json!({"we/ird": {"~x": {"[0]": 1}}}), "odd");
    }

    #[test]
    fn sparse_array_fills_with_null() {
        let flat = FlatJsonObject::from_pairs([
            ("/a[0]".to_string(), "1".to_string()),
            ("/a[3]".to_string(), "4".to_string()),
        ]);
        assert_eq!(flat.unflatten().unwrap(), Some(json!({"a": [1, null, null, 4]})));
    }

    #[test]
    fn mixed_level_becomes_object() {
        let flat = FlatJsonObject::from_pairs([
            ("/a[0]".to_string(), "1".to_string()),
            ("/a/x".to_string(), "2".to_string()),
        ]);
        assert_eq!(flat.unflatten().unwrap(), Some(json!({"a": {"0": 1, "x": 2}})));
    }

    #[test]
    fn align_slots_follows_array_levels() {
        let levels: HashSet<String> = ["/list".to_string()].into();
        let flat = FlatJsonObject::new(&json!({"1": 99, "x": {"2": 7}}), &LogicalPath::parse("list"))
            .align_slots(&levels)
            .unwrap();
        let keys: Vec<_> = flat.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["/list/x/2", "/list[1]"]);

        let untouched = FlatJsonObject::new(&json!(1), &LogicalPath::parse("a/0"));
        assert_eq!(untouched.clone().align_slots(&HashSet::new()).unwrap(), untouched);
    }

    #[test]
    fn container_wins_over_leaf() {
        let flat = FlatJsonObject::from_pairs([
            ("/a".to_string(), "1".to_string()),
            ("/a/b".to_string(), "2".to_string()),
        ]);
        assert_eq!(flat.unflatten().unwrap(), Some(json!({"a": {"b": 2}})));
    }

    #[test]
    fn corrupt_leaf_is_reported() {
        let flat = FlatJsonObject::from_pairs([("/a".to_string(), "{nope".to_string())]);
        assert!(matches!(
            flat.unflatten(),
            Err(CoreError::CorruptEntry { .. })
        ));
    }

    #[test]
    fn select_through_arrays() {
        let tree = json!({"a": [{"b": 1}, {"b": 2}]});
        assert_eq!(select(&tree, &LogicalPath::parse("a/1/b")), Some(&json!(2)));
        assert_eq!(select(&tree, &LogicalPath::parse("a/01/b")), None);
        assert_eq!(select(&tree, &LogicalPath::parse("a/5")), None);
        assert_eq!(select(&tree, &LogicalPath::root()), Some(&tree));
    }

    #[test]
    fn shallow_collapses_children() {
        assert_eq!(
            shallow(&json!({"x": {"y": 1}, "z": 2})),
            json!({"x": true, "z": 2})
        );
        assert_eq!(shallow(&json!([1, [2], {"a": 3}])), json!([1, false, false]));
        assert_eq!(shallow(&json!("leaf")), json!("leaf"));
    }
}
