//! Configuration tree nodes
//!
//! Facts and desired configuration are both represented as a tree of
//! [`Node`] values. Maps keep insertion order so that commands generated
//! while walking a tree follow the order entries were parsed or supplied.
//!
//! Absent fields are omitted from maps; a `null` in user input never becomes
//! a node.

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use std::fmt;

/// Ordered map of child nodes
pub type NodeMap = IndexMap<String, Node>;

/// A single value in a configuration tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<Node>),
    Map(NodeMap),
}

/// A required value was not present when rendering a command.
///
/// Carries the dotted path that was looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingField(pub String);

impl fmt::Display for MissingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for Node {
    fn default() -> Self {
        Node::Map(NodeMap::new())
    }
}

impl Node {
    /// Create an empty map node
    pub fn map() -> Self {
        Node::Map(NodeMap::new())
    }

    /// Nest `leaf` under a chain of map keys.
    ///
    /// `Node::nest(&["a", "b"], x)` yields `{"a": {"b": x}}`.
    pub fn nest<S: AsRef<str>>(path: &[S], leaf: Node) -> Node {
        path.iter().rev().fold(leaf, |acc, key| {
            let mut map = NodeMap::new();
            map.insert(key.as_ref().to_string(), acc);
            Node::Map(map)
        })
    }

    pub fn as_map(&self) -> Option<&NodeMap> {
        match self {
            Node::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut NodeMap> {
        match self {
            Node::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Node]> {
        match self {
            Node::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Node::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Node::Int(i) => Some(*i),
            Node::Str(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Scalar rendered the way it appears on the device command line.
    pub fn scalar_string(&self) -> Option<String> {
        match self {
            Node::Str(s) => Some(s.clone()),
            Node::Int(i) => Some(i.to_string()),
            Node::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// True for empty maps and empty lists
    pub fn is_empty(&self) -> bool {
        match self {
            Node::Map(m) => m.is_empty(),
            Node::List(l) => l.is_empty(),
            _ => false,
        }
    }

    /// Look up a direct child of a map node
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.as_map().and_then(|m| m.get(key))
    }

    /// Look up a dotted path (`"process.area_id"`)
    pub fn get_path(&self, path: &str) -> Option<&Node> {
        if path.is_empty() {
            return Some(self);
        }
        path.split('.').try_fold(self, |node, key| node.get(key))
    }

    /// Mutable lookup of a dotted path
    pub fn get_path_mut(&mut self, path: &str) -> Option<&mut Node> {
        path.split('.')
            .try_fold(self, |node, key| node.as_map_mut()?.get_mut(key))
    }

    pub fn str_at(&self, path: &str) -> Option<&str> {
        self.get_path(path).and_then(Node::as_str)
    }

    pub fn int_at(&self, path: &str) -> Option<i64> {
        self.get_path(path).and_then(Node::as_int)
    }

    /// A flag is set when the path holds `true`
    pub fn flag(&self, path: &str) -> bool {
        self.get_path(path).and_then(Node::as_bool).unwrap_or(false)
    }

    /// Scalar at `path` formatted for the command line, or [`MissingField`].
    pub fn req(&self, path: &str) -> Result<String, MissingField> {
        self.get_path(path)
            .and_then(Node::scalar_string)
            .ok_or_else(|| MissingField(path.to_string()))
    }

    /// Optional scalar at `path` formatted for the command line
    pub fn opt(&self, path: &str) -> Option<String> {
        self.get_path(path).and_then(Node::scalar_string)
    }

    /// Insert a child into a map node. Non-map nodes are replaced by a map.
    pub fn insert(&mut self, key: impl Into<String>, value: Node) {
        if !matches!(self, Node::Map(_)) {
            *self = Node::map();
        }
        if let Node::Map(m) = self {
            m.insert(key.into(), value);
        }
    }

    /// Remove a direct child of a map node
    pub fn remove(&mut self, key: &str) -> Option<Node> {
        self.as_map_mut().and_then(|m| m.shift_remove(key))
    }

    /// Deep-merge `other` into `self`.
    ///
    /// Maps merge key by key, lists are extended with items not already
    /// present, anything else is replaced by `other`.
    pub fn merge(&mut self, other: Node) {
        match (self, other) {
            (Node::Map(base), Node::Map(over)) => {
                for (key, value) in over {
                    match base.get_mut(&key) {
                        Some(existing) => existing.merge(value),
                        None => {
                            base.insert(key, value);
                        }
                    }
                }
            }
            (Node::List(base), Node::List(over)) => {
                for item in over {
                    if !base.contains(&item) {
                        base.push(item);
                    }
                }
            }
            (slot, value) => *slot = value,
        }
    }

    /// Return `base` with `over` deep-merged onto it
    pub fn merged(base: &Node, over: &Node) -> Node {
        let mut out = base.clone();
        out.merge(over.clone());
        out
    }

    /// Recursively drop empty maps and lists
    pub fn prune(self) -> Node {
        match self {
            Node::Map(map) => Node::Map(
                map.into_iter()
                    .map(|(k, v)| (k, v.prune()))
                    .filter(|(_, v)| !v.is_empty())
                    .collect(),
            ),
            Node::List(list) => Node::List(
                list.into_iter()
                    .map(Node::prune)
                    .filter(|v| !v.is_empty())
                    .collect(),
            ),
            other => other,
        }
    }

    /// Force the value at `path` to a string scalar, if present
    pub fn coerce_str(&mut self, path: &str) {
        if let Some(slot) = self.get_path_mut(path) {
            if let Some(s) = slot.scalar_string() {
                *slot = Node::Str(s);
            }
        }
    }

    /// Force the value at `path` to an integer scalar, if it parses as one
    pub fn coerce_int(&mut self, path: &str) {
        if let Some(slot) = self.get_path_mut(path) {
            if let Some(i) = slot.as_int() {
                *slot = Node::Int(i);
            }
        }
    }

    /// Convert user input into a node, dropping nulls.
    ///
    /// Returns `None` for `null` itself. Non-integral numbers are kept as
    /// strings since device values are either integers or tokens.
    pub fn from_json(value: &serde_json::Value) -> Option<Node> {
        use serde_json::Value;
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(Node::Bool(*b)),
            Value::Number(n) => Some(match n.as_i64() {
                Some(i) => Node::Int(i),
                None => Node::Str(n.to_string()),
            }),
            Value::String(s) => Some(Node::Str(s.clone())),
            Value::Array(items) => Some(Node::List(items.iter().filter_map(Node::from_json).collect())),
            Value::Object(obj) => Some(Node::Map(
                obj.iter()
                    .filter_map(|(k, v)| Node::from_json(v).map(|n| (k.clone(), n)))
                    .collect(),
            )),
        }
    }

    /// Convert into a JSON value for module output
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            Node::Bool(b) => Value::Bool(*b),
            Node::Int(i) => Value::from(*i),
            Node::Str(s) => Value::String(s.clone()),
            Node::List(l) => Value::Array(l.iter().map(Node::to_json).collect()),
            Node::Map(m) => Value::Object(
                m.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Node::Bool(b) => serializer.serialize_bool(*b),
            Node::Int(i) => serializer.serialize_i64(*i),
            Node::Str(s) => serializer.serialize_str(s),
            Node::List(l) => l.serialize(serializer),
            Node::Map(m) => m.serialize(serializer),
        }
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Node::Str(s.to_string())
    }
}

impl From<String> for Node {
    fn from(s: String) -> Self {
        Node::Str(s)
    }
}

impl From<i64> for Node {
    fn from(i: i64) -> Self {
        Node::Int(i)
    }
}

impl From<bool> for Node {
    fn from(b: bool) -> Self {
        Node::Bool(b)
    }
}

impl From<NodeMap> for Node {
    fn from(m: NodeMap) -> Self {
        Node::Map(m)
    }
}

/// Values that may or may not produce a node when placed into an [`Obj`]
pub trait IntoSlot {
    fn into_slot(self) -> Option<Node>;
}

impl IntoSlot for Node {
    fn into_slot(self) -> Option<Node> {
        Some(self)
    }
}

impl IntoSlot for Option<Node> {
    fn into_slot(self) -> Option<Node> {
        self
    }
}

impl IntoSlot for &str {
    fn into_slot(self) -> Option<Node> {
        Some(Node::from(self))
    }
}

impl IntoSlot for Option<&str> {
    fn into_slot(self) -> Option<Node> {
        self.map(Node::from)
    }
}

impl IntoSlot for String {
    fn into_slot(self) -> Option<Node> {
        Some(Node::Str(self))
    }
}

impl IntoSlot for Option<String> {
    fn into_slot(self) -> Option<Node> {
        self.map(Node::Str)
    }
}

impl IntoSlot for i64 {
    fn into_slot(self) -> Option<Node> {
        Some(Node::Int(self))
    }
}

impl IntoSlot for Option<i64> {
    fn into_slot(self) -> Option<Node> {
        self.map(Node::Int)
    }
}

impl IntoSlot for bool {
    fn into_slot(self) -> Option<Node> {
        Some(Node::Bool(self))
    }
}

impl IntoSlot for Obj {
    fn into_slot(self) -> Option<Node> {
        Some(self.build())
    }
}

/// Builder for map nodes that skips absent values
///
/// ```rust,ignore
/// let fragment = Obj::new()
///     .with("name", m.get("name"))
///     .flag("shutdown", m.matched("shutdown"))
///     .build();
/// ```
#[derive(Debug, Default, Clone)]
pub struct Obj(NodeMap);

impl Obj {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `value` under `key` unless it is absent
    pub fn with(mut self, key: &str, value: impl IntoSlot) -> Self {
        if let Some(node) = value.into_slot() {
            self.0.insert(key.to_string(), node);
        }
        self
    }

    /// Insert `true` under `key` only when `present` holds
    pub fn flag(mut self, key: &str, present: bool) -> Self {
        if present {
            self.0.insert(key.to_string(), Node::Bool(true));
        }
        self
    }

    pub fn build(self) -> Node {
        Node::Map(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(v: serde_json::Value) -> Node {
        Node::from_json(&v).unwrap()
    }

    #[test]
    fn test_nest_builds_chain() {
        let n = Node::nest(&["a", "b"], Node::from("x"));
        assert_eq!(n.str_at("a.b"), Some("x"));
    }

    #[test]
    fn test_merge_maps_recursively() {
        let mut base = node(json!({"a": {"x": 1, "y": 2}, "b": "keep"}));
        base.merge(node(json!({"a": {"y": 3, "z": 4}})));
        assert_eq!(base, node(json!({"a": {"x": 1, "y": 3, "z": 4}, "b": "keep"})));
    }

    #[test]
    fn test_merge_lists_append_without_duplicates() {
        let mut base = node(json!({"l": ["a", "b"]}));
        base.merge(node(json!({"l": ["b", "c"]})));
        assert_eq!(base, node(json!({"l": ["a", "b", "c"]})));
    }

    #[test]
    fn test_from_json_drops_nulls() {
        let n = node(json!({"a": null, "b": 1, "c": [null, 2]}));
        assert!(n.get("a").is_none());
        assert_eq!(n.int_at("b"), Some(1));
        assert_eq!(n.get("c"), Some(&Node::List(vec![Node::Int(2)])));
    }

    #[test]
    fn test_prune_removes_empties() {
        let n = node(json!({"a": {}, "b": {"c": []}, "d": 1})).prune();
        assert_eq!(n, node(json!({"d": 1})));
    }

    #[test]
    fn test_req_reports_missing_path() {
        let n = node(json!({"process": {"id": 10}}));
        assert_eq!(n.req("process.id").unwrap(), "10");
        assert_eq!(n.req("process.area_id"), Err(MissingField("process.area_id".into())));
    }

    #[test]
    fn test_coerce() {
        let mut n = node(json!({"speed": 100, "mtu": "1500"}));
        n.coerce_str("speed");
        n.coerce_int("mtu");
        assert_eq!(n.get("speed"), Some(&Node::from("100")));
        assert_eq!(n.get("mtu"), Some(&Node::Int(1500)));
    }

    #[test]
    fn test_obj_skips_absent() {
        let n = Obj::new()
            .with("a", Some("x"))
            .with("b", None::<&str>)
            .flag("c", false)
            .flag("d", true)
            .build();
        assert_eq!(n, node(json!({"a": "x", "d": true})));
    }

    #[test]
    fn test_to_json_roundtrip() {
        let v = json!({"a": [1, "b", true], "c": {"d": "e"}});
        assert_eq!(node(v.clone()).to_json(), v);
    }
}
