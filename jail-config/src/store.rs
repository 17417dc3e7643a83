// SPDX-License-Identifier: GPL-3.0-only

//! Flat key/value storage addressed by dot paths
//!
//! Values are kept as leaves under their full path (`provision.method`).
//! Reading a path that only exists as a prefix assembles a mapping, writing a
//! non-empty mapping flattens it. No type coercion happens here.

use std::collections::BTreeMap;

use crate::error::{ConfigError, Result};
use jail_types::Value;

pub const DELIMITER: char = '.';

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueStore {
    entries: BTreeMap<String, Value>,
}

fn child_prefix(key: &str) -> String {
    format!("{key}{DELIMITER}")
}

impl ValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `key` is stored as a leaf or as a prefix of leaves
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key) || self.has_children(key)
    }

    fn has_children(&self, key: &str) -> bool {
        let prefix = child_prefix(key);
        self.entries
            .range(prefix.clone()..)
            .next()
            .is_some_and(|(k, _)| k.starts_with(&prefix))
    }

    /// Leaf value stored exactly under `key`
    pub fn leaf(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn get(&self, key: &str) -> Result<Value> {
        if let Some(value) = self.entries.get(key) {
            return Ok(value.clone());
        }

        let prefix = child_prefix(key);
        let mut nested = BTreeMap::new();
        for (full_key, value) in self.entries.range(prefix.clone()..) {
            let Some(rest) = full_key.strip_prefix(&prefix) else {
                break;
            };
            insert_nested(&mut nested, rest, value.clone());
        }

        if nested.is_empty() {
            return Err(ConfigError::NotFound(key.to_string()));
        }
        Ok(Value::Map(nested))
    }

    /// Store a value, replacing whatever was stored at or below `key`
    pub fn set(&mut self, key: &str, value: Value) {
        self.remove_subtree(key);

        // a leaf on the way down would shadow the new nested key
        let mut end = 0;
        while let Some(offset) = key[end..].find(DELIMITER) {
            end += offset;
            self.entries.remove(&key[..end]);
            end += 1;
        }

        match value {
            Value::Map(map) if !map.is_empty() => {
                for (sub_key, sub_value) in map {
                    self.set(&format!("{key}{DELIMITER}{sub_key}"), sub_value);
                }
            }
            other => {
                self.entries.insert(key.to_string(), other);
            }
        }
    }

    pub fn delete(&mut self, key: &str) -> Result<()> {
        if self.remove_subtree(key) == 0 {
            return Err(ConfigError::NotFound(key.to_string()));
        }
        Ok(())
    }

    fn remove_subtree(&mut self, key: &str) -> usize {
        let before = self.entries.len();
        let prefix = child_prefix(key);
        self.entries.remove(key);
        self.entries.retain(|k, _| !k.starts_with(&prefix));
        before - self.entries.len()
    }

    /// All leaf keys, sorted
    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    /// Nested tree representation used by structured formats
    pub fn to_nested(&self) -> BTreeMap<String, Value> {
        let mut nested = BTreeMap::new();
        for (key, value) in &self.entries {
            insert_nested(&mut nested, key, value.clone());
        }
        nested
    }

    pub fn from_nested(tree: &BTreeMap<String, Value>) -> Self {
        let mut store = Self::new();
        for (key, value) in tree {
            store.set(key, value.clone());
        }
        store
    }
}

fn insert_nested(tree: &mut BTreeMap<String, Value>, path: &str, value: Value) {
    match path.split_once(DELIMITER) {
        None => {
            tree.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let node = tree
                .entry(head.to_string())
                .or_insert_with(|| Value::Map(BTreeMap::new()));
            if !matches!(node, Value::Map(_)) {
                *node = Value::Map(BTreeMap::new());
            }
            if let Value::Map(children) = node {
                insert_nested(children, rest, value);
            }
        }
    }
}

impl FromIterator<(String, Value)> for ValueStore {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut store = Self::new();
        for (key, value) in iter {
            store.set(&key, value);
        }
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ValueStore {
        let mut store = ValueStore::new();
        store.set("id", Value::from("web"));
        store.set("boot", Value::Bool(true));
        store.set("priority", Value::Int(4));
        store.set("tags", Value::from(vec!["a", "b"]));
        store.set("provision.method", Value::Null);
        store.set("provision.source", Value::from("git://example"));
        store.set("user.empty", Value::Map(BTreeMap::new()));
        store
    }

    #[test]
    fn nested_round_trip_is_lossless() {
        let store = sample();
        let nested = store.to_nested();
        assert!(nested["provision"].as_map().is_some());
        assert_eq!(ValueStore::from_nested(&nested), store);
    }

    #[test]
    fn prefix_reads_assemble_a_mapping() {
        let store = sample();
        let provision = store.get("provision").unwrap();
        let map = provision.as_map().unwrap();
        assert_eq!(map.len(), 2);
        assert!(map["method"].is_null());
        assert!(store.contains("provision"));
        assert!(!store.contains("prov"));
    }

    #[test]
    fn set_replaces_subtree_and_shadowing_leaf() {
        let mut store = sample();
        store.set("provision", Value::from("none"));
        assert_eq!(store.keys().iter().filter(|k| k.starts_with("provision")).count(), 1);

        store.set("provision.rev", Value::from("main"));
        assert!(store.leaf("provision").is_none());
        assert_eq!(store.get("provision.rev").unwrap(), Value::from("main"));
    }

    #[test]
    fn delete_leaves_no_trace() {
        let mut store = sample();
        store.delete("provision").unwrap();
        assert!(!store.contains("provision"));
        assert!(!store.contains("provision.method"));
        assert!(matches!(store.delete("provision"), Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn missing_key_is_not_found() {
        assert!(matches!(
            ValueStore::new().get("release"),
            Err(ConfigError::NotFound(key)) if key == "release"
        ));
    }
}
