// SPDX-License-Identifier: GPL-3.0-only

//! Hardcoded jail defaults and the user defaults layered over them

use std::collections::BTreeSet;
use std::sync::LazyLock;

use crate::error::{ConfigError, Result};
use crate::store::ValueStore;
use jail_types::Value;

// Load the defaults table at compile time
const DEFAULTS_JSON: &str = include_str!("../resources/defaults.json");

static HARDCODED: LazyLock<ValueStore> = LazyLock::new(|| parse_table(DEFAULTS_JSON).unwrap_or_default());

fn parse_table(json: &str) -> Result<ValueStore> {
    let value: serde_json::Value = serde_json::from_str(json).map_err(|e| ConfigError::Parse {
        format: "json",
        reason: e.to_string(),
    })?;

    match Value::from(value) {
        Value::Map(map) => Ok(ValueStore::from_nested(&map)),
        other => Err(ConfigError::Parse {
            format: "json",
            reason: format!("defaults must be a mapping, found {}", other.type_name()),
        }),
    }
}

/// The process-wide hardcoded defaults
pub fn hardcoded() -> &'static ValueStore {
    &HARDCODED
}

/// Raw hardcoded default of a key, including nested mappings
pub fn hardcoded_value(key: &str) -> Option<Value> {
    HARDCODED.get(key).ok()
}

/// User provided defaults over the hardcoded table
///
/// Values are kept raw; interpretation happens in the jail configuration
/// falling back to them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefaultsConfig {
    user: ValueStore,
}

impl DefaultsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_user_data(user: ValueStore) -> Self {
        Self { user }
    }

    /// User value if present, else the hardcoded default
    pub fn effective(&self, key: &str) -> Option<Value> {
        self.user.get(key).ok().or_else(|| hardcoded_value(key))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.user.contains(key) || HARDCODED.contains(key)
    }

    /// Union of user and hardcoded keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: BTreeSet<String> = HARDCODED.keys().into_iter().collect();
        keys.extend(self.user.keys());
        keys.into_iter().collect()
    }

    pub fn user_keys(&self) -> Vec<String> {
        self.user.keys()
    }

    /// Only the values the user provided
    pub fn exclusive_user_data(&self) -> &ValueStore {
        &self.user
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.user.set(key, value.into());
    }

    /// Remove a user provided default, revealing the hardcoded one
    pub fn delete(&mut self, key: &str) -> Result<()> {
        self.user.delete(key)
    }
}
