// SPDX-License-Identifier: GPL-3.0-only

//! Jail network interfaces and the host bridges they attach to

use std::any::Any;
use std::collections::BTreeMap;

use super::special::{NamedProperty, SpecialProperty};
use crate::error::{ConfigError, Result};
use crate::helpers::{StringStyle, parse_none, to_string};
use jail_types::Value;

/// Ordered `<jail_if>:<bridge_if>` pairs; a missing bridge is stored as `-`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Interfaces {
    pairs: Vec<(String, Option<String>)>,
}

fn bridge_name(value: &Value) -> Option<String> {
    if parse_none(value) {
        None
    } else {
        Some(to_string(value, StringStyle::DISPLAY))
    }
}

impl Interfaces {
    /// Attach `nic` to `bridge`, replacing an earlier entry for the same nic
    pub fn add(&mut self, nic: impl Into<String>, bridge: Option<&str>) {
        let nic = nic.into();
        let bridge = bridge.and_then(|b| bridge_name(&Value::from(b)));
        match self.pairs.iter_mut().find(|(name, _)| *name == nic) {
            Some(entry) => entry.1 = bridge,
            None => self.pairs.push((nic, bridge)),
        }
    }

    pub fn remove(&mut self, nic: &str) -> bool {
        let before = self.pairs.len();
        self.pairs.retain(|(name, _)| name != nic);
        self.pairs.len() != before
    }

    pub fn contains(&self, nic: &str) -> bool {
        self.pairs.iter().any(|(name, _)| name == nic)
    }

    /// Bridge of `nic`; `Some(None)` for an unbridged interface
    pub fn bridge(&self, nic: &str) -> Option<Option<&str>> {
        self.pairs
            .iter()
            .find(|(name, _)| name == nic)
            .map(|(_, bridge)| bridge.as_deref())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    fn add_pair(&mut self, pair: &str) -> Result<()> {
        let (nic, bridge) = pair.split_once(':').ok_or_else(|| {
            ConfigError::invalid(
                Self::NAME,
                format!("invalid NIC pair {pair:?} (should be <nic>:<bridge>)"),
            )
        })?;
        if nic.is_empty() {
            return Err(ConfigError::invalid(Self::NAME, format!("missing NIC in {pair:?}")));
        }
        self.add(nic, Some(bridge));
        Ok(())
    }
}

impl NamedProperty for Interfaces {
    const NAME: &'static str = "interfaces";
}

impl SpecialProperty for Interfaces {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn set(&mut self, raw: &Value) -> Result<()> {
        let mut parsed = Interfaces::default();

        match raw {
            value if parse_none(value) => {}
            Value::Map(map) => {
                for (nic, bridge) in map {
                    parsed.add(nic.as_str(), bridge_name(bridge).as_deref());
                }
            }
            Value::String(s) => {
                for pair in s.split([',', ' ']).filter(|pair| !pair.is_empty()) {
                    parsed.add_pair(pair)?;
                }
            }
            Value::List(items) => {
                for pair in items {
                    parsed.add_pair(pair)?;
                }
            }
            other => {
                return Err(ConfigError::invalid(
                    Self::NAME,
                    format!("expected NIC pairs, found {}", other.type_name()),
                ));
            }
        }

        *self = parsed;
        Ok(())
    }

    fn serialize(&self) -> Value {
        if self.pairs.is_empty() {
            return Value::Null;
        }
        let pairs: Vec<String> = self
            .pairs
            .iter()
            .map(|(nic, bridge)| format!("{}:{}", nic, bridge.as_deref().unwrap_or("-")))
            .collect();
        Value::String(pairs.join(","))
    }

    fn value(&self) -> Value {
        let map: BTreeMap<String, Value> = self
            .pairs
            .iter()
            .map(|(nic, bridge)| (nic.clone(), Value::from(bridge.clone())))
            .collect();
        Value::Map(map)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_and_space_separated_pairs() {
        let mut interfaces = Interfaces::default();
        interfaces.set(&Value::from("vnet0:bridge0, vnet1:-")).unwrap();

        assert_eq!(interfaces.names().collect::<Vec<_>>(), vec!["vnet0", "vnet1"]);
        assert_eq!(interfaces.bridge("vnet0"), Some(Some("bridge0")));
        assert_eq!(interfaces.bridge("vnet1"), Some(None));
        assert_eq!(interfaces.serialize(), Value::from("vnet0:bridge0,vnet1:-"));
    }

    #[test]
    fn pair_without_bridge_separator_is_invalid() {
        let mut interfaces = Interfaces::default();
        interfaces.set(&Value::from("vnet0:bridge0")).unwrap();

        let err = interfaces.set(&Value::from("vnet0")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
        // state unchanged after a rejected value
        assert!(interfaces.contains("vnet0"));
    }

    #[test]
    fn empty_serializes_to_none() {
        let mut interfaces = Interfaces::default();
        interfaces.set(&Value::List(Vec::new())).unwrap();
        assert_eq!(interfaces.serialize(), Value::Null);

        interfaces.add("vnet0", Some("bridge1"));
        assert!(interfaces.remove("vnet0"));
        assert!(!interfaces.remove("vnet0"));
        assert!(interfaces.is_empty());
    }
}
