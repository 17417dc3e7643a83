// SPDX-License-Identifier: GPL-3.0-only

//! Property resolution for one jail configuration
//!
//! Reads consult special properties, then registered getters, then the
//! stored value normalized to the type of its default, and finally the
//! defaults. Every mutation is gated by [`JailConfig::is_known_property`].

use std::collections::{BTreeMap, BTreeSet};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::defaults::{DefaultsConfig, hardcoded, hardcoded_value};
use crate::error::{ConfigError, Result};
use crate::helpers::{
    StringStyle, parse_bool, parse_int, parse_list, parse_none, parse_user_input, to_string,
};
use crate::host_params::HostParams;
use crate::properties::accessors::accessor;
use crate::properties::interfaces::Interfaces;
use crate::properties::resource_limit::ResourceLimit;
use crate::properties::special::{self, ApplyContext, NamedProperty, is_special_property};
use crate::store::ValueStore;
use jail_types::Value;

const ID_KEYS: [&str; 3] = ["id", "name", "uuid"];
const MAC_SUFFIX: &str = "_mac";

/// Interface name of a `<iface>_mac` key
fn mac_interface(key: &str) -> Option<&str> {
    let split = key.len().checked_sub(MAC_SUFFIX.len())?;
    let (nic, suffix) = (key.get(..split)?, key.get(split..)?);
    let valid = suffix.eq_ignore_ascii_case(MAC_SUFFIX)
        && !nic.is_empty()
        && nic.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    valid.then_some(nic)
}

fn is_user_property(key: &str) -> bool {
    key == "user" || key.starts_with("user.")
}

/// User configuration of a jail layered over the defaults
#[derive(Debug, Clone)]
pub struct JailConfig {
    pub(crate) data: ValueStore,
    defaults: Arc<DefaultsConfig>,
    host_params: Arc<HostParams>,
}

impl Default for JailConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl JailConfig {
    /// Empty configuration over the hardcoded defaults
    pub fn new() -> Self {
        Self::with_defaults(Arc::new(DefaultsConfig::new()))
    }

    pub fn with_defaults(defaults: Arc<DefaultsConfig>) -> Self {
        Self {
            data: ValueStore::new(),
            defaults,
            host_params: Arc::new(HostParams::empty()),
        }
    }

    /// Use the jail parameters supported by the host for the known-property test
    pub fn with_host_params(mut self, host_params: Arc<HostParams>) -> Self {
        self.host_params = host_params;
        self
    }

    /// Only the values configured by the user
    pub fn data(&self) -> &ValueStore {
        &self.data
    }

    pub fn defaults(&self) -> &DefaultsConfig {
        &self.defaults
    }

    pub fn host_params(&self) -> &HostParams {
        &self.host_params
    }

    pub fn is_legacy(&self) -> bool {
        self.data
            .leaf("legacy")
            .and_then(parse_bool)
            .unwrap_or(false)
    }

    /// Whether any `allow_mount_*` parameter is enabled
    pub fn has_mounts_enabled(&self) -> bool {
        self.data.iter().any(|(key, value)| {
            key.starts_with("allow_mount_") && parse_bool(value) == Some(true)
        })
    }

    /// User value of `key` without interpretation
    pub fn get_raw(&self, key: &str) -> Option<Value> {
        self.data.get(key).ok()
    }

    /// User value, else the default, both uninterpreted
    pub fn effective_raw(&self, key: &str) -> Option<Value> {
        self.get_raw(key).or_else(|| self.defaults.effective(key))
    }

    /// Resolved value of a property
    pub fn get(&self, key: &str) -> Result<Value> {
        self.lookup(key)?
            .ok_or_else(|| ConfigError::NotFound(key.to_string()))
    }

    /// Resolved value, or `fallback` when the key is unknown or unset
    pub fn get_or(&self, key: &str, fallback: impl Into<Value>) -> Result<Value> {
        match self.get(key) {
            Err(ConfigError::UnknownProperty(_)) | Err(ConfigError::NotFound(_)) => {
                Ok(fallback.into())
            }
            other => other,
        }
    }

    /// Resolved value for display; none becomes `-`
    pub fn get_string(&self, key: &str) -> Result<String> {
        Ok(to_string(&self.get(key)?, StringStyle::DISPLAY))
    }

    fn lookup(&self, key: &str) -> Result<Option<Value>> {
        if !self.data.contains(key) && !self.is_known_property(key, false) {
            return Err(ConfigError::UnknownProperty(key.to_string()));
        }

        if is_special_property(key) {
            let raw = self.effective_raw(key).unwrap_or(Value::Null);
            let property = special::load(key, &raw).transpose()?;
            return Ok(property.map(|p| p.value()));
        }

        if let Some(get) = accessor(key).and_then(|a| a.get)
            && let Some(value) = get(self)?
        {
            return Ok(Some(value));
        }

        match self.data.get(key) {
            Ok(value) if accessor(key).is_none() => Ok(Some(self.normalize(key, value))),
            _ => Ok(self.defaults.effective(key)),
        }
    }

    /// Non-null default giving the type stored values are coerced to
    fn default_type(&self, key: &str) -> Option<Value> {
        hardcoded_value(key)
            .filter(|v| !v.is_null())
            .or_else(|| self.defaults.effective(key).filter(|v| !v.is_null()))
    }

    fn normalize(&self, key: &str, value: Value) -> Value {
        match self.default_type(key) {
            Some(Value::Bool(_)) => parse_bool(&value).map(Value::Bool).unwrap_or(value),
            Some(Value::Int(_)) => parse_int(&value).map(Value::Int).unwrap_or(value),
            Some(Value::List(_)) => Value::List(parse_list(&value)),
            Some(Value::String(_)) | Some(Value::Map(_)) => value,
            _ => match parse_user_input(value) {
                Value::String(s) => match s.parse::<i64>() {
                    Ok(i) => Value::Int(i),
                    Err(_) => Value::String(s),
                },
                other => other,
            },
        }
    }

    /// Coerce a value to the type of the key's default; none is always allowed
    fn sanitize(&self, key: &str, raw: Value) -> Result<Value> {
        if parse_none(&raw) {
            return Ok(Value::Null);
        }

        match self.default_type(key) {
            Some(Value::Bool(_)) => parse_bool(&raw).map(Value::Bool).ok_or_else(|| {
                ConfigError::invalid(key, format!("expected a boolean, found {raw}"))
            }),
            Some(Value::Int(_)) => parse_int(&raw)
                .or_else(|| parse_bool(&raw).map(i64::from))
                .map(Value::Int)
                .ok_or_else(|| ConfigError::invalid(key, format!("expected an integer, found {raw}"))),
            Some(Value::List(_)) => Ok(Value::List(parse_list(&raw))),
            Some(Value::String(_)) => Ok(match raw {
                Value::String(_) => raw,
                other => Value::String(to_string(&other, StringStyle::DISPLAY)),
            }),
            _ => Ok(parse_user_input(raw)),
        }
    }

    /// Whether `key` may be read or written
    ///
    /// Known keys are host jail parameters, hardcoded defaults (including
    /// entries of nested defaults), accessor and special property names, `user` and
    /// `user.*` keys and `<iface>_mac` keys. With `explicit` the interface
    /// of a MAC key must be configured.
    pub fn is_known_property(&self, key: &str, explicit: bool) -> bool {
        if self.host_params.contains(key)
            || hardcoded().contains(key)
            || accessor(key).is_some()
            || is_special_property(key)
            || is_user_property(key)
        {
            return true;
        }

        match mac_interface(key) {
            Some(_) if !explicit => true,
            Some(nic) => self
                .special::<Interfaces>()
                .is_ok_and(|interfaces| interfaces.contains(nic)),
            None => false,
        }
    }

    /// Set a property and report whether its value changed
    ///
    /// With `skip_on_error` unknown keys and invalid values are logged and
    /// leave the configuration untouched.
    pub fn set(&mut self, key: &str, value: impl Into<Value>, skip_on_error: bool) -> Result<bool> {
        self.set_inner(key, value.into(), skip_on_error, true)
    }

    fn set_inner(&mut self, key: &str, value: Value, skip_on_error: bool, explicit: bool) -> Result<bool> {
        if !self.is_known_property(key, explicit) {
            let err = ConfigError::UnknownProperty(key.to_string());
            if skip_on_error {
                warn!("{err}, skipped");
                return Ok(false);
            }
            return Err(err);
        }

        let existed_before = self.data.contains(key);
        let before = self.lookup(key).ok().flatten();

        if let Err(err) = self.write_value(key, value) {
            if skip_on_error && matches!(err, ConfigError::InvalidValue { .. }) {
                warn!("{err}, skipped");
                return Ok(false);
            }
            return Err(err);
        }

        let after = self.lookup(key).ok().flatten();
        let changed = existed_before != self.data.contains(key) || before != after;
        if changed {
            debug!("Config property {key} changed");
        }
        Ok(changed)
    }

    fn write_value(&mut self, key: &str, value: Value) -> Result<()> {
        if let Some(property) = special::load(key, &value) {
            let property = property?;
            self.data.set(key, property.serialize());
            return Ok(());
        }

        if let Some(set) = accessor(key).and_then(|a| a.set) {
            return set(self, parse_user_input(value));
        }

        let value = self.sanitize(key, value)?;
        self.data.set(key, value);
        Ok(())
    }

    /// Set several properties and return the keys whose value changed
    ///
    /// An identifier (`id`, `name` or `uuid`) is applied first as `id`;
    /// `<iface>_mac` keys are applied last. A failure aborts the batch and
    /// reports the keys already applied.
    pub fn apply(&mut self, data: &BTreeMap<String, Value>, skip_on_error: bool) -> Result<BTreeSet<String>> {
        let entries = data.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        self.apply_entries(entries, skip_on_error, true)
    }

    fn apply_entries(
        &mut self,
        mut entries: BTreeMap<String, Value>,
        skip_on_error: bool,
        explicit: bool,
    ) -> Result<BTreeSet<String>> {
        let mut ordered: Vec<(String, Value)> = Vec::with_capacity(entries.len());

        if let Some(id) = ID_KEYS.iter().find_map(|k| entries.get(*k).cloned()) {
            ordered.push(("id".to_string(), id));
        }
        for key in ID_KEYS {
            entries.remove(key);
        }

        let (macs, rest): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .partition(|(key, _)| mac_interface(key).is_some());
        ordered.extend(rest);
        ordered.extend(macs);

        let mut changed = BTreeSet::new();
        let mut completed = Vec::with_capacity(ordered.len());
        for (key, value) in ordered {
            match self.set_inner(&key, value, skip_on_error, explicit) {
                Ok(true) => {
                    changed.insert(key.clone());
                    completed.push(key);
                }
                Ok(false) => completed.push(key),
                Err(source) => {
                    return Err(ConfigError::BatchAborted {
                        completed,
                        source: Box::new(source),
                    });
                }
            }
        }
        Ok(changed)
    }

    /// Merge stored data read from a format into this configuration
    ///
    /// Identifiers in `data` are ignored when an id is already set.
    pub fn load(&mut self, data: ValueStore, skip_on_error: bool) -> Result<BTreeSet<String>> {
        let has_id = self.data.leaf("id").is_some_and(|id| !id.is_null());
        let entries = data
            .iter()
            .filter(|(key, _)| !(has_id && ID_KEYS.contains(&key.as_str())))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        self.apply_entries(entries, skip_on_error, false)
    }

    /// Replace all user data; on failure the previous data is kept
    pub fn replace(&mut self, data: ValueStore) -> Result<()> {
        let previous = std::mem::take(&mut self.data);
        if let Err(err) = self.load(data, false) {
            self.data = previous;
            return Err(err);
        }
        Ok(())
    }

    pub fn delete(&mut self, key: &str) -> Result<()> {
        self.data.delete(key)
    }

    /// Keys configured by the user
    pub fn keys(&self) -> Vec<String> {
        self.data.keys()
    }

    /// Stored keys that fail the explicit known-property test
    pub fn unknown_properties(&self) -> Vec<String> {
        self.data
            .keys()
            .into_iter()
            .filter(|key| !self.is_known_property(key, true))
            .collect()
    }

    /// User and default keys, sorted
    pub fn all_properties(&self) -> Vec<String> {
        let mut keys: BTreeSet<String> = self.defaults.keys().into_iter().collect();
        keys.extend(self.data.keys());
        keys.into_iter().collect()
    }

    /// Current state of a special property
    pub fn special<P: NamedProperty>(&self) -> Result<P> {
        let mut property = P::default();
        if let Some(raw) = self.effective_raw(P::NAME) {
            property.set(&raw)?;
        }
        Ok(property)
    }

    /// Mutable access to a special property
    ///
    /// The guard writes the serialized property back when dropped.
    pub fn special_mut<P: NamedProperty>(&mut self) -> Result<SpecialGuard<'_, P>> {
        let property = self.special::<P>()?;
        Ok(SpecialGuard {
            config: self,
            property,
        })
    }

    /// Current state of an RCTL limit such as `memoryuse`
    pub fn resource_limit(&self, name: &str) -> Result<ResourceLimit> {
        let raw = self.effective_raw(name).unwrap_or(Value::Null);
        match special::load(name, &raw).transpose()? {
            Some(property) => property
                .as_any()
                .downcast_ref::<ResourceLimit>()
                .cloned()
                .ok_or_else(|| ConfigError::UnknownProperty(name.to_string())),
            None => Err(ConfigError::UnknownProperty(name.to_string())),
        }
    }

    /// Apply the side effects of every special property
    pub fn apply_special_properties(&self, ctx: &ApplyContext<'_>) -> Result<()> {
        for name in special::special_property_names() {
            let raw = self.effective_raw(name).unwrap_or(Value::Null);
            if let Some(property) = special::load(name, &raw) {
                property?.apply(ctx)?;
            }
        }
        Ok(())
    }
}

/// Write-through handle returned by [`JailConfig::special_mut`]
pub struct SpecialGuard<'a, P: NamedProperty> {
    config: &'a mut JailConfig,
    property: P,
}

impl<P: NamedProperty> Deref for SpecialGuard<'_, P> {
    type Target = P;

    fn deref(&self) -> &P {
        &self.property
    }
}

impl<P: NamedProperty> DerefMut for SpecialGuard<'_, P> {
    fn deref_mut(&mut self) -> &mut P {
        &mut self.property
    }
}

impl<P: NamedProperty> Drop for SpecialGuard<'_, P> {
    fn drop(&mut self) {
        self.config.data.set(P::NAME, self.property.serialize());
    }
}
