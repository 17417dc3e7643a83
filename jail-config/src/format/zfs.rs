// SPDX-License-Identifier: GPL-3.0-only

//! Configuration stored as prefixed user properties on the volume itself

use std::collections::BTreeMap;

use tracing::debug;

use super::{ConfigFormat, import_legacy};
use crate::error::Result;
use crate::helpers::{StringStyle, parse_user_input, to_string};
use crate::store::ValueStore;
use jail_types::{ConfigType, Value};
use jail_zfs::VolumeManager;

pub struct ZfsProperties {
    manager: VolumeManager,
    volume: String,
    prefix: String,
}

impl ZfsProperties {
    pub fn new(manager: VolumeManager, volume: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            manager,
            volume: volume.into(),
            prefix: prefix.into(),
        }
    }

    fn config_properties(&self) -> Result<BTreeMap<String, String>> {
        if !self.manager.volume_exists(&self.volume)? {
            return Ok(BTreeMap::new());
        }
        let properties = self.manager.backend().user_properties(&self.volume)?;
        Ok(strip_prefix(&properties, &self.prefix))
    }
}

/// Config keys and raw values of all properties carrying `prefix`
pub fn strip_prefix(properties: &BTreeMap<String, String>, prefix: &str) -> BTreeMap<String, String> {
    properties
        .iter()
        .filter_map(|(name, value)| {
            name.strip_prefix(prefix)
                .filter(|key| !key.is_empty())
                .map(|key| (key.to_string(), value.clone()))
        })
        .collect()
}

/// Interpret raw property strings as configuration values
pub fn from_properties(properties: &BTreeMap<String, String>) -> ValueStore {
    properties
        .iter()
        .map(|(key, value)| (key.clone(), parse_user_input(Value::from(value.as_str()))))
        .collect()
}

/// Property name and string value for each configuration leaf
pub fn to_properties(data: &ValueStore, prefix: &str) -> BTreeMap<String, String> {
    data.iter()
        .map(|(key, value)| (format!("{prefix}{key}"), to_string(value, StringStyle::PROPERTY)))
        .collect()
}

impl ConfigFormat for ZfsProperties {
    fn config_type(&self) -> ConfigType {
        ConfigType::Zfs
    }

    fn exists(&self) -> Result<bool> {
        Ok(!self.config_properties()?.is_empty())
    }

    fn read(&self) -> Result<ValueStore> {
        debug!("Reading config properties of {}", self.volume);
        let mut data = from_properties(&self.config_properties()?);
        import_legacy(&mut data);
        Ok(data)
    }

    fn write(&self, data: &ValueStore) -> Result<()> {
        let backend = self.manager.backend();
        let wanted = to_properties(data, &self.prefix);

        for (name, value) in &wanted {
            backend.set_user_property(&self.volume, name, value)?;
        }

        // drop properties of keys no longer configured
        for key in self.config_properties()?.keys() {
            let name = format!("{}{}", self.prefix, key);
            if !wanted.contains_key(&name) {
                debug!("Clearing stale property {} on {}", name, self.volume);
                backend.clear_user_property(&self.volume, &name)?;
            }
        }
        Ok(())
    }
}
