// SPDX-License-Identifier: GPL-3.0-only

//! User defaults stored below the root volume of all jails

use std::sync::Arc;

use tracing::info;

use crate::binding::VolumeBinding;
use crate::error::Result;
use crate::storage::ConfigStorage;
use jail_config::{DefaultsConfig, Settings};
use jail_types::ConfigType;
use jail_zfs::VolumeManager;

const JSON_FILE: &str = "defaults.json";
const UCL_FILE: &str = "defaults";
const PROPERTY_VOLUME: &str = ".defaults";

pub struct DefaultsResource {
    storage: ConfigStorage,
    defaults: DefaultsConfig,
}

impl DefaultsResource {
    /// Defaults of the jails below `root_volume`
    pub fn new(manager: VolumeManager, root_volume: impl Into<String>, settings: &Settings) -> Self {
        let binding = VolumeBinding::new(manager, root_volume);
        let storage = ConfigStorage::new(binding, settings)
            .with_file_names(JSON_FILE, UCL_FILE)
            .with_property_volume(PROPERTY_VOLUME);
        Self {
            storage,
            defaults: DefaultsConfig::new(),
        }
    }

    pub fn with_config_type(mut self, config_type: ConfigType) -> Self {
        self.storage = self.storage.with_config_type(config_type);
        self
    }

    pub fn config_type(&self) -> Result<ConfigType> {
        self.storage.config_type()
    }

    pub fn defaults(&self) -> &DefaultsConfig {
        &self.defaults
    }

    pub fn defaults_mut(&mut self) -> &mut DefaultsConfig {
        &mut self.defaults
    }

    /// Snapshot of the current defaults to share between jail configurations
    pub fn shared(&self) -> Arc<DefaultsConfig> {
        Arc::new(self.defaults.clone())
    }

    /// Replace the in-memory defaults with the stored ones
    pub fn load_config(&mut self) -> Result<()> {
        let mut data = self.storage.read()?;
        // legacy readers mark jail configs, not defaults
        if data.contains("legacy") {
            data.delete("legacy")?;
        }
        info!(
            "Loaded {} user defaults of {}",
            data.len(),
            self.storage.binding().name()
        );
        self.defaults = DefaultsConfig::from_user_data(data);
        Ok(())
    }

    /// Persist only the values the user set
    pub fn save(&self) -> Result<()> {
        self.storage.write(self.defaults.exclusive_user_data())
    }
}
