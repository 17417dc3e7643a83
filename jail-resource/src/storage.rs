// SPDX-License-Identifier: GPL-3.0-only

//! Where a resource keeps its configuration
//!
//! The config type is resolved once: either given explicitly or detected
//! by probing the JSON file, the UCL file and the volume properties in that
//! order. Without any of them the JSON file is used.

use std::cell::OnceCell;
use std::path::PathBuf;

use tracing::debug;

use crate::binding::VolumeBinding;
use crate::error::Result;
use jail_config::{ConfigFormat, JsonFile, Settings, UclFile, ValueStore, ZfsProperties};
use jail_types::ConfigType;

pub struct ConfigStorage {
    binding: VolumeBinding,
    json_file: String,
    ucl_file: String,
    property_prefix: String,
    /// Volume below the resource holding the properties, if not the resource itself
    property_volume: Option<String>,
    config_type: OnceCell<ConfigType>,
}

impl ConfigStorage {
    pub fn new(binding: VolumeBinding, settings: &Settings) -> Self {
        Self {
            binding,
            json_file: settings.json_file.clone(),
            ucl_file: settings.ucl_file.clone(),
            property_prefix: settings.zfs_property_prefix.clone(),
            property_volume: None,
            config_type: OnceCell::new(),
        }
    }

    pub fn with_file_names(mut self, json_file: &str, ucl_file: &str) -> Self {
        self.json_file = json_file.to_string();
        self.ucl_file = ucl_file.to_string();
        self
    }

    /// Keep volume properties on a child volume instead of the resource's own
    pub fn with_property_volume(mut self, relative: &str) -> Self {
        self.property_volume = Some(self.binding.child_name(relative));
        self
    }

    /// Fix the config type; `Auto` leaves it to detection
    pub fn with_config_type(self, config_type: ConfigType) -> Self {
        if config_type != ConfigType::Auto {
            let _ = self.config_type.set(config_type);
        }
        self
    }

    pub fn binding(&self) -> &VolumeBinding {
        &self.binding
    }

    /// Resolved config type, detected on first use
    pub fn config_type(&self) -> Result<ConfigType> {
        if let Some(config_type) = self.config_type.get() {
            return Ok(*config_type);
        }
        let detected = self.detect()?;
        debug!("Config type of {} is {}", self.binding.name(), detected.as_str());
        Ok(*self.config_type.get_or_init(|| detected))
    }

    fn detect(&self) -> Result<ConfigType> {
        // files of an unmounted or missing volume count as absent
        if let Some(base) = self.binding.try_mountpoint()? {
            if JsonFile::new(base.join(&self.json_file)).exists()? {
                return Ok(ConfigType::Json);
            }
            if UclFile::new(base.join(&self.ucl_file)).exists()? {
                return Ok(ConfigType::Ucl);
            }
        }
        if self.properties().exists()? {
            return Ok(ConfigType::Zfs);
        }
        Ok(ConfigType::Json)
    }

    /// Config file relative to the volume mountpoint; none for volume properties
    pub fn config_file(&self) -> Result<Option<PathBuf>> {
        Ok(match self.config_type()? {
            ConfigType::Json | ConfigType::Auto => Some(PathBuf::from(&self.json_file)),
            ConfigType::Ucl => Some(PathBuf::from(&self.ucl_file)),
            ConfigType::Zfs => None,
        })
    }

    fn property_volume(&self) -> &str {
        self.property_volume.as_deref().unwrap_or(self.binding.name())
    }

    fn properties(&self) -> ZfsProperties {
        ZfsProperties::new(
            self.binding.manager().clone(),
            self.property_volume(),
            self.property_prefix.as_str(),
        )
    }

    fn format_of(&self, config_type: ConfigType) -> Result<Box<dyn ConfigFormat>> {
        let format: Box<dyn ConfigFormat> = match config_type {
            ConfigType::Json | ConfigType::Auto => {
                Box::new(JsonFile::new(self.binding.mountpoint()?.join(&self.json_file)))
            }
            ConfigType::Ucl => Box::new(UclFile::new(self.binding.mountpoint()?.join(&self.ucl_file))),
            ConfigType::Zfs => Box::new(self.properties()),
        };
        Ok(format)
    }

    /// Adapter of the resolved config type
    pub fn format(&self) -> Result<Box<dyn ConfigFormat>> {
        self.format_of(self.config_type()?)
    }

    pub fn read(&self) -> Result<ValueStore> {
        Ok(self.format()?.read()?)
    }

    pub fn write(&self, data: &ValueStore) -> Result<()> {
        let config_type = self.config_type()?;
        if config_type == ConfigType::Zfs && self.property_volume.is_some() {
            self.binding.manager().get_or_create_volume(self.property_volume())?;
        }
        self.format_of(config_type)?.write(data)?;
        Ok(())
    }
}
