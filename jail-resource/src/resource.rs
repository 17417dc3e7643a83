// SPDX-License-Identifier: GPL-3.0-only

//! A jail-like resource: a storage volume carrying a configuration

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::binding::VolumeBinding;
use crate::error::{ResourceError, Result};
use crate::filter::ResourceFilter;
use crate::storage::ConfigStorage;
use jail_config::{ApplyContext, ConfigError, JailConfig, Settings, ValueStore, resolve_within};
use jail_types::{ConfigType, Value};
use jail_zfs::{DestroyOptions, VolumeManager};

const ID_KEYS: [&str; 3] = ["id", "name", "uuid"];

/// A volume with its configuration; the jail id is the volume's short name
pub struct Resource {
    storage: ConfigStorage,
    config: JailConfig,
    settings: Settings,
}

impl Resource {
    pub fn new(manager: VolumeManager, volume: impl Into<String>, settings: Settings) -> Self {
        let binding = VolumeBinding::new(manager, volume);
        let mut resource = Self {
            storage: ConfigStorage::new(binding, &settings),
            config: JailConfig::new(),
            settings,
        };
        resource.bind_id();
        resource
    }

    /// Use `config` instead of an empty record, e.g. one sharing user defaults
    pub fn with_config(mut self, config: JailConfig) -> Self {
        self.config = config;
        self.bind_id();
        self
    }

    fn bind_id(&mut self) {
        let name = self.storage.binding().short_name().to_string();
        if let Err(e) = self.config.set("id", name.as_str(), false) {
            debug!("Volume name {} is not a jail id: {}", name, e);
        }
    }

    /// Refuse an id other than the volume name
    fn check_id(&self, id: &Value) -> Result<()> {
        match id {
            Value::String(id) if id == self.name() => Ok(()),
            other => Err(ConfigError::InvalidValue {
                key: "id".to_string(),
                reason: format!(
                    "{other} does not match the volume name {:?}",
                    self.name()
                ),
            }
            .into()),
        }
    }

    pub fn with_config_type(mut self, config_type: ConfigType) -> Self {
        self.storage = self.storage.with_config_type(config_type);
        self
    }

    /// Short name of the resource volume
    pub fn name(&self) -> &str {
        self.storage.binding().short_name()
    }

    pub fn volume(&self) -> &VolumeBinding {
        self.storage.binding()
    }

    pub fn config(&self) -> &JailConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut JailConfig {
        &mut self.config
    }

    /// Create the backing volume, readable by its owner only
    pub fn create(&self) -> Result<()> {
        let binding = self.storage.binding();
        let info = binding.manager().create_volume(binding.name())?;
        if let Some(mountpoint) = info.mountpoint {
            restrict_to_owner(&mountpoint)?;
        }
        Ok(())
    }

    /// Whether the volume is mounted on an existing directory
    pub fn exists(&self) -> bool {
        match self.storage.binding().manager().backend().volume(self.storage.binding().name()) {
            Ok(Some(info)) => info.mounted && info.mountpoint.is_some_and(|path| path.is_dir()),
            Ok(None) => false,
            Err(e) => {
                debug!("Cannot locate {}: {}", self.storage.binding().name(), e);
                false
            }
        }
    }

    pub fn config_type(&self) -> Result<ConfigType> {
        self.storage.config_type()
    }

    /// Absolute path of the config file; `None` when stored in volume properties
    pub fn config_file(&self) -> Result<Option<PathBuf>> {
        match self.storage.config_file()? {
            Some(file) => Ok(Some(self.abspath(file)?)),
            None => Ok(None),
        }
    }

    /// Stored configuration, without touching the in-memory record
    pub fn read_config(&self) -> Result<ValueStore> {
        self.storage.read()
    }

    /// Read the stored configuration into the in-memory record
    pub fn load_config(&mut self, skip_on_error: bool) -> Result<BTreeSet<String>> {
        let data = self.read_config()?;
        for key in ID_KEYS {
            if let Some(id) = data.leaf(key).filter(|id| !id.is_null()) {
                self.check_id(id)?;
            }
        }
        let changed = self.config.load(data, skip_on_error)?;
        debug!("Loaded {} keys of {}", changed.len(), self.storage.binding().name());
        Ok(changed)
    }

    pub fn save(&self) -> Result<()> {
        self.check_id(&self.config.get_raw("id").unwrap_or(Value::Null))?;
        self.storage.write(self.config.data())?;
        info!("Saved configuration of {}", self.storage.binding().name());
        Ok(())
    }

    /// Path below the volume mountpoint; not checked for escapes
    pub fn abspath(&self, relative: impl AsRef<Path>) -> Result<PathBuf> {
        Ok(self.storage.binding().mountpoint()?.join(relative))
    }

    /// Root directory of the jail
    pub fn root_path(&self) -> Result<PathBuf> {
        self.abspath(&self.settings.root_dir)
    }

    /// Resolve `path` and refuse it unless it stays below the volume mountpoint
    ///
    /// Absolute paths must start with the mountpoint, relative ones are taken
    /// from it. Symlinks are followed.
    pub fn require_relative_path(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();
        let mountpoint = self.storage.binding().mountpoint()?;

        let relative = if path.is_absolute() {
            match path.strip_prefix(&mountpoint) {
                Ok(relative) => relative.to_path_buf(),
                Err(_) => {
                    let canonical = mountpoint.canonicalize()?;
                    path.strip_prefix(&canonical)
                        .map_err(|_| ResourceError::PathEscape(path.to_path_buf()))?
                        .to_path_buf()
                }
            }
        } else {
            path.to_path_buf()
        };

        resolve_within(&mountpoint, &relative).map_err(|e| match e {
            ConfigError::PathEscape(resolved) => ResourceError::PathEscape(resolved),
            other => other.into(),
        })
    }

    /// Run the side effects of all special properties against the jail root
    pub fn apply_special_properties(&self) -> Result<()> {
        let root_path = self.root_path()?;
        let manager = self.storage.binding().manager();
        let ctx = ApplyContext {
            subject: self.name(),
            root_path: &root_path,
            host_resolv_conf: &self.settings.host_resolv_conf,
            events: manager.events().as_ref(),
        };
        self.config.apply_special_properties(&ctx)?;
        Ok(())
    }

    /// Destroy the volume with its children and snapshots
    pub fn destroy(&self) -> Result<()> {
        let binding = self.storage.binding();
        binding
            .manager()
            .destroy_volume(binding.name(), DestroyOptions::default())?;
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_to_owner(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_to_owner(_path: &Path) -> Result<()> {
    Ok(())
}

/// Resources on the direct children of `parent`
///
/// Hidden volumes (leading `.`) are skipped. The name is matched before a
/// configuration is loaded; configurations are read skipping unknown keys.
/// A child whose configuration cannot be loaded is left out with a warning.
pub fn list_resources(
    manager: &VolumeManager,
    parent: &str,
    settings: &Settings,
    filter: &dyn ResourceFilter,
) -> Result<Vec<Resource>> {
    let mut resources = Vec::new();

    for child in manager.backend().children(parent)? {
        let short_name = child.rsplit('/').next().unwrap_or(&child);
        if short_name.starts_with('.') {
            continue;
        }
        if !filter.matches_key("name", short_name) {
            debug!("Skipping {}: name does not match", child);
            continue;
        }

        let mut resource = Resource::new(manager.clone(), child.as_str(), settings.clone());
        if let Err(e) = resource.load_config(true) {
            warn!("Skipping {}: {}", child, e);
            continue;
        }
        if filter.matches_resource(&resource) {
            resources.push(resource);
        }
    }

    Ok(resources)
}
