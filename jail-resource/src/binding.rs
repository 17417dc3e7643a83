// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use crate::error::{ResourceError, Result};
use jail_types::VolumeInfo;
use jail_zfs::VolumeManager;

/// Locates the volume backing a resource
#[derive(Clone)]
pub struct VolumeBinding {
    name: String,
    manager: VolumeManager,
}

impl VolumeBinding {
    pub fn new(manager: VolumeManager, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            manager,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn manager(&self) -> &VolumeManager {
        &self.manager
    }

    /// Last component of the volume name
    pub fn short_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    pub fn pool_name(&self) -> &str {
        self.name.split('/').next().unwrap_or(&self.name)
    }

    pub fn info(&self) -> Result<VolumeInfo> {
        Ok(self.manager.get_volume(&self.name)?)
    }

    pub fn exists(&self) -> Result<bool> {
        Ok(self.manager.volume_exists(&self.name)?)
    }

    pub fn mountpoint(&self) -> Result<PathBuf> {
        self.info()?
            .mountpoint
            .ok_or_else(|| ResourceError::NotMounted(self.name.clone()))
    }

    /// Mountpoint when the volume exists and has one
    pub fn try_mountpoint(&self) -> Result<Option<PathBuf>> {
        match self.manager.backend().volume(&self.name)? {
            Some(info) => Ok(info.mountpoint),
            None => Ok(None),
        }
    }

    /// Name of a volume below this one
    pub fn child_name(&self, relative: &str) -> String {
        format!("{}/{}", self.name, relative.trim_start_matches('/'))
    }
}
