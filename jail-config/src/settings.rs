// SPDX-License-Identifier: GPL-3.0-only

//! Library settings, loadable from TOML

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, Result};

/// File names and conventions used when persisting configurations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Structured config file inside a resource volume
    pub json_file: String,
    /// Legacy UCL config file inside a resource volume
    pub ucl_file: String,
    /// Namespace of configuration user properties on volumes
    pub zfs_property_prefix: String,
    /// Host file copied into jails by the resolver property
    pub host_resolv_conf: PathBuf,
    /// Jail root directory, relative to the resource volume
    pub root_dir: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            json_file: "config.json".to_string(),
            ucl_file: "config".to_string(),
            zfs_property_prefix: "org.freebsd.iocage:".to_string(),
            host_resolv_conf: PathBuf::from("/etc/resolv.conf"),
            root_dir: "root".to_string(),
        }
    }
}

impl Settings {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            format: "toml",
            reason: e.to_string(),
        })
    }

    /// Read settings from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let settings = Settings::from_toml_str("json_file = \"jail.json\"\n").unwrap();
        assert_eq!(settings.json_file, "jail.json");
        assert_eq!(settings.zfs_property_prefix, "org.freebsd.iocage:");
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        assert!(matches!(
            Settings::from_toml_str("json_file = ["),
            Err(ConfigError::Parse { format: "toml", .. })
        ));
    }
}
