// SPDX-License-Identifier: GPL-3.0-only

//! Volume operations through the `zfs` and `zpool` command-line tools

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;

use tracing::{debug, warn};
use which::which;

use crate::backend::VolumeBackend;
use crate::error::{Result, ZfsError};
use jail_types::VolumeInfo;

/// `zfs`/`zpool` CLI wrapper implementing [`VolumeBackend`]
#[derive(Debug, Clone)]
pub struct ZfsCli {
    zfs: PathBuf,
    zpool: PathBuf,
}

impl ZfsCli {
    /// Locate both tools in PATH
    pub fn new() -> Result<Self> {
        let zfs = which("zfs").map_err(|_| ZfsError::ToolMissing("zfs".to_string()))?;
        let zpool = which("zpool").map_err(|_| ZfsError::ToolMissing("zpool".to_string()))?;
        debug!("Using zfs at {:?}, zpool at {:?}", zfs, zpool);
        Ok(Self { zfs, zpool })
    }

    fn run_zfs(&self, args: &[&str]) -> Result<String> {
        run_capture(&self.zfs, args)
    }

    /// Run a listing command; a "does not exist" failure maps to `None`
    fn list_or_none(&self, args: &[&str]) -> Result<Option<String>> {
        let output = Command::new(&self.zfs).args(args).output().map_err(|e| {
            ZfsError::CommandFailed(format!("Failed to run zfs command: {}", e))
        })?;

        if output.status.success() {
            return Ok(Some(String::from_utf8_lossy(&output.stdout).to_string()));
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("does not exist") {
            return Ok(None);
        }

        Err(ZfsError::CommandFailed(format!(
            "zfs {} failed: {}",
            args.join(" "),
            stderr.trim()
        )))
    }
}

fn run_capture(binary: &PathBuf, args: &[&str]) -> Result<String> {
    debug!("Running {} {}", binary.display(), args.join(" "));
    let output = Command::new(binary).args(args).output().map_err(|e| {
        ZfsError::CommandFailed(format!("Failed to run {}: {}", binary.display(), e))
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ZfsError::CommandFailed(format!(
            "{} {} failed: {}",
            binary.display(),
            args.join(" "),
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Parse one line of `zfs list -H -o name,mountpoint,mounted,origin`
fn parse_volume_line(line: &str) -> Option<VolumeInfo> {
    let parts: Vec<&str> = line.split('\t').collect();
    if parts.len() < 4 || parts[0].is_empty() {
        return None;
    }

    let mountpoint = match parts[1] {
        "-" | "none" | "legacy" | "" => None,
        path => Some(PathBuf::from(path)),
    };

    let origin = match parts[3] {
        "-" | "" => None,
        snapshot => Some(snapshot.to_string()),
    };

    Some(VolumeInfo {
        name: parts[0].to_string(),
        mountpoint,
        mounted: parts[2] == "yes",
        origin,
    })
}

/// Names from `zfs list -H -o name`, without the queried volume itself
fn parse_names(output: &str, exclude: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != exclude)
        .map(ToString::to_string)
        .collect()
}

/// Locally set user properties from `zfs get -H -o property,value,source all`
fn parse_user_properties(output: &str) -> BTreeMap<String, String> {
    let mut properties = BTreeMap::new();

    for line in output.lines() {
        let parts: Vec<&str> = line.splitn(3, '\t').collect();
        if parts.len() < 3 {
            continue;
        }

        let (property, value, source) = (parts[0], parts[1], parts[2].trim());
        // user properties always carry a namespace separator
        if !property.contains(':') || source != "local" {
            continue;
        }

        properties.insert(property.to_string(), value.to_string());
    }

    properties
}

impl VolumeBackend for ZfsCli {
    fn pool_exists(&self, pool: &str) -> Result<bool> {
        let output = Command::new(&self.zpool)
            .args(["list", "-H", "-o", "name", pool])
            .output()
            .map_err(|e| ZfsError::CommandFailed(format!("Failed to run zpool: {}", e)))?;
        Ok(output.status.success())
    }

    fn volume(&self, name: &str) -> Result<Option<VolumeInfo>> {
        let output = self.list_or_none(&[
            "list",
            "-H",
            "-t",
            "filesystem",
            "-o",
            "name,mountpoint,mounted,origin",
            name,
        ])?;

        Ok(output.and_then(|text| text.lines().find_map(parse_volume_line)))
    }

    fn children(&self, name: &str) -> Result<Vec<String>> {
        let output = self.run_zfs(&["list", "-H", "-t", "filesystem", "-o", "name", "-d", "1", name])?;
        Ok(parse_names(&output, name))
    }

    fn snapshots(&self, name: &str) -> Result<Vec<String>> {
        let output = self.run_zfs(&[
            "list", "-H", "-t", "snapshot", "-o", "name", "-s", "createtxg", "-d", "1", name,
        ])?;
        Ok(parse_names(&output, name))
    }

    fn snapshot_exists(&self, snapshot: &str) -> Result<bool> {
        let output = self.list_or_none(&["list", "-H", "-t", "snapshot", "-o", "name", snapshot])?;
        Ok(output.is_some())
    }

    fn create(&self, name: &str) -> Result<()> {
        self.run_zfs(&["create", name]).map(|_| ())
    }

    fn mount(&self, name: &str) -> Result<()> {
        self.run_zfs(&["mount", name]).map(|_| ())
    }

    fn unmount(&self, name: &str) -> Result<()> {
        self.run_zfs(&["umount", name]).map(|_| ())
    }

    fn snapshot(&self, snapshot: &str, recursive: bool) -> Result<()> {
        if recursive {
            self.run_zfs(&["snapshot", "-r", snapshot]).map(|_| ())
        } else {
            self.run_zfs(&["snapshot", snapshot]).map(|_| ())
        }
    }

    fn clone_snapshot(&self, snapshot: &str, target: &str) -> Result<()> {
        self.run_zfs(&["clone", snapshot, target]).map(|_| ())
    }

    fn promote(&self, name: &str) -> Result<()> {
        self.run_zfs(&["promote", name]).map(|_| ())
    }

    fn destroy(&self, name: &str) -> Result<()> {
        self.run_zfs(&["destroy", name]).map(|_| ())
    }

    fn destroy_snapshot(&self, snapshot: &str, recursive: bool) -> Result<()> {
        if recursive {
            self.run_zfs(&["destroy", "-d", "-r", snapshot]).map(|_| ())
        } else {
            self.run_zfs(&["destroy", "-d", snapshot]).map(|_| ())
        }
    }

    fn rename_snapshot(&self, snapshot: &str, new_name: &str, recursive: bool) -> Result<()> {
        let (volume, _) = jail_types::snapshot_parts(snapshot)
            .ok_or_else(|| ZfsError::InvalidName(snapshot.to_string()))?;
        let target = format!("{volume}@{new_name}");
        if recursive {
            self.run_zfs(&["rename", "-r", snapshot, &target]).map(|_| ())
        } else {
            self.run_zfs(&["rename", snapshot, &target]).map(|_| ())
        }
    }

    fn user_properties(&self, name: &str) -> Result<BTreeMap<String, String>> {
        let output = self.run_zfs(&["get", "-H", "-o", "property,value,source", "all", name])?;
        let properties = parse_user_properties(&output);
        if properties.is_empty() {
            debug!("No user properties set on {}", name);
        }
        Ok(properties)
    }

    fn set_user_property(&self, name: &str, property: &str, value: &str) -> Result<()> {
        if !property.contains(':') {
            warn!("Refusing to set non-user property {} on {}", property, name);
            return Err(ZfsError::InvalidName(property.to_string()));
        }
        let assignment = format!("{property}={value}");
        self.run_zfs(&["set", &assignment, name]).map(|_| ())
    }

    fn clear_user_property(&self, name: &str, property: &str) -> Result<()> {
        self.run_zfs(&["inherit", property, name]).map(|_| ())
    }
}
