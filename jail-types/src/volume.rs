// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Information about a copy-on-write volume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeInfo {
    /// Hierarchical name, e.g. `pool/iocage/jails/web`
    pub name: String,
    pub mountpoint: Option<PathBuf>,
    pub mounted: bool,
    /// Snapshot this volume was cloned from (`volume@snapshot`), if any
    pub origin: Option<String>,
}

impl VolumeInfo {
    /// Name of the pool the volume lives in
    pub fn pool(&self) -> &str {
        self.name.split('/').next().unwrap_or(&self.name)
    }

    /// Whether the volume still depends on another volume's snapshot
    pub fn is_clone(&self) -> bool {
        self.origin.is_some()
    }
}

/// Split `volume@snapshot` into its volume and snapshot names
pub fn snapshot_parts(snapshot: &str) -> Option<(&str, &str)> {
    let (volume, name) = snapshot.split_once('@')?;
    if volume.is_empty() || name.is_empty() {
        return None;
    }
    Some((volume, name))
}
