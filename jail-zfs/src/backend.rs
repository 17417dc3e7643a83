// SPDX-License-Identifier: GPL-3.0-only

use std::collections::BTreeMap;

use crate::error::Result;
use jail_types::VolumeInfo;

/// Primitive operations of a copy-on-write storage pool
///
/// Implementations perform exactly one storage-layer action per call. Ordering,
/// cleanup and rollback live in [`crate::VolumeManager`].
///
/// Snapshots are addressed as `volume@name` throughout.
pub trait VolumeBackend: Send + Sync {
    fn pool_exists(&self, pool: &str) -> Result<bool>;

    /// Look up a volume; `Ok(None)` when it does not exist
    fn volume(&self, name: &str) -> Result<Option<VolumeInfo>>;

    /// Direct child volumes, by full name
    fn children(&self, name: &str) -> Result<Vec<String>>;

    /// Snapshots of this volume only, oldest first
    fn snapshots(&self, name: &str) -> Result<Vec<String>>;

    fn snapshot_exists(&self, snapshot: &str) -> Result<bool>;

    /// Create a single volume; the parent must already exist
    fn create(&self, name: &str) -> Result<()>;

    fn mount(&self, name: &str) -> Result<()>;

    fn unmount(&self, name: &str) -> Result<()>;

    /// Take a snapshot, optionally of every descendant with the same name
    fn snapshot(&self, snapshot: &str, recursive: bool) -> Result<()>;

    fn clone_snapshot(&self, snapshot: &str, target: &str) -> Result<()>;

    fn promote(&self, name: &str) -> Result<()>;

    /// Delete a volume that has no children and no snapshots
    fn destroy(&self, name: &str) -> Result<()>;

    /// Delete a snapshot; with dependent clones the deletion is deferred
    /// until the last clone is gone
    fn destroy_snapshot(&self, snapshot: &str, recursive: bool) -> Result<()>;

    fn rename_snapshot(&self, snapshot: &str, new_name: &str, recursive: bool) -> Result<()>;

    /// Locally set user properties (`namespace:key`)
    fn user_properties(&self, name: &str) -> Result<BTreeMap<String, String>>;

    fn set_user_property(&self, name: &str, property: &str, value: &str) -> Result<()>;

    /// Remove a locally set user property
    fn clear_user_property(&self, name: &str, property: &str) -> Result<()>;
}
