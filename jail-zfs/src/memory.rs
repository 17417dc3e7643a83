// SPDX-License-Identifier: GPL-3.0-only

//! In-process model of a copy-on-write pool
//!
//! Tracks volumes, snapshots, clone origins and user properties with the
//! same dependency rules as ZFS: a volume with children or snapshots cannot
//! be destroyed, a snapshot with clones is only marked for deferred
//! destruction, and promotion moves the origin's older snapshots onto the
//! promoted clone. Failure injection makes rollback paths testable.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::backend::VolumeBackend;
use crate::error::{Result, ZfsError};
use jail_types::{VolumeInfo, snapshot_parts};

#[derive(Debug, Clone)]
struct MemSnapshot {
    name: String,
    deferred: bool,
}

#[derive(Debug, Default)]
struct MemVolume {
    mounted: bool,
    origin: Option<String>,
    snapshots: Vec<MemSnapshot>,
    properties: BTreeMap<String, String>,
}

impl MemVolume {
    fn has_snapshot(&self, name: &str) -> bool {
        self.snapshots.iter().any(|s| s.name == name)
    }
}

#[derive(Debug, Default)]
struct State {
    pools: BTreeSet<String>,
    volumes: BTreeMap<String, MemVolume>,
    fail_promote: BTreeSet<String>,
    fail_clone: BTreeSet<String>,
    fail_unmount: BTreeSet<String>,
    fail_lookup: BTreeSet<String>,
}

impl State {
    fn get(&self, name: &str) -> Result<&MemVolume> {
        self.volumes
            .get(name)
            .ok_or_else(|| ZfsError::VolumeNotFound(name.to_string()))
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut MemVolume> {
        self.volumes
            .get_mut(name)
            .ok_or_else(|| ZfsError::VolumeNotFound(name.to_string()))
    }

    /// The volume itself followed by all of its descendants
    fn subtree(&self, name: &str) -> Vec<String> {
        let prefix = format!("{name}/");
        self.volumes
            .keys()
            .filter(|key| *key == name || key.starts_with(&prefix))
            .cloned()
            .collect()
    }

    fn has_clones_of(&self, snapshot: &str) -> bool {
        self.volumes
            .values()
            .any(|volume| volume.origin.as_deref() == Some(snapshot))
    }

    /// Drop a deferred snapshot once nothing depends on it anymore
    fn release_deferred(&mut self, snapshot: &str) {
        if self.has_clones_of(snapshot) {
            return;
        }
        let Some((volume, name)) = snapshot_parts(snapshot) else {
            return;
        };
        if let Some(origin) = self.volumes.get_mut(volume) {
            origin.snapshots.retain(|s| !(s.name == name && s.deferred));
        }
    }
}

fn parent_of(name: &str) -> Option<&str> {
    name.rsplit_once('/').map(|(parent, _)| parent)
}

fn split_snapshot(snapshot: &str) -> Result<(&str, &str)> {
    snapshot_parts(snapshot).ok_or_else(|| ZfsError::InvalidName(snapshot.to_string()))
}

/// [`VolumeBackend`] keeping all state in memory
///
/// With a mount root, mounting a volume creates `<root>/<volume name>` so
/// file-based configuration can be exercised without a real pool.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
    mount_root: Option<PathBuf>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mount_root(root: impl Into<PathBuf>) -> Self {
        Self {
            state: Mutex::default(),
            mount_root: Some(root.into()),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mountpoint(&self, name: &str) -> Option<PathBuf> {
        self.mount_root.as_ref().map(|root| root.join(name))
    }

    /// Register a pool together with its mounted root volume
    pub fn add_pool(&self, pool: &str) -> Result<()> {
        let mut state = self.state();
        state.pools.insert(pool.to_string());
        state.volumes.entry(pool.to_string()).or_insert_with(|| MemVolume {
            mounted: true,
            ..MemVolume::default()
        });
        drop(state);

        if let Some(path) = self.mountpoint(pool) {
            std::fs::create_dir_all(path)?;
        }
        Ok(())
    }

    /// Make every future promotion of `name` fail
    pub fn fail_promote(&self, name: &str) {
        self.state().fail_promote.insert(name.to_string());
    }

    /// Make every future clone into `target` fail
    pub fn fail_clone(&self, target: &str) {
        self.state().fail_clone.insert(target.to_string());
    }

    /// Make every future unmount of `name` fail
    pub fn fail_unmount(&self, name: &str) {
        self.state().fail_unmount.insert(name.to_string());
    }

    /// Make the next lookup of `name` fail
    pub fn fail_next_lookup(&self, name: &str) {
        self.state().fail_lookup.insert(name.to_string());
    }

    pub fn volume_names(&self) -> Vec<String> {
        self.state().volumes.keys().cloned().collect()
    }

    fn remove_mount_dir(&self, name: &str) {
        if let Some(path) = self.mountpoint(name)
            && path.exists()
            && let Err(e) = std::fs::remove_dir_all(&path)
        {
            debug!("Could not remove mount directory {}: {}", path.display(), e);
        }
    }

    fn create_mount_dir(&self, name: &str) -> Result<()> {
        if let Some(path) = self.mountpoint(name) {
            std::fs::create_dir_all(path)?;
        }
        Ok(())
    }
}

impl VolumeBackend for MemoryBackend {
    fn pool_exists(&self, pool: &str) -> Result<bool> {
        Ok(self.state().pools.contains(pool))
    }

    fn volume(&self, name: &str) -> Result<Option<VolumeInfo>> {
        let mut state = self.state();
        if state.fail_lookup.remove(name) {
            return Err(ZfsError::CommandFailed(format!("cannot list {name}: I/O error")));
        }
        Ok(state.volumes.get(name).map(|volume| VolumeInfo {
            name: name.to_string(),
            mountpoint: self.mountpoint(name),
            mounted: volume.mounted,
            origin: volume.origin.clone(),
        }))
    }

    fn children(&self, name: &str) -> Result<Vec<String>> {
        let state = self.state();
        state.get(name)?;
        Ok(state
            .volumes
            .keys()
            .filter(|key| parent_of(key) == Some(name))
            .cloned()
            .collect())
    }

    fn snapshots(&self, name: &str) -> Result<Vec<String>> {
        let state = self.state();
        Ok(state
            .get(name)?
            .snapshots
            .iter()
            .map(|s| format!("{name}@{}", s.name))
            .collect())
    }

    fn snapshot_exists(&self, snapshot: &str) -> Result<bool> {
        let (volume, name) = split_snapshot(snapshot)?;
        let state = self.state();
        Ok(state
            .volumes
            .get(volume)
            .is_some_and(|v| v.has_snapshot(name)))
    }

    fn create(&self, name: &str) -> Result<()> {
        if name.is_empty() || name.contains('@') {
            return Err(ZfsError::InvalidName(name.to_string()));
        }

        let mut state = self.state();
        let pool = name.split('/').next().unwrap_or(name);
        if !state.pools.contains(pool) {
            return Err(ZfsError::VolumeUnavailable(pool.to_string()));
        }
        if state.volumes.contains_key(name) {
            return Err(ZfsError::TargetExists(name.to_string()));
        }
        if let Some(parent) = parent_of(name)
            && !state.volumes.contains_key(parent)
        {
            return Err(ZfsError::VolumeUnavailable(parent.to_string()));
        }

        state.volumes.insert(name.to_string(), MemVolume::default());
        Ok(())
    }

    fn mount(&self, name: &str) -> Result<()> {
        self.state().get_mut(name)?.mounted = true;
        self.create_mount_dir(name)
    }

    fn unmount(&self, name: &str) -> Result<()> {
        let mut state = self.state();
        if state.fail_unmount.contains(name) {
            return Err(ZfsError::CommandFailed(format!("cannot unmount {name}: busy")));
        }
        let volume = state.get_mut(name)?;
        if !volume.mounted {
            return Err(ZfsError::CommandFailed(format!("{name} is not currently mounted")));
        }
        volume.mounted = false;
        Ok(())
    }

    fn snapshot(&self, snapshot: &str, recursive: bool) -> Result<()> {
        let (volume, name) = split_snapshot(snapshot)?;
        let mut state = self.state();
        state.get(volume)?;

        let targets = if recursive {
            state.subtree(volume)
        } else {
            vec![volume.to_string()]
        };

        for target in &targets {
            if state.get(target)?.has_snapshot(name) {
                return Err(ZfsError::CommandFailed(format!(
                    "snapshot {target}@{name} already exists"
                )));
            }
        }

        for target in &targets {
            state.get_mut(target)?.snapshots.push(MemSnapshot {
                name: name.to_string(),
                deferred: false,
            });
        }
        Ok(())
    }

    fn clone_snapshot(&self, snapshot: &str, target: &str) -> Result<()> {
        let (volume, name) = split_snapshot(snapshot)?;
        let mut state = self.state();

        if !state.get(volume)?.has_snapshot(name) {
            return Err(ZfsError::SnapshotNotFound(snapshot.to_string()));
        }
        if state.fail_clone.contains(target) {
            return Err(ZfsError::CommandFailed(format!("cannot create {target}: I/O error")));
        }
        if state.volumes.contains_key(target) {
            return Err(ZfsError::TargetExists(target.to_string()));
        }
        if let Some(parent) = parent_of(target)
            && !state.volumes.contains_key(parent)
        {
            return Err(ZfsError::VolumeUnavailable(parent.to_string()));
        }

        state.volumes.insert(
            target.to_string(),
            MemVolume {
                origin: Some(snapshot.to_string()),
                ..MemVolume::default()
            },
        );
        Ok(())
    }

    fn promote(&self, name: &str) -> Result<()> {
        let mut state = self.state();
        if state.fail_promote.contains(name) {
            return Err(ZfsError::CommandFailed(format!("cannot promote {name}: I/O error")));
        }

        let origin = state
            .get(name)?
            .origin
            .clone()
            .ok_or_else(|| ZfsError::CommandFailed(format!("{name} is not a cloned filesystem")))?;
        let (origin_volume, origin_snapshot) = split_snapshot(&origin)?;
        let (origin_volume, origin_snapshot) = (origin_volume.to_string(), origin_snapshot.to_string());

        let mut clone = state
            .volumes
            .remove(name)
            .ok_or_else(|| ZfsError::VolumeNotFound(name.to_string()))?;

        let result: Result<Vec<MemSnapshot>> = (|| {
            let source = state.get_mut(&origin_volume)?;
            let position = source
                .snapshots
                .iter()
                .position(|s| s.name == origin_snapshot)
                .ok_or_else(|| ZfsError::SnapshotNotFound(origin.clone()))?;

            if source.snapshots[..=position]
                .iter()
                .any(|s| clone.has_snapshot(&s.name))
            {
                return Err(ZfsError::CommandFailed(format!(
                    "cannot promote {name}: conflicting snapshot names"
                )));
            }

            let moved: Vec<MemSnapshot> = source.snapshots.drain(..=position).collect();
            clone.origin = source.origin.take();
            source.origin = Some(format!("{name}@{origin_snapshot}"));

            let mut snapshots = moved.clone();
            snapshots.append(&mut clone.snapshots);
            clone.snapshots = snapshots;

            Ok(moved)
        })();

        let moved = match result {
            Ok(moved) => moved,
            Err(e) => {
                state.volumes.insert(name.to_string(), clone);
                return Err(e);
            }
        };
        state.volumes.insert(name.to_string(), clone);

        // other clones of the moved snapshots now depend on the promoted volume
        for snapshot in &moved {
            let old = format!("{origin_volume}@{}", snapshot.name);
            let new = format!("{name}@{}", snapshot.name);
            for (volume_name, volume) in state.volumes.iter_mut() {
                if volume_name != &origin_volume && volume.origin.as_deref() == Some(old.as_str()) {
                    volume.origin = Some(new.clone());
                }
            }
        }

        Ok(())
    }

    fn destroy(&self, name: &str) -> Result<()> {
        let mut state = self.state();
        let volume = state.get(name)?;
        if !volume.snapshots.is_empty() {
            return Err(ZfsError::CommandFailed(format!("{name} has snapshots")));
        }
        if state.subtree(name).len() > 1 {
            return Err(ZfsError::CommandFailed(format!("{name} has children")));
        }

        let origin = state.volumes.remove(name).and_then(|volume| volume.origin);
        if let Some(origin) = origin {
            state.release_deferred(&origin);
        }
        drop(state);

        self.remove_mount_dir(name);
        Ok(())
    }

    fn destroy_snapshot(&self, snapshot: &str, recursive: bool) -> Result<()> {
        let (volume, name) = split_snapshot(snapshot)?;
        let mut state = self.state();
        if !state.get(volume)?.has_snapshot(name) {
            return Err(ZfsError::SnapshotNotFound(snapshot.to_string()));
        }

        let targets = if recursive {
            state.subtree(volume)
        } else {
            vec![volume.to_string()]
        };

        for target in targets {
            let full = format!("{target}@{name}");
            let has_clones = state.has_clones_of(&full);
            let volume = state.get_mut(&target)?;
            if has_clones {
                for s in volume.snapshots.iter_mut().filter(|s| s.name == name) {
                    s.deferred = true;
                }
            } else {
                volume.snapshots.retain(|s| s.name != name);
            }
        }
        Ok(())
    }

    fn rename_snapshot(&self, snapshot: &str, new_name: &str, recursive: bool) -> Result<()> {
        let (volume, name) = split_snapshot(snapshot)?;
        let mut state = self.state();
        if !state.get(volume)?.has_snapshot(name) {
            return Err(ZfsError::SnapshotNotFound(snapshot.to_string()));
        }

        let targets = if recursive {
            state.subtree(volume)
        } else {
            vec![volume.to_string()]
        };

        for target in targets {
            let old = format!("{target}@{name}");
            let new = format!("{target}@{new_name}");
            let volume = state.get_mut(&target)?;
            for s in volume.snapshots.iter_mut().filter(|s| s.name == name) {
                s.name = new_name.to_string();
            }
            for other in state.volumes.values_mut() {
                if other.origin.as_deref() == Some(old.as_str()) {
                    other.origin = Some(new.clone());
                }
            }
        }
        Ok(())
    }

    fn user_properties(&self, name: &str) -> Result<BTreeMap<String, String>> {
        Ok(self.state().get(name)?.properties.clone())
    }

    fn set_user_property(&self, name: &str, property: &str, value: &str) -> Result<()> {
        if !property.contains(':') {
            return Err(ZfsError::InvalidName(property.to_string()));
        }
        self.state()
            .get_mut(name)?
            .properties
            .insert(property.to_string(), value.to_string());
        Ok(())
    }

    fn clear_user_property(&self, name: &str, property: &str) -> Result<()> {
        self.state().get_mut(name)?.properties.remove(property);
        Ok(())
    }
}
