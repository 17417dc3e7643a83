// SPDX-License-Identifier: GPL-3.0-only

//! Multi-step volume operations
//!
//! [`VolumeManager`] sequences backend primitives into the lifecycle
//! operations jails need: create with ancestors, subtree clone through a
//! temporary snapshot, recursive promote with rollback and recursive destroy.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::backend::VolumeBackend;
use crate::error::{Result, ZfsError};
use crate::snapshot::append_snapshot_datetime;
use jail_types::{EventKind, EventSink, NullSink, VolumeInfo, snapshot_parts};

/// Options for [`VolumeManager::destroy_volume`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DestroyOptions {
    /// Delete the volume's snapshots before the volume itself
    pub delete_snapshots: bool,
    /// Delete the snapshot the volume was cloned from once the volume is gone
    pub delete_origin_snapshot: bool,
}

impl Default for DestroyOptions {
    fn default() -> Self {
        Self {
            delete_snapshots: true,
            delete_origin_snapshot: false,
        }
    }
}

#[derive(Clone)]
pub struct VolumeManager {
    backend: Arc<dyn VolumeBackend>,
    events: Arc<dyn EventSink>,
}

impl VolumeManager {
    pub fn new(backend: Arc<dyn VolumeBackend>) -> Self {
        Self {
            backend,
            events: Arc::new(NullSink),
        }
    }

    /// Report lifecycle progress to `events`
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn backend(&self) -> &dyn VolumeBackend {
        self.backend.as_ref()
    }

    pub fn events(&self) -> &Arc<dyn EventSink> {
        &self.events
    }

    /// Name of the pool holding `name`, failing when the pool is not imported
    pub fn get_pool(&self, name: &str) -> Result<String> {
        let pool = name.split('/').next().unwrap_or(name);
        if !self.backend.pool_exists(pool)? {
            return Err(ZfsError::VolumeUnavailable(pool.to_string()));
        }
        Ok(pool.to_string())
    }

    pub fn get_volume(&self, name: &str) -> Result<VolumeInfo> {
        self.backend
            .volume(name)?
            .ok_or_else(|| ZfsError::VolumeNotFound(name.to_string()))
    }

    pub fn volume_exists(&self, name: &str) -> Result<bool> {
        Ok(self.backend.volume(name)?.is_some())
    }

    /// Create and mount a volume, creating missing ancestors on the way
    pub fn create_volume(&self, name: &str) -> Result<VolumeInfo> {
        self.events.begin(EventKind::VolumeCreate, name);
        match self.create_with_ancestors(name) {
            Ok(info) => {
                self.events.end(EventKind::VolumeCreate, name);
                Ok(info)
            }
            Err(e) => {
                self.events.fail(EventKind::VolumeCreate, name, &e);
                Err(e)
            }
        }
    }

    fn create_with_ancestors(&self, name: &str) -> Result<VolumeInfo> {
        let pool = self.get_pool(name)?;
        if self.volume_exists(name)? {
            return Err(ZfsError::TargetExists(name.to_string()));
        }

        let mut current = pool;
        for component in name.split('/').skip(1) {
            current = format!("{current}/{component}");
            if self.volume_exists(&current)? {
                continue;
            }
            debug!("Creating volume {}", current);
            self.backend.create(&current)?;
            self.backend.mount(&current)?;
        }

        info!("Created volume {}", name);
        self.get_volume(name)
    }

    pub fn get_or_create_volume(&self, name: &str) -> Result<VolumeInfo> {
        match self.backend.volume(name)? {
            Some(info) => Ok(info),
            None => self.create_volume(name),
        }
    }

    /// All descendants of `name`, parents before their children
    pub fn children_recursive(&self, name: &str) -> Result<Vec<String>> {
        let mut result = Vec::new();
        for child in self.backend.children(name)? {
            let descendants = self.children_recursive(&child)?;
            result.push(child);
            result.extend(descendants);
        }
        Ok(result)
    }

    /// Clone `source` and its whole subtree to `target`
    ///
    /// A recursive snapshot named `clone<UTC timestamp>` is taken, or reused
    /// when it already exists. A snapshot created here is deleted again
    /// whether or not cloning succeeded. Returns the created volumes.
    pub fn clone_volume(
        &self,
        source: &str,
        target: &str,
        delete_existing: bool,
    ) -> Result<Vec<String>> {
        self.events.begin(EventKind::VolumeClone, target);
        match self.clone_volume_inner(source, target, delete_existing) {
            Ok(cloned) => {
                self.events.end(EventKind::VolumeClone, target);
                Ok(cloned)
            }
            Err(e) => {
                self.events.fail(EventKind::VolumeClone, target, &e);
                Err(e)
            }
        }
    }

    fn clone_volume_inner(
        &self,
        source: &str,
        target: &str,
        delete_existing: bool,
    ) -> Result<Vec<String>> {
        self.get_volume(source)?;

        if let Some(existing) = self.backend.volume(target)? {
            if !delete_existing {
                return Err(ZfsError::TargetExists(target.to_string()));
            }
            info!("Deleting existing volume {}", target);
            self.destroy_volume(&existing.name, DestroyOptions::default())?;
        }

        let snapshot = format!("{source}@{}", append_snapshot_datetime("clone"));
        let created_snapshot = if self.backend.snapshot_exists(&snapshot)? {
            debug!("Reusing snapshot {}", snapshot);
            false
        } else {
            self.backend.snapshot(&snapshot, true)?;
            true
        };

        let result = self.clone_snapshot(&snapshot, target);

        if created_snapshot {
            debug!("Deleting temporary snapshot {}", snapshot);
            if let Err(e) = self.backend.destroy_snapshot(&snapshot, true) {
                warn!("Could not delete temporary snapshot {}: {}", snapshot, e);
                if result.is_ok() {
                    return Err(e);
                }
            }
        }

        let cloned = result?;
        info!("Cloned {} to {}", source, target);
        Ok(cloned)
    }

    /// Clone every snapshot with the same name in the snapshot's subtree to
    /// the matching relative path below `target`, mounting each clone
    pub fn clone_snapshot(&self, snapshot: &str, target: &str) -> Result<Vec<String>> {
        let (source, snapshot_name) =
            snapshot_parts(snapshot).ok_or_else(|| ZfsError::InvalidName(snapshot.to_string()))?;

        if !self.backend.snapshot_exists(snapshot)? {
            return Err(ZfsError::SnapshotNotFound(snapshot.to_string()));
        }

        let mut volumes = vec![source.to_string()];
        volumes.extend(self.children_recursive(source)?);

        let mut cloned = Vec::new();
        for volume in volumes {
            let current_snapshot = format!("{volume}@{snapshot_name}");
            if !self.backend.snapshot_exists(&current_snapshot)? {
                continue;
            }

            let relative = volume[source.len()..].trim_start_matches('/');
            let current_target = if relative.is_empty() {
                target.to_string()
            } else {
                format!("{target}/{relative}")
            };

            if let Err(e) = self.clone_and_mount(&current_snapshot, &current_target) {
                return Err(ZfsError::CloneFailed {
                    target: current_target,
                    cloned,
                    source: Box::new(e),
                });
            }
            cloned.push(current_target);
        }

        Ok(cloned)
    }

    fn clone_and_mount(&self, snapshot: &str, target: &str) -> Result<()> {
        debug!("Cloning snapshot {} to {}", snapshot, target);
        if let Some((parent, _)) = target.rsplit_once('/') {
            self.get_or_create_volume(parent)?;
        }
        self.backend.clone_snapshot(snapshot, target)?;
        self.backend.mount(target)
    }

    /// Promote a volume and every descendant clone, deepest first
    ///
    /// Volumes without an origin are skipped. If one promotion fails, the
    /// promotions already done are reverted in reverse order by promoting
    /// their former origins, then [`ZfsError::PromotionFailed`] is returned.
    /// Reverting is best effort: failures are collected in the error.
    pub fn promote_volume(&self, name: &str) -> Result<Vec<String>> {
        let mut volumes = self.children_recursive(name)?;
        volumes.reverse();
        volumes.push(name.to_string());

        // (promoted volume, origin it had before)
        let mut promoted: Vec<(String, String)> = Vec::new();

        for volume in volumes {
            let info = match self.get_volume(&volume) {
                Ok(info) => info,
                Err(e) if promoted.is_empty() => return Err(e),
                Err(e) => return Err(self.abort_promotion(volume, &promoted, e)),
            };
            let Some(origin) = info.origin else {
                debug!("{} is already promoted", volume);
                self.events.skip(EventKind::VolumePromote, &volume);
                continue;
            };

            self.events.begin(EventKind::VolumePromote, &volume);
            match self.backend.promote(&volume) {
                Ok(()) => {
                    self.events.end(EventKind::VolumePromote, &volume);
                    promoted.push((volume, origin));
                }
                Err(e) => {
                    self.events.fail(EventKind::VolumePromote, &volume, &e);
                    return Err(self.abort_promotion(volume, &promoted, e));
                }
            }
        }

        Ok(promoted.into_iter().map(|(volume, _)| volume).collect())
    }

    /// Revert `promoted` after a failure at `volume`
    fn abort_promotion(&self, volume: String, promoted: &[(String, String)], source: ZfsError) -> ZfsError {
        warn!("Promotion of {} failed, reverting changes", volume);
        let (rolled_back, rollback_failures) = self.revert_promotions(promoted);
        ZfsError::PromotionFailed {
            volume,
            rolled_back,
            rollback_failures,
            source: Box::new(source),
        }
    }

    fn revert_promotions(&self, promoted: &[(String, String)]) -> (Vec<String>, Vec<String>) {
        let mut rolled_back = Vec::new();
        let mut failures = Vec::new();

        for (volume, origin) in promoted.iter().rev() {
            let Some((origin_volume, _)) = snapshot_parts(origin) else {
                failures.push(format!("{volume}: invalid origin {origin}"));
                continue;
            };

            match self.backend.promote(origin_volume) {
                Ok(()) => {
                    debug!("Reverted promotion of {}", volume);
                    rolled_back.push(volume.clone());
                }
                Err(e) => {
                    warn!("Could not revert promotion of {}: {}", volume, e);
                    failures.push(format!("{volume}: {e}"));
                }
            }
        }

        (rolled_back, failures)
    }

    /// Destroy a volume after its children and, optionally, its snapshots
    ///
    /// Unmount failures are ignored. Children are always destroyed with
    /// default options.
    pub fn destroy_volume(&self, name: &str, options: DestroyOptions) -> Result<()> {
        self.events.begin(EventKind::VolumeDestroy, name);
        match self.destroy_recursive(name, options) {
            Ok(()) => {
                self.events.end(EventKind::VolumeDestroy, name);
                Ok(())
            }
            Err(e) => {
                self.events.fail(EventKind::VolumeDestroy, name, &e);
                Err(e)
            }
        }
    }

    fn destroy_recursive(&self, name: &str, options: DestroyOptions) -> Result<()> {
        let info = self.get_volume(name)?;

        for child in self.backend.children(name)? {
            self.destroy_recursive(&child, DestroyOptions::default())?;
        }

        if options.delete_snapshots {
            for snapshot in self.backend.snapshots(name)? {
                debug!("Deleting snapshot {}", snapshot);
                self.backend.destroy_snapshot(&snapshot, true)?;
            }
        }

        if let Err(e) = self.backend.unmount(name) {
            debug!("Ignoring unmount failure of {}: {}", name, e);
        }

        debug!("Deleting volume {}", name);
        self.backend.destroy(name)?;

        if options.delete_origin_snapshot
            && let Some(origin) = info.origin
            && self.backend.snapshot_exists(&origin)?
        {
            debug!("Deleting origin snapshot {}", origin);
            self.backend.destroy_snapshot(&origin, false)?;
        }

        Ok(())
    }

    /// Rename a snapshot on the volume and all descendants having it
    pub fn rename_snapshot_recursive(&self, snapshot: &str, new_name: &str) -> Result<()> {
        if !self.backend.snapshot_exists(snapshot)? {
            return Err(ZfsError::SnapshotNotFound(snapshot.to_string()));
        }
        self.backend.rename_snapshot(snapshot, new_name, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;

    fn setup() -> (Arc<MemoryBackend>, VolumeManager) {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_pool("tank").unwrap();
        let manager = VolumeManager::new(backend.clone());
        (backend, manager)
    }

    #[test]
    fn create_volume_creates_ancestors_and_mounts() {
        let (backend, manager) = setup();
        let info = manager.create_volume("tank/iocage/jails/web").unwrap();

        assert!(info.mounted);
        assert!(backend.volume("tank/iocage").unwrap().is_some());
        assert!(backend.volume("tank/iocage/jails").unwrap().unwrap().mounted);
        assert!(matches!(
            manager.create_volume("tank/iocage/jails/web"),
            Err(ZfsError::TargetExists(_))
        ));
    }

    #[test]
    fn create_volume_requires_pool() {
        let (_, manager) = setup();
        assert!(matches!(
            manager.create_volume("missing/jails"),
            Err(ZfsError::VolumeUnavailable(pool)) if pool == "missing"
        ));
    }

    #[test]
    fn children_recursive_is_preorder() {
        let (_, manager) = setup();
        manager.create_volume("tank/a/b/c").unwrap();
        manager.create_volume("tank/a/d").unwrap();

        assert_eq!(
            manager.children_recursive("tank/a").unwrap(),
            vec!["tank/a/b", "tank/a/b/c", "tank/a/d"]
        );
    }

    #[test]
    fn clone_volume_preserves_subtree_shape() {
        let (backend, manager) = setup();
        manager.create_volume("tank/releases/13.2/root").unwrap();

        let cloned = manager
            .clone_volume("tank/releases/13.2", "tank/jails/web", false)
            .unwrap();

        assert_eq!(cloned, vec!["tank/jails/web", "tank/jails/web/root"]);
        let root = backend.volume("tank/jails/web/root").unwrap().unwrap();
        assert!(root.mounted);
        assert!(
            root.origin
                .as_deref()
                .is_some_and(|o| o.starts_with("tank/releases/13.2/root@clone"))
        );
    }

    #[test]
    fn clone_volume_refuses_existing_target() {
        let (_, manager) = setup();
        manager.create_volume("tank/src").unwrap();
        manager.create_volume("tank/dst").unwrap();

        assert!(matches!(
            manager.clone_volume("tank/src", "tank/dst", false),
            Err(ZfsError::TargetExists(_))
        ));
        assert!(manager.clone_volume("tank/src", "tank/dst", true).is_ok());
    }

    #[test]
    fn failed_clone_reports_partial_progress_and_cleans_snapshot() {
        let (backend, manager) = setup();
        manager.create_volume("tank/src/child").unwrap();
        backend.fail_clone("tank/dst/child");

        let err = manager.clone_volume("tank/src", "tank/dst", false).unwrap_err();
        match err {
            ZfsError::CloneFailed { target, cloned, .. } => {
                assert_eq!(target, "tank/dst/child");
                assert_eq!(cloned, vec!["tank/dst"]);
            }
            other => panic!("unexpected error: {other}"),
        }

        // the snapshot still backing tank/dst is only marked for deletion
        manager
            .destroy_volume("tank/dst", DestroyOptions::default())
            .unwrap();
        assert!(backend.snapshots("tank/src").unwrap().is_empty());
        assert!(backend.snapshots("tank/src/child").unwrap().is_empty());
    }

    #[test]
    fn promote_skips_volumes_without_origin() {
        let (_, manager) = setup();
        manager.create_volume("tank/plain/child").unwrap();
        assert!(manager.promote_volume("tank/plain").unwrap().is_empty());
    }

    #[test]
    fn destroy_volume_removes_children_and_snapshots() {
        let (backend, manager) = setup();
        manager.create_volume("tank/a/b").unwrap();
        backend.snapshot("tank/a@s1", true).unwrap();

        manager
            .destroy_volume("tank/a", DestroyOptions::default())
            .unwrap();
        assert_eq!(backend.volume_names(), vec!["tank"]);
    }

    #[test]
    fn destroy_volume_deletes_origin_snapshot_last() {
        let (backend, manager) = setup();
        manager.create_volume("tank/src").unwrap();
        backend.snapshot("tank/src@base", false).unwrap();
        manager.clone_snapshot("tank/src@base", "tank/dst").unwrap();

        manager
            .destroy_volume(
                "tank/dst",
                DestroyOptions {
                    delete_snapshots: true,
                    delete_origin_snapshot: true,
                },
            )
            .unwrap();
        assert!(!backend.snapshot_exists("tank/src@base").unwrap());
    }

    #[test]
    fn destroy_tolerates_unmount_failure() {
        let (backend, manager) = setup();
        manager.create_volume("tank/busy").unwrap();
        backend.fail_unmount("tank/busy");

        manager
            .destroy_volume("tank/busy", DestroyOptions::default())
            .unwrap();
        assert!(!manager.volume_exists("tank/busy").unwrap());
    }

    #[test]
    fn rename_snapshot_recursive_renames_descendants() {
        let (backend, manager) = setup();
        manager.create_volume("tank/a/b").unwrap();
        backend.snapshot("tank/a@old", true).unwrap();

        manager.rename_snapshot_recursive("tank/a@old", "new").unwrap();
        assert!(backend.snapshot_exists("tank/a/b@new").unwrap());
        assert!(!backend.snapshot_exists("tank/a/b@old").unwrap());
    }
}
