// SPDX-License-Identifier: GPL-3.0-only

use std::sync::{Arc, Mutex};

use jail_types::{Event, EventKind, EventSink, EventState};
use jail_zfs::{DestroyOptions, MemoryBackend, VolumeBackend, VolumeManager, ZfsError};

#[derive(Default)]
struct Recorder(Mutex<Vec<Event>>);

impl EventSink for Recorder {
    fn emit(&self, event: &Event) {
        self.0.lock().unwrap().push(event.clone());
    }
}

fn manager() -> (Arc<MemoryBackend>, VolumeManager) {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_pool("tank").unwrap();
    let manager = VolumeManager::new(backend.clone());
    (backend, manager)
}

fn origin(backend: &MemoryBackend, volume: &str) -> Option<String> {
    backend.volume(volume).unwrap().unwrap().origin
}

#[test]
fn clone_then_destroy_leaves_source_untouched() {
    let (backend, manager) = manager();
    manager.create_volume("tank/releases/13.2/root").unwrap();
    backend.snapshot("tank/releases/13.2@p1", true).unwrap();

    let before_names = backend.volume_names();
    let before_snapshots = backend.snapshots("tank/releases/13.2").unwrap();
    let before_root_snapshots = backend.snapshots("tank/releases/13.2/root").unwrap();

    manager
        .clone_volume("tank/releases/13.2", "tank/jails/web", false)
        .unwrap();
    manager
        .destroy_volume("tank/jails/web", DestroyOptions::default())
        .unwrap();
    manager
        .destroy_volume("tank/jails", DestroyOptions::default())
        .unwrap();

    assert_eq!(backend.volume_names(), before_names);
    assert_eq!(backend.snapshots("tank/releases/13.2").unwrap(), before_snapshots);
    assert_eq!(
        backend.snapshots("tank/releases/13.2/root").unwrap(),
        before_root_snapshots
    );
}

#[test]
fn clone_reuses_nothing_after_completion() {
    let (backend, manager) = manager();
    manager.create_volume("tank/template").unwrap();

    manager
        .clone_volume("tank/template", "tank/jail1", false)
        .unwrap();
    manager
        .clone_volume("tank/template", "tank/jail2", false)
        .unwrap();
    manager
        .destroy_volume("tank/jail1", DestroyOptions::default())
        .unwrap();
    manager
        .destroy_volume("tank/jail2", DestroyOptions::default())
        .unwrap();

    assert!(backend.snapshots("tank/template").unwrap().is_empty());
}

#[test]
fn failed_promotion_rolls_back_whole_chain() {
    let (backend, manager) = manager();
    manager.create_volume("tank/template/b/c").unwrap();
    manager
        .clone_volume("tank/template", "tank/a", false)
        .unwrap();

    let before_b = origin(&backend, "tank/a/b");
    let before_c = origin(&backend, "tank/a/b/c");
    assert!(before_b.is_some());
    assert!(before_c.is_some());

    backend.fail_promote("tank/a");
    let err = manager.promote_volume("tank/a").unwrap_err();

    match err {
        ZfsError::PromotionFailed {
            volume,
            rolled_back,
            rollback_failures,
            ..
        } => {
            assert_eq!(volume, "tank/a");
            assert_eq!(rolled_back, vec!["tank/a/b", "tank/a/b/c"]);
            assert!(rollback_failures.is_empty());
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(origin(&backend, "tank/a/b"), before_b);
    assert_eq!(origin(&backend, "tank/a/b/c"), before_c);
}

#[test]
fn lookup_failure_mid_chain_rolls_back() {
    let (backend, manager) = manager();
    manager.create_volume("tank/template/b/c").unwrap();
    manager
        .clone_volume("tank/template", "tank/a", false)
        .unwrap();
    let before_c = origin(&backend, "tank/a/b/c");

    // c is promoted first, then reading b fails
    backend.fail_next_lookup("tank/a/b");
    let err = manager.promote_volume("tank/a").unwrap_err();

    match err {
        ZfsError::PromotionFailed {
            volume,
            rolled_back,
            rollback_failures,
            source,
        } => {
            assert_eq!(volume, "tank/a/b");
            assert_eq!(rolled_back, vec!["tank/a/b/c"]);
            assert!(rollback_failures.is_empty());
            assert!(matches!(*source, ZfsError::CommandFailed(_)));
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(origin(&backend, "tank/a/b/c"), before_c);
    assert!(origin(&backend, "tank/a/b").is_some());
}

#[test]
fn lookup_failure_before_any_promotion_is_returned_as_is() {
    let (backend, manager) = manager();
    manager.create_volume("tank/template/b").unwrap();
    manager
        .clone_volume("tank/template", "tank/a", false)
        .unwrap();

    backend.fail_next_lookup("tank/a/b");
    let err = manager.promote_volume("tank/a").unwrap_err();
    assert!(matches!(err, ZfsError::CommandFailed(_)));
    assert!(origin(&backend, "tank/a").is_some());
}

#[test]
fn promotion_detaches_clones_and_is_idempotent() {
    let (backend, manager) = manager();
    manager.create_volume("tank/template/root").unwrap();
    manager
        .clone_volume("tank/template", "tank/jail", false)
        .unwrap();

    let promoted = manager.promote_volume("tank/jail").unwrap();
    assert_eq!(promoted, vec!["tank/jail/root", "tank/jail"]);
    assert_eq!(origin(&backend, "tank/jail"), None);
    assert_eq!(origin(&backend, "tank/jail/root"), None);

    // the template now depends on the promoted jail
    assert!(
        origin(&backend, "tank/template")
            .is_some_and(|o| o.starts_with("tank/jail@clone"))
    );

    assert!(manager.promote_volume("tank/jail").unwrap().is_empty());
}

#[test]
fn lifecycle_operations_emit_begin_and_end() {
    let (_, manager) = manager();
    let recorder = Arc::new(Recorder::default());
    let manager = manager.with_events(recorder.clone());

    manager.create_volume("tank/x").unwrap();
    manager
        .destroy_volume("tank/x", DestroyOptions::default())
        .unwrap();
    assert!(manager.create_volume("void/x").is_err());

    let events = recorder.0.lock().unwrap();
    let states: Vec<(EventKind, &EventState)> =
        events.iter().map(|e| (e.kind, &e.state)).collect();
    assert_eq!(states.len(), 6);
    assert_eq!(states[0], (EventKind::VolumeCreate, &EventState::Begin));
    assert_eq!(states[1], (EventKind::VolumeCreate, &EventState::End));
    assert_eq!(states[2], (EventKind::VolumeDestroy, &EventState::Begin));
    assert_eq!(states[3], (EventKind::VolumeDestroy, &EventState::End));
    assert!(matches!(states[5].1, EventState::Fail(_)));
}
