// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use jail_config::{JailConfig, Settings};
use jail_resource::{DefaultsResource, MatchAll, Resource, ResourceError, ResourceFilter, list_resources};
use jail_types::{ConfigType, Value};
use jail_zfs::{MemoryBackend, VolumeBackend, VolumeManager};
use tempfile::TempDir;

struct Pool {
    _dir: TempDir,
    backend: Arc<MemoryBackend>,
    manager: VolumeManager,
}

fn pool() -> Pool {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MemoryBackend::with_mount_root(dir.path()));
    backend.add_pool("tank").unwrap();
    let manager = VolumeManager::new(backend.clone());
    Pool {
        _dir: dir,
        backend,
        manager,
    }
}

fn resource(pool: &Pool, volume: &str) -> Resource {
    Resource::new(pool.manager.clone(), volume, Settings::default())
}

#[test]
fn new_resources_use_json_and_round_trip() {
    let pool = pool();
    let mut jail = resource(&pool, "tank/jails/web");
    jail.create().unwrap();
    assert!(jail.exists());
    assert_eq!(jail.config_type().unwrap(), ConfigType::Json);

    jail.config_mut().set("id", "web", false).unwrap();
    jail.config_mut().set("release", "14.1-RELEASE", false).unwrap();
    jail.config_mut().set("vnet", true, false).unwrap();
    jail.save().unwrap();

    let config_file = jail.config_file().unwrap().unwrap();
    assert!(config_file.ends_with("tank/jails/web/config.json"));
    assert!(config_file.is_file());

    let mut reread = resource(&pool, "tank/jails/web");
    assert_eq!(reread.config_type().unwrap(), ConfigType::Json);
    reread.load_config(false).unwrap();
    assert_eq!(reread.config().get("id").unwrap(), Value::from("web"));
    assert_eq!(reread.config().get("release").unwrap(), Value::from("14.1-RELEASE"));
    assert_eq!(reread.config().get("vnet").unwrap(), Value::Bool(true));
}

#[cfg(unix)]
#[test]
fn created_volumes_are_private() {
    use std::os::unix::fs::PermissionsExt;

    let pool = pool();
    let jail = resource(&pool, "tank/jails/web");
    jail.create().unwrap();
    let mode = std::fs::metadata(jail.abspath("").unwrap()).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o700);
}

#[test]
fn config_type_is_detected_once() {
    let pool = pool();
    let jail = resource(&pool, "tank/jails/old");
    jail.create().unwrap();
    std::fs::write(jail.abspath("config").unwrap(), "release = \"11.2-RELEASE\";\n").unwrap();

    assert_eq!(jail.config_type().unwrap(), ConfigType::Ucl);
    std::fs::write(jail.abspath("config.json").unwrap(), "{}").unwrap();
    assert_eq!(jail.config_type().unwrap(), ConfigType::Ucl);

    let fresh = resource(&pool, "tank/jails/old");
    assert_eq!(fresh.config_type().unwrap(), ConfigType::Json);
}

#[test]
fn legacy_ucl_configs_load_as_legacy() {
    let pool = pool();
    let mut jail = resource(&pool, "tank/jails/old");
    jail.create().unwrap();
    std::fs::write(
        jail.abspath("config").unwrap(),
        "host_hostname = \"old\";\ntype = \"basejail\";\n",
    )
    .unwrap();

    jail.load_config(false).unwrap();
    assert!(jail.config().is_legacy());
    assert_eq!(jail.config().get("basejail").unwrap(), Value::Bool(true));
    assert!(jail.config_file().unwrap().unwrap().ends_with("old/config"));
}

#[test]
fn volume_property_configs() {
    let pool = pool();
    let mut jail = resource(&pool, "tank/jails/db").with_config_type(ConfigType::Zfs);
    jail.create().unwrap();
    jail.config_mut().set("id", "db", false).unwrap();
    jail.config_mut().set("boot", true, false).unwrap();
    jail.save().unwrap();

    assert_eq!(jail.config_file().unwrap(), None);
    let properties = pool.backend.user_properties("tank/jails/db").unwrap();
    assert_eq!(properties["org.freebsd.iocage:boot"], "on");

    let mut reread = resource(&pool, "tank/jails/db");
    assert_eq!(reread.config_type().unwrap(), ConfigType::Zfs);
    reread.load_config(false).unwrap();
    assert_eq!(reread.config().get("boot").unwrap(), Value::Bool(true));
}

#[test]
fn auto_config_type_still_detects() {
    let pool = pool();
    let jail = resource(&pool, "tank/jails/web").with_config_type(ConfigType::Auto);
    jail.create().unwrap();
    std::fs::write(jail.abspath("config").unwrap(), "").unwrap();
    assert_eq!(jail.config_type().unwrap(), ConfigType::Ucl);
}

#[test]
fn missing_volumes_default_to_json() {
    let pool = pool();
    let jail = resource(&pool, "tank/jails/ghost");
    assert!(!jail.exists());
    assert_eq!(jail.config_type().unwrap(), ConfigType::Json);
    assert!(matches!(jail.read_config(), Err(ResourceError::Storage(_))));
}

#[test]
fn defaults_live_next_to_the_jails() {
    let pool = pool();
    pool.manager.create_volume("tank/iocage").unwrap();

    let mut defaults = DefaultsResource::new(pool.manager.clone(), "tank/iocage", &Settings::default());
    defaults.defaults_mut().set("boot", true);
    defaults.defaults_mut().set("priority", 5);
    defaults.save().unwrap();

    let mut reread = DefaultsResource::new(pool.manager.clone(), "tank/iocage", &Settings::default());
    assert_eq!(reread.config_type().unwrap(), ConfigType::Json);
    reread.load_config().unwrap();

    let config = JailConfig::with_defaults(reread.shared());
    assert_eq!(config.get("boot").unwrap(), Value::Bool(true));
    assert_eq!(config.get("priority").unwrap(), Value::Int(5));
}

#[test]
fn defaults_in_volume_properties_use_a_hidden_volume() {
    let pool = pool();
    pool.manager.create_volume("tank/iocage").unwrap();

    let mut defaults = DefaultsResource::new(pool.manager.clone(), "tank/iocage", &Settings::default())
        .with_config_type(ConfigType::Zfs);
    defaults.defaults_mut().set("boot", true);
    defaults.save().unwrap();
    assert!(pool.manager.volume_exists("tank/iocage/.defaults").unwrap());

    let mut reread = DefaultsResource::new(pool.manager.clone(), "tank/iocage", &Settings::default());
    assert_eq!(reread.config_type().unwrap(), ConfigType::Zfs);
    reread.load_config().unwrap();
    assert!(!reread.defaults().exclusive_user_data().contains("legacy"));
    assert_eq!(reread.defaults().effective("boot"), Some(Value::Bool(true)));
}

#[test]
fn paths_outside_the_volume_are_refused() {
    let pool = pool();
    let jail = resource(&pool, "tank/jails/web");
    jail.create().unwrap();
    std::fs::create_dir_all(jail.abspath("root/etc").unwrap()).unwrap();

    let inside = jail.require_relative_path("root/etc/rc.conf").unwrap();
    assert!(inside.ends_with("web/root/etc/rc.conf"));
    let absolute = jail.abspath("root/etc").unwrap();
    assert!(jail.require_relative_path(&absolute).is_ok());

    assert!(matches!(
        jail.require_relative_path("../other"),
        Err(ResourceError::PathEscape(_))
    ));
    assert!(matches!(
        jail.require_relative_path("/etc/passwd"),
        Err(ResourceError::PathEscape(_))
    ));
}

#[cfg(unix)]
#[test]
fn symlinks_cannot_leave_the_volume() {
    let pool = pool();
    let jail = resource(&pool, "tank/jails/web");
    jail.create().unwrap();
    let outside = tempfile::tempdir().unwrap();
    std::os::unix::fs::symlink(outside.path(), jail.abspath("escape").unwrap()).unwrap();

    assert!(matches!(
        jail.require_relative_path("escape/file"),
        Err(ResourceError::PathEscape(_))
    ));
}

#[test]
fn resolver_is_applied_to_the_jail_root() {
    let pool = pool();
    let mut jail = resource(&pool, "tank/jails/web");
    jail.create().unwrap();
    std::fs::create_dir_all(jail.root_path().unwrap().join("etc")).unwrap();

    jail.config_mut().set("resolver", "192.0.2.53;192.0.2.54", false).unwrap();
    jail.apply_special_properties().unwrap();

    let written = std::fs::read_to_string(jail.root_path().unwrap().join("etc/resolv.conf")).unwrap();
    assert_eq!(written, "nameserver 192.0.2.53\nnameserver 192.0.2.54\n");
}

struct NamePrefix(&'static str);

impl ResourceFilter for NamePrefix {
    fn matches_key(&self, key: &str, value: &str) -> bool {
        key != "name" || value.starts_with(self.0)
    }

    fn matches_resource(&self, resource: &Resource) -> bool {
        matches!(resource.config().get("boot"), Ok(Value::Bool(true)))
    }
}

#[test]
fn listing_skips_hidden_volumes_and_applies_filters() {
    let pool = pool();
    for (name, boot) in [("web1", true), ("web2", false), ("db", true)] {
        let mut jail = resource(&pool, &format!("tank/jails/{name}"));
        jail.create().unwrap();
        jail.config_mut().set("id", name, false).unwrap();
        jail.config_mut().set("boot", boot, false).unwrap();
        jail.save().unwrap();
    }
    pool.manager.create_volume("tank/jails/.hidden").unwrap();

    let mut all: Vec<String> = list_resources(&pool.manager, "tank/jails", &Settings::default(), &MatchAll)
        .unwrap()
        .iter()
        .map(|r| r.name().to_string())
        .collect();
    all.sort();
    assert_eq!(all, ["db", "web1", "web2"]);

    let booting = list_resources(&pool.manager, "tank/jails", &Settings::default(), &NamePrefix("web")).unwrap();
    assert_eq!(booting.len(), 1);
    assert_eq!(booting[0].config().get("id").unwrap(), Value::from("web1"));
}

#[test]
fn ids_follow_the_volume_name() {
    let pool = pool();
    let web = resource(&pool, "tank/jails/web");
    web.create().unwrap();
    web.save().unwrap();

    // a sibling claiming the same id is refused
    let mut other = resource(&pool, "tank/jails/other");
    other.create().unwrap();
    assert_eq!(other.config().get("id").unwrap(), Value::from("other"));
    other.config_mut().set("id", "web", false).unwrap();
    assert!(matches!(other.save(), Err(ResourceError::Config(_))));
    assert!(!other.abspath("config.json").unwrap().exists());

    std::fs::write(other.abspath("config.json").unwrap(), r#"{"id": "web"}"#).unwrap();
    let mut reread = resource(&pool, "tank/jails/other");
    assert!(matches!(reread.load_config(false), Err(ResourceError::Config(_))));

    // no stored id: the volume name stands in, host_hostname included
    let mut plain = resource(&pool, "tank/jails/plain");
    plain.create().unwrap();
    std::fs::write(plain.abspath("config.json").unwrap(), r#"{"boot": true}"#).unwrap();
    plain.load_config(false).unwrap();
    assert_eq!(plain.config().get("id").unwrap(), Value::from("plain"));
    assert_eq!(plain.config().get("host_hostname").unwrap(), Value::from("plain"));
}

#[test]
fn listing_skips_unreadable_configs() {
    let pool = pool();
    let good = resource(&pool, "tank/jails/good");
    good.create().unwrap();
    good.save().unwrap();

    let broken = resource(&pool, "tank/jails/broken");
    broken.create().unwrap();
    std::fs::write(broken.abspath("config.json").unwrap(), "{ not json").unwrap();

    let listed = list_resources(&pool.manager, "tank/jails", &Settings::default(), &MatchAll).unwrap();
    let names: Vec<&str> = listed.iter().map(Resource::name).collect();
    assert_eq!(names, ["good"]);
}

#[test]
fn destroy_removes_the_volume() {
    let pool = pool();
    let jail = resource(&pool, "tank/jails/web");
    jail.create().unwrap();
    pool.manager.create_volume("tank/jails/web/root").unwrap();

    jail.destroy().unwrap();
    assert!(!jail.exists());
    assert!(!pool.manager.volume_exists("tank/jails/web/root").unwrap());
    assert!(!pool.manager.volume_exists("tank/jails/web").unwrap());
}
