// SPDX-License-Identifier: GPL-3.0-only

//! Getter and setter table for properties with derived or legacy values
//!
//! A getter returning `Ok(None)` means "not configured"; the engine then
//! falls back to the defaults. Setters receive values after
//! [`parse_user_input`](crate::helpers::parse_user_input).

use tracing::debug;

use crate::engine::JailConfig;
use crate::error::{ConfigError, Result};
use crate::helpers::{
    StringStyle, invalid_identifier_chars, is_uuid, parse_bool, parse_int, parse_list, parse_none,
    to_string,
};
use jail_types::Value;

pub(crate) type Getter = fn(&JailConfig) -> Result<Option<Value>>;
pub(crate) type Setter = fn(&mut JailConfig, Value) -> Result<()>;

pub(crate) struct Accessor {
    pub name: &'static str,
    pub get: Option<Getter>,
    pub set: Option<Setter>,
}

const fn both(name: &'static str, get: Getter, set: Setter) -> Accessor {
    Accessor {
        name,
        get: Some(get),
        set: Some(set),
    }
}

const fn getter(name: &'static str, get: Getter) -> Accessor {
    Accessor {
        name,
        get: Some(get),
        set: None,
    }
}

static ACCESSORS: &[Accessor] = &[
    both("id", get_id, set_id),
    both("name", get_id, set_id),
    both("uuid", get_id, set_id),
    both("type", get_type, set_type),
    both("priority", get_priority, set_priority),
    both("tag", get_tag, set_tag),
    both("tags", get_tags, set_tags),
    both("vnet_interfaces", get_vnet_interfaces, set_vnet_interfaces),
    both("exec_clean", get_exec_clean, set_exec_clean),
    both("basejail", get_basejail, set_basejail),
    both("clonejail", get_clonejail, set_clonejail),
    both("template", get_template, set_template),
    both("vnet", get_vnet, set_vnet),
    both("jail_zfs", get_jail_zfs, set_jail_zfs),
    both("jail_zfs_dataset", get_jail_zfs_dataset, set_jail_zfs_dataset),
    both("cloned_release", get_cloned_release, set_cloned_release),
    getter("basejail_type", get_basejail_type),
    both("login_flags", get_login_flags, set_login_flags),
    getter("host_hostuuid", get_host_hostuuid),
    getter("host_hostname", get_host_hostname),
    getter("host_domainname", get_host_domainname),
    getter("enforce_statfs", get_enforce_statfs),
    getter("allow_mount", get_allow_mount),
    both("legacy", get_legacy, set_legacy),
    both("mount_devfs", get_mount_devfs, set_mount_devfs),
    both("mount_fdescfs", get_mount_fdescfs, set_mount_fdescfs),
];

pub(crate) fn accessor(name: &str) -> Option<&'static Accessor> {
    ACCESSORS.iter().find(|a| a.name == name)
}

pub fn accessor_names() -> impl Iterator<Item = &'static str> {
    ACCESSORS.iter().map(|a| a.name)
}

/// User value, ignoring unset and none-like entries
fn configured(config: &JailConfig, key: &str) -> Option<Value> {
    config.get_raw(key).filter(|value| !parse_none(value))
}

fn flag(config: &JailConfig, key: &str) -> bool {
    config
        .effective_raw(key)
        .as_ref()
        .and_then(parse_bool)
        .unwrap_or(false)
}

fn require_bool(key: &str, value: &Value) -> Result<bool> {
    parse_bool(value)
        .ok_or_else(|| ConfigError::invalid(key, format!("expected a boolean, found {value}")))
}

fn on_off(enabled: bool) -> Value {
    Value::from(if enabled { "on" } else { "off" })
}

fn unique(items: Vec<String>) -> Vec<String> {
    let mut seen = Vec::with_capacity(items.len());
    for item in items {
        if !seen.contains(&item) {
            seen.push(item);
        }
    }
    seen
}

fn get_id(config: &JailConfig) -> Result<Option<Value>> {
    Ok(config.get_raw("id"))
}

fn set_id(config: &mut JailConfig, value: Value) -> Result<()> {
    let name = match value {
        Value::Null => {
            config.data.set("id", Value::Null);
            return Ok(());
        }
        Value::String(s) => s,
        Value::Int(i) => i.to_string(),
        other => {
            return Err(ConfigError::invalid(
                "id",
                format!("expected a name, found {}", other.type_name()),
            ));
        }
    };

    let invalid = invalid_identifier_chars(&name);
    if !invalid.is_empty() {
        let chars: String = invalid.into_iter().collect();
        return Err(ConfigError::invalid(
            "id",
            format!("{name:?} contains invalid characters {chars:?}"),
        ));
    }
    if name.is_empty() {
        return Err(ConfigError::invalid("id", "the name must not be empty"));
    }
    if is_uuid(&name) {
        debug!("Jail id {name} is a UUID");
    }

    config.data.set("id", Value::String(name));
    Ok(())
}

fn get_type(config: &JailConfig) -> Result<Option<Value>> {
    let kind = if flag(config, "basejail") {
        "basejail"
    } else if flag(config, "clonejail") {
        "clonejail"
    } else {
        "jail"
    };
    Ok(Some(Value::from(kind)))
}

fn set_type(config: &mut JailConfig, value: Value) -> Result<()> {
    match value.as_str() {
        Some("basejail") => {
            config.data.set("basejail", Value::Bool(true));
            config.data.set("clonejail", Value::Bool(false));
            config.data.set("type", Value::from("jail"));
        }
        Some("clonejail") => {
            config.data.set("basejail", Value::Bool(false));
            config.data.set("clonejail", Value::Bool(true));
            config.data.set("type", Value::from("jail"));
        }
        _ => config.data.set("type", value),
    }
    Ok(())
}

fn get_priority(config: &JailConfig) -> Result<Option<Value>> {
    Ok(config.get_raw("priority").as_ref().and_then(parse_int).map(Value::Int))
}

fn set_priority(config: &mut JailConfig, value: Value) -> Result<()> {
    let priority = parse_int(&value)
        .ok_or_else(|| ConfigError::invalid("priority", format!("expected an integer, found {value}")))?;
    config.data.set("priority", Value::Int(priority));
    Ok(())
}

/// Tag stored under the deprecated single `tag` key
fn legacy_tag(config: &JailConfig) -> Option<String> {
    configured(config, "tag").map(|tag| to_string(&tag, StringStyle::DISPLAY))
}

fn tag_list(config: &JailConfig) -> Vec<String> {
    let mut tags = config.get_raw("tags").map(|t| parse_list(&t)).unwrap_or_default();
    tags.extend(legacy_tag(config));
    unique(tags)
}

fn get_tag(config: &JailConfig) -> Result<Option<Value>> {
    let tag = legacy_tag(config).or_else(|| tag_list(config).into_iter().next());
    Ok(Some(Value::from(tag)))
}

fn set_tag(config: &mut JailConfig, value: Value) -> Result<()> {
    if legacy_tag(config).is_some() || !config.data.contains("tags") {
        config.data.set("tag", value);
        return Ok(());
    }

    let tag = to_string(&value, StringStyle::DISPLAY);
    let mut tags = tag_list(config);
    tags.retain(|t| *t != tag);
    tags.insert(0, tag);
    config.data.set("tags", Value::List(tags));
    Ok(())
}

fn get_tags(config: &JailConfig) -> Result<Option<Value>> {
    Ok(Some(Value::List(tag_list(config))))
}

fn set_tags(config: &mut JailConfig, value: Value) -> Result<()> {
    config.data.set("tags", Value::List(unique(parse_list(&value))));
    if config.data.contains("tag") {
        config.data.delete("tag")?;
    }
    Ok(())
}

fn get_vnet_interfaces(config: &JailConfig) -> Result<Option<Value>> {
    Ok(config.get_raw("vnet_interfaces").map(|v| Value::List(parse_list(&v))))
}

fn set_vnet_interfaces(config: &mut JailConfig, value: Value) -> Result<()> {
    config.data.set("vnet_interfaces", Value::List(parse_list(&value)));
    Ok(())
}

fn get_exec_clean(config: &JailConfig) -> Result<Option<Value>> {
    let raw = config.effective_raw("exec_clean");
    Ok(Some(Value::Bool(raw.as_ref().and_then(parse_int) == Some(1))))
}

fn set_exec_clean(config: &mut JailConfig, value: Value) -> Result<()> {
    let enabled = match &value {
        Value::Bool(b) => *b,
        other => parse_int(other).ok_or_else(|| {
            ConfigError::invalid("exec_clean", format!("expected 0 or 1, found {other}"))
        })? == 1,
    };
    config.data.set("exec_clean", Value::Int(i64::from(enabled)));
    Ok(())
}

fn get_basejail(config: &JailConfig) -> Result<Option<Value>> {
    Ok(Some(Value::Bool(flag(config, "basejail"))))
}

fn set_basejail(config: &mut JailConfig, value: Value) -> Result<()> {
    let enabled = require_bool("basejail", &value)?;
    config.data.set("basejail", Value::Bool(enabled));
    Ok(())
}

fn get_clonejail(config: &JailConfig) -> Result<Option<Value>> {
    Ok(Some(Value::Bool(flag(config, "clonejail"))))
}

fn set_clonejail(config: &mut JailConfig, value: Value) -> Result<()> {
    let enabled = require_bool("clonejail", &value)?;
    config.data.set("clonejail", Value::Bool(enabled));
    Ok(())
}

fn get_template(config: &JailConfig) -> Result<Option<Value>> {
    Ok(Some(Value::Bool(flag(config, "template"))))
}

fn set_template(config: &mut JailConfig, value: Value) -> Result<()> {
    let enabled = require_bool("template", &value)?;
    config.data.set("template", Value::Bool(enabled));
    Ok(())
}

fn get_vnet(config: &JailConfig) -> Result<Option<Value>> {
    Ok(Some(Value::Bool(flag(config, "vnet"))))
}

fn set_vnet(config: &mut JailConfig, value: Value) -> Result<()> {
    let enabled = require_bool("vnet", &value)?;
    config.data.set("vnet", on_off(enabled));
    Ok(())
}

fn get_jail_zfs(config: &JailConfig) -> Result<Option<Value>> {
    Ok(Some(Value::Bool(flag(config, "jail_zfs"))))
}

fn set_jail_zfs(config: &mut JailConfig, value: Value) -> Result<()> {
    if parse_none(&value) {
        if config.data.contains("jail_zfs") {
            config.data.delete("jail_zfs")?;
        }
        return Ok(());
    }
    let enabled = require_bool("jail_zfs", &value)?;
    config.data.set("jail_zfs", on_off(enabled));
    Ok(())
}

fn get_jail_zfs_dataset(config: &JailConfig) -> Result<Option<Value>> {
    let datasets = match config.get_raw("jail_zfs_dataset") {
        Some(Value::String(s)) => s.split_whitespace().map(ToString::to_string).collect(),
        Some(other) => parse_list(&other),
        None => Vec::new(),
    };
    Ok(Some(Value::List(datasets)))
}

fn set_jail_zfs_dataset(config: &mut JailConfig, value: Value) -> Result<()> {
    let joined = match value {
        Value::Null => String::new(),
        Value::List(items) => items.join(" "),
        other => to_string(&other, StringStyle::DISPLAY),
    };
    config.data.set("jail_zfs_dataset", Value::String(joined));
    Ok(())
}

fn get_cloned_release(config: &JailConfig) -> Result<Option<Value>> {
    if let Some(release) = config.get_raw("cloned_release") {
        return Ok(Some(release));
    }
    match config.get("release")? {
        release @ Value::String(_) => Ok(Some(release)),
        _ => Ok(Some(Value::Null)),
    }
}

fn set_cloned_release(config: &mut JailConfig, value: Value) -> Result<()> {
    config.set("release", value.clone(), false)?;
    if value.is_null() {
        if config.data.contains("cloned_release") {
            config.data.delete("cloned_release")?;
        }
    } else {
        config.data.set("cloned_release", value);
    }
    Ok(())
}

fn get_basejail_type(config: &JailConfig) -> Result<Option<Value>> {
    if let Some(explicit) = config.get_raw("basejail_type") {
        return Ok(Some(explicit));
    }
    if flag(config, "basejail") {
        let inferred = if config.is_legacy() { "zfs" } else { "nullfs" };
        return Ok(Some(Value::from(inferred)));
    }
    Ok(None)
}

fn get_login_flags(config: &JailConfig) -> Result<Option<Value>> {
    let flags = match config.get_raw("login_flags") {
        Some(Value::String(s)) => s.split_whitespace().map(ToString::to_string).collect(),
        Some(Value::List(items)) => items,
        _ => vec!["-f".to_string(), "root".to_string()],
    };
    Ok(Some(Value::List(flags)))
}

fn set_login_flags(config: &mut JailConfig, value: Value) -> Result<()> {
    match value {
        Value::Null => {
            if config.data.contains("login_flags") {
                config.data.delete("login_flags")?;
            }
        }
        Value::List(items) => config.data.set("login_flags", Value::String(items.join(" "))),
        value @ Value::String(_) => config.data.set("login_flags", value),
        other => {
            return Err(ConfigError::invalid(
                "login_flags",
                format!("expected a list or string, found {}", other.type_name()),
            ));
        }
    }
    Ok(())
}

/// Configured value, else the jail's id
fn or_id(config: &JailConfig, key: &str) -> Result<Option<Value>> {
    match configured(config, key) {
        Some(value) => Ok(Some(Value::String(to_string(&value, StringStyle::DISPLAY)))),
        None => Ok(Some(config.get("id")?)),
    }
}

fn get_host_hostuuid(config: &JailConfig) -> Result<Option<Value>> {
    or_id(config, "host_hostuuid")
}

fn get_host_hostname(config: &JailConfig) -> Result<Option<Value>> {
    or_id(config, "host_hostname")
}

fn get_host_domainname(config: &JailConfig) -> Result<Option<Value>> {
    Ok(config
        .get_raw("host_domainname")
        .map(|v| Value::String(to_string(&v, StringStyle::DISPLAY))))
}

/// Explicit integer, else `1` while any `allow_mount_*` is enabled
fn mount_dependent(config: &JailConfig, key: &str) -> Result<Option<Value>> {
    if let Some(value) = config.get_raw(key) {
        return Ok(parse_int(&value).map(Value::Int));
    }
    Ok(config.has_mounts_enabled().then_some(Value::Int(1)))
}

fn get_enforce_statfs(config: &JailConfig) -> Result<Option<Value>> {
    mount_dependent(config, "enforce_statfs")
}

fn get_allow_mount(config: &JailConfig) -> Result<Option<Value>> {
    mount_dependent(config, "allow_mount")
}

fn get_legacy(config: &JailConfig) -> Result<Option<Value>> {
    Ok(config.get_raw("legacy").as_ref().and_then(parse_bool).map(Value::Bool))
}

fn set_legacy(config: &mut JailConfig, value: Value) -> Result<()> {
    if parse_none(&value) {
        if config.data.contains("legacy") {
            config.data.delete("legacy")?;
        }
        return Ok(());
    }
    let legacy = require_bool("legacy", &value)?;
    config.data.set("legacy", Value::Bool(legacy));
    Ok(())
}

fn mount_flag(config: &JailConfig, key: &str) -> Result<Option<Value>> {
    Ok(Some(Value::Int(i64::from(flag(config, key)))))
}

fn set_mount_flag(config: &mut JailConfig, key: &str, value: Value) -> Result<()> {
    let enabled = require_bool(key, &value)?;
    config.data.set(key, Value::from(if enabled { "1" } else { "0" }));
    Ok(())
}

fn get_mount_devfs(config: &JailConfig) -> Result<Option<Value>> {
    mount_flag(config, "mount_devfs")
}

fn set_mount_devfs(config: &mut JailConfig, value: Value) -> Result<()> {
    set_mount_flag(config, "mount_devfs", value)
}

fn get_mount_fdescfs(config: &JailConfig) -> Result<Option<Value>> {
    mount_flag(config, "mount_fdescfs")
}

fn set_mount_fdescfs(config: &mut JailConfig, value: Value) -> Result<()> {
    set_mount_flag(config, "mount_fdescfs", value)
}
