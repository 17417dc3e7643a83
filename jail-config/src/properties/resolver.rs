// SPDX-License-Identifier: GPL-3.0-only

//! DNS resolver configuration of a jail
//!
//! The stored value selects one of three methods: none-like values leave
//! the jail's `resolv.conf` alone, the host path copies the host file and
//! anything else is a `;` separated list of nameservers.

use std::any::Any;
use std::path::Path;

use tracing::{debug, info};

use super::special::{ApplyContext, NamedProperty, SpecialProperty};
use crate::error::{ConfigError, Result};
use crate::helpers::parse_none_with;
use crate::safe_path::resolve_within;
use jail_types::{EventKind, Value};

/// Stored value selecting the copy method, also the path inside the jail
pub const RESOLV_CONF: &str = "/etc/resolv.conf";

const NONE_WORDS: [&str; 4] = ["none", "-", "", "/dev/null"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverMethod {
    Skip,
    Copy,
    Manual,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolver {
    copy_from_host: bool,
    entries: Vec<String>,
}

impl Resolver {
    pub fn method(&self) -> ResolverMethod {
        if self.copy_from_host {
            ResolverMethod::Copy
        } else if self.entries.is_empty() {
            ResolverMethod::Skip
        } else {
            ResolverMethod::Manual
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn append(&mut self, nameserver: impl Into<String>) {
        self.copy_from_host = false;
        self.entries.push(nameserver.into());
    }

    /// Insert at `index`, or at the end when past it
    pub fn insert(&mut self, index: usize, nameserver: impl Into<String>) {
        self.copy_from_host = false;
        let index = index.min(self.entries.len());
        self.entries.insert(index, nameserver.into());
    }

    pub fn set_at(&mut self, index: usize, nameserver: impl Into<String>) -> Result<()> {
        let len = self.entries.len();
        let entry = self.entries.get_mut(index).ok_or_else(|| {
            ConfigError::invalid(Self::NAME, format!("index {index} out of range ({len} entries)"))
        })?;
        *entry = nameserver.into();
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Option<String> {
        (index < self.entries.len()).then(|| self.entries.remove(index))
    }

    /// Use the host's resolver configuration
    pub fn copy_from_host(&mut self) {
        self.entries.clear();
        self.copy_from_host = true;
    }

    /// Leave the jail's resolver configuration untouched
    pub fn clear(&mut self) {
        self.entries.clear();
        self.copy_from_host = false;
    }

    /// `resolv.conf` content for the manual method
    pub fn render(&self) -> String {
        let mut content: String = self
            .entries
            .iter()
            .map(|address| format!("nameserver {address}"))
            .collect::<Vec<_>>()
            .join("\n");
        content.push('\n');
        content
    }

    fn write_config(&self, ctx: &ApplyContext<'_>) -> Result<bool> {
        let target = resolve_within(ctx.root_path, Path::new(RESOLV_CONF))?;

        match self.method() {
            ResolverMethod::Skip => {
                debug!("resolv.conf of {} untouched", ctx.subject);
                return Ok(false);
            }
            ResolverMethod::Copy => {
                std::fs::copy(ctx.host_resolv_conf, &target)?;
                info!("Copied resolv.conf from host into {}", ctx.subject);
            }
            ResolverMethod::Manual => {
                std::fs::write(&target, self.render())?;
                info!("Wrote {} nameservers for {}", self.entries.len(), ctx.subject);
            }
        }
        Ok(true)
    }
}

impl NamedProperty for Resolver {
    const NAME: &'static str = "resolver";
}

impl SpecialProperty for Resolver {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn set(&mut self, raw: &Value) -> Result<()> {
        self.clear();

        if parse_none_with(raw, &NONE_WORDS) {
            return Ok(());
        }

        match raw {
            Value::String(s) if s == RESOLV_CONF => self.copy_from_host = true,
            Value::String(s) => {
                self.entries = s
                    .split(';')
                    .map(str::trim)
                    .filter(|entry| !entry.is_empty())
                    .map(ToString::to_string)
                    .collect();
            }
            Value::List(items) => self.entries = items.clone(),
            other => {
                return Err(ConfigError::invalid(
                    Self::NAME,
                    format!("expected a list or a ; separated string, found {}", other.type_name()),
                ));
            }
        }
        Ok(())
    }

    fn serialize(&self) -> Value {
        match self.method() {
            ResolverMethod::Skip => Value::Null,
            ResolverMethod::Copy => Value::from(RESOLV_CONF),
            ResolverMethod::Manual => Value::String(self.entries.join(";")),
        }
    }

    fn value(&self) -> Value {
        match self.method() {
            ResolverMethod::Manual => Value::List(self.entries.clone()),
            _ => self.serialize(),
        }
    }

    fn apply(&self, ctx: &ApplyContext<'_>) -> Result<()> {
        ctx.events.begin(EventKind::ResolverConfig, ctx.subject);
        match self.write_config(ctx) {
            Ok(true) => {
                ctx.events.end(EventKind::ResolverConfig, ctx.subject);
                Ok(())
            }
            Ok(false) => {
                ctx.events.skip(EventKind::ResolverConfig, ctx.subject);
                Ok(())
            }
            Err(e) => {
                ctx.events.fail(EventKind::ResolverConfig, ctx.subject, &e);
                Err(e)
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use jail_types::{Event, EventSink, EventState};

    #[derive(Default)]
    struct Collect(Mutex<Vec<Event>>);

    impl EventSink for Collect {
        fn emit(&self, event: &Event) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    fn resolver(raw: Value) -> Resolver {
        let mut resolver = Resolver::default();
        resolver.set(&raw).unwrap();
        resolver
    }

    #[test]
    fn method_follows_stored_value() {
        assert_eq!(resolver(Value::Null).method(), ResolverMethod::Skip);
        assert_eq!(resolver(Value::from("/dev/null")).method(), ResolverMethod::Skip);
        assert_eq!(resolver(Value::from(RESOLV_CONF)).method(), ResolverMethod::Copy);

        let manual = resolver(Value::from("1.1.1.1; 9.9.9.9"));
        assert_eq!(manual.method(), ResolverMethod::Manual);
        assert_eq!(manual.entries(), ["1.1.1.1", "9.9.9.9"]);
        assert_eq!(manual.serialize(), Value::from("1.1.1.1;9.9.9.9"));
    }

    #[test]
    fn rejects_non_textual_values() {
        let mut resolver = Resolver::default();
        assert!(matches!(
            resolver.set(&Value::Int(4)),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn list_edits_switch_to_manual() {
        let mut resolver = resolver(Value::from(RESOLV_CONF));
        resolver.append("8.8.8.8");
        resolver.insert(0, "1.1.1.1");
        resolver.set_at(1, "8.8.4.4").unwrap();
        assert!(resolver.set_at(5, "x").is_err());

        assert_eq!(resolver.method(), ResolverMethod::Manual);
        assert_eq!(resolver.render(), "nameserver 1.1.1.1\nnameserver 8.8.4.4\n");

        assert_eq!(resolver.remove(0).as_deref(), Some("1.1.1.1"));
        assert_eq!(resolver.remove(3), None);
    }

    #[test]
    fn apply_writes_manual_entries_inside_root() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("etc")).unwrap();
        let events = Collect::default();
        let ctx = ApplyContext {
            subject: "web",
            root_path: root.path(),
            host_resolv_conf: Path::new("/nonexistent"),
            events: &events,
        };

        resolver(Value::from("10.0.0.1")).apply(&ctx).unwrap();
        let content = std::fs::read_to_string(root.path().join("etc/resolv.conf")).unwrap();
        assert_eq!(content, "nameserver 10.0.0.1\n");

        let states: Vec<EventState> = events.0.lock().unwrap().iter().map(|e| e.state.clone()).collect();
        assert_eq!(states, vec![EventState::Begin, EventState::End]);
    }

    #[test]
    fn apply_copies_host_file() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("etc")).unwrap();
        let host = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(host.path(), "nameserver 192.0.2.1\n").unwrap();
        let events = Collect::default();
        let ctx = ApplyContext {
            subject: "web",
            root_path: root.path(),
            host_resolv_conf: host.path(),
            events: &events,
        };

        resolver(Value::from(RESOLV_CONF)).apply(&ctx).unwrap();
        let content = std::fs::read_to_string(root.path().join("etc/resolv.conf")).unwrap();
        assert_eq!(content, "nameserver 192.0.2.1\n");
    }

    #[test]
    fn skip_emits_skip_event() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("etc")).unwrap();
        let events = Collect::default();
        let ctx = ApplyContext {
            subject: "web",
            root_path: root.path(),
            host_resolv_conf: Path::new("/nonexistent"),
            events: &events,
        };

        Resolver::default().apply(&ctx).unwrap();
        assert!(!root.path().join("etc/resolv.conf").exists());
        let events = events.0.lock().unwrap();
        assert_eq!(events.last().map(|e| e.state.clone()), Some(EventState::Skip));
    }

    #[cfg(unix)]
    #[test]
    fn apply_refuses_escaping_symlink() {
        let root = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), root.path().join("etc")).unwrap();
        let events = Collect::default();
        let ctx = ApplyContext {
            subject: "web",
            root_path: root.path(),
            host_resolv_conf: Path::new("/nonexistent"),
            events: &events,
        };

        let err = resolver(Value::from("10.0.0.1")).apply(&ctx).unwrap_err();
        assert!(matches!(err, ConfigError::PathEscape(_)));
        assert!(!outside.path().join("resolv.conf").exists());
        assert!(matches!(
            events.0.lock().unwrap().last().map(|e| e.state.clone()),
            Some(EventState::Fail(_))
        ));
    }
}
