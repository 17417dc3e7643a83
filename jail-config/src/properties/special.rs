// SPDX-License-Identifier: GPL-3.0-only

use std::any::Any;
use std::fmt;
use std::path::Path;

use super::addresses::{Ipv4Addresses, Ipv6Addresses};
use super::defaultrouter::{Ipv4Defaultrouter, Ipv6Defaultrouter};
use super::depends::Depends;
use super::interfaces::Interfaces;
use super::resolver::Resolver;
use super::resource_limit::{RESOURCE_LIMITS, ResourceLimit};
use crate::error::Result;
use jail_types::{EventSink, Value};

/// What a special property may touch when applied to a live resource
pub struct ApplyContext<'a> {
    /// Resource name used in events and log messages
    pub subject: &'a str,
    /// Root directory of the jail
    pub root_path: &'a Path,
    /// Host file the resolver copies from
    pub host_resolv_conf: &'a Path,
    pub events: &'a dyn EventSink,
}

/// A configuration value backed by a small stateful object
///
/// The object is parsed from the stored raw value and serialized back into
/// the store after every mutation.
pub trait SpecialProperty: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Replace the whole state from a raw stored or user supplied value
    fn set(&mut self, raw: &Value) -> Result<()>;

    /// Form written into the value store
    fn serialize(&self) -> Value;

    /// Form returned to readers of the property
    fn value(&self) -> Value;

    /// Side effects on a running resource; most properties have none
    fn apply(&self, _ctx: &ApplyContext<'_>) -> Result<()> {
        Ok(())
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Concrete special property types, addressable by type
pub trait NamedProperty: SpecialProperty + Default + 'static {
    const NAME: &'static str;
}

type Constructor = fn() -> Box<dyn SpecialProperty>;

fn construct<P: NamedProperty>() -> Box<dyn SpecialProperty> {
    Box::new(P::default())
}

static REGISTRY: &[(&str, Constructor)] = &[
    (Ipv4Addresses::NAME, construct::<Ipv4Addresses>),
    (Ipv6Addresses::NAME, construct::<Ipv6Addresses>),
    (Interfaces::NAME, construct::<Interfaces>),
    (Ipv4Defaultrouter::NAME, construct::<Ipv4Defaultrouter>),
    (Ipv6Defaultrouter::NAME, construct::<Ipv6Defaultrouter>),
    (Resolver::NAME, construct::<Resolver>),
    (Depends::NAME, construct::<Depends>),
];

pub fn is_special_property(name: &str) -> bool {
    REGISTRY.iter().any(|(n, _)| *n == name) || RESOURCE_LIMITS.contains(&name)
}

/// Registered names followed by the resource limits
pub fn special_property_names() -> impl Iterator<Item = &'static str> {
    REGISTRY
        .iter()
        .map(|(n, _)| *n)
        .chain(RESOURCE_LIMITS.iter().copied())
}

/// Fresh, empty instance of the named property
pub fn create(name: &str) -> Option<Box<dyn SpecialProperty>> {
    if let Some((_, constructor)) = REGISTRY.iter().find(|(n, _)| *n == name) {
        return Some(constructor());
    }
    RESOURCE_LIMITS
        .iter()
        .find(|limit| **limit == name)
        .map(|limit| Box::new(ResourceLimit::new(*limit)) as Box<dyn SpecialProperty>)
}

/// Instance of the named property loaded from a raw value
pub fn load(name: &str, raw: &Value) -> Option<Result<Box<dyn SpecialProperty>>> {
    create(name).map(|mut property| property.set(raw).map(|()| property))
}
