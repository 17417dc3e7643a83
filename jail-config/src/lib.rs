// SPDX-License-Identifier: GPL-3.0-only

//! Layered jail configuration
//!
//! A [`JailConfig`] resolves properties from user data stored in a
//! [`ValueStore`] over the [`DefaultsConfig`] table. The [`format`] module
//! persists that data as JSON, UCL or volume user properties.

pub mod defaults;
pub mod engine;
pub mod error;
pub mod format;
pub mod helpers;
pub mod host_params;
pub mod properties;
pub mod safe_path;
pub mod settings;
pub mod store;

pub use defaults::DefaultsConfig;
pub use engine::{JailConfig, SpecialGuard};
pub use error::{ConfigError, Result};
pub use format::{ConfigFormat, JsonFile, UclFile, ZfsProperties};
pub use host_params::HostParams;
pub use properties::{
    ApplyContext, Depends, Interfaces, Ipv4Addresses, Ipv4Defaultrouter, Ipv6Addresses,
    Ipv6Defaultrouter, NamedProperty, Resolver, ResolverMethod, ResourceLimit, SpecialProperty,
};
pub use safe_path::resolve_within;
pub use settings::Settings;
pub use store::ValueStore;
