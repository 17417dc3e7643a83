// SPDX-License-Identifier: GPL-3.0-only

//! Property registries consulted by [`JailConfig`](crate::JailConfig)
//!
//! - accessors: getter/setter pairs for derived and legacy compatible values
//! - special properties: values backed by small stateful objects

pub mod accessors;
pub mod addresses;
pub mod defaultrouter;
pub mod depends;
pub mod interfaces;
pub mod resolver;
pub mod resource_limit;
pub mod special;

pub use accessors::accessor_names;
pub use addresses::{AddressFamily, Addresses, Ipv4, Ipv4Addresses, Ipv6, Ipv6Addresses};
pub use defaultrouter::{Defaultrouter, Ipv4Defaultrouter, Ipv6Defaultrouter};
pub use depends::Depends;
pub use interfaces::Interfaces;
pub use resolver::{Resolver, ResolverMethod};
pub use resource_limit::{Limit, RESOURCE_LIMITS, ResourceLimit, is_resource_limit};
pub use special::{
    ApplyContext, NamedProperty, SpecialProperty, is_special_property, special_property_names,
};
