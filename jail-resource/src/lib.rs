// SPDX-License-Identifier: GPL-3.0-only

//! Resources pair one configuration with one volume
//!
//! - [`Resource`]: a jail configuration persisted next to (or on) its volume
//! - [`DefaultsResource`]: user defaults shared by all jails of a root volume
//! - [`list_resources`]: enumerate the jails below a parent volume

pub mod binding;
pub mod defaults;
pub mod error;
pub mod filter;
pub mod resource;
pub mod storage;

pub use binding::VolumeBinding;
pub use defaults::DefaultsResource;
pub use error::{ResourceError, Result};
pub use filter::{MatchAll, ResourceFilter};
pub use resource::{Resource, list_resources};
pub use storage::ConfigStorage;
