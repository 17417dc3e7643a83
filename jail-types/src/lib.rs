// SPDX-License-Identifier: GPL-3.0-only

//! Canonical domain models for jail configuration and volume management
//!
//! These types are shared by every layer of the stack:
//!
//! - **jail-zfs**: reports [`VolumeInfo`] and emits [`Event`]s from lifecycle operations
//! - **jail-config**: stores configuration as [`Value`]s and persists them per [`ConfigType`]
//! - **jail-resource**: ties a configuration to its backing volume

pub mod config_type;
pub mod event;
pub mod value;
pub mod volume;

pub use config_type::ConfigType;
pub use event::{Event, EventKind, EventSink, EventState, NullSink, TracingSink};
pub use value::Value;
pub use volume::{VolumeInfo, snapshot_parts};
