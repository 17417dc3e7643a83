// SPDX-License-Identifier: GPL-3.0-only

//! Volume lifecycle library for jail resources
//!
//! This library provides create, snapshot-based clone, recursive promote and
//! recursive destroy of copy-on-write volumes. The operations are written
//! against the [`VolumeBackend`] trait so they can drive the real `zfs` tool
//! ([`ZfsCli`]) or the in-process [`MemoryBackend`].

pub mod backend;
pub mod cli;
pub mod error;
pub mod manager;
pub mod memory;
pub mod snapshot;

// Re-export commonly used types
pub use backend::VolumeBackend;
pub use cli::ZfsCli;
pub use error::{Result, ZfsError};
pub use manager::{DestroyOptions, VolumeManager};
pub use memory::MemoryBackend;
pub use snapshot::append_snapshot_datetime;

// Re-export shared models
pub use jail_types::{VolumeInfo, snapshot_parts};
