// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use jail_config::ConfigError;
use jail_zfs::ZfsError;
use thiserror::Error;

/// Error types for resource operations
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] ZfsError),

    #[error("Path is outside of the resource: {}", .0.display())]
    PathEscape(PathBuf),

    #[error("Volume {0} has no mountpoint")]
    NotMounted(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for resource operations
pub type Result<T> = std::result::Result<T, ResourceError>;
