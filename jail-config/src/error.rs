// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use jail_zfs::ZfsError;
use thiserror::Error;

/// Error types for configuration handling
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown config property: {0}")]
    UnknownProperty(String),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Config property not found: {0}")]
    NotFound(String),

    #[error("Path escapes its root: {}", .0.display())]
    PathEscape(PathBuf),

    #[error("Failed to parse {format} config: {reason}")]
    Parse { format: &'static str, reason: String },

    #[error("Applying configuration aborted after {} keys: {source}", completed.len())]
    BatchAborted {
        completed: Vec<String>,
        source: Box<ConfigError>,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] ZfsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;
