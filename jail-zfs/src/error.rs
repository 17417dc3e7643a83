// SPDX-License-Identifier: GPL-3.0-only

use thiserror::Error;

/// Error types for volume lifecycle operations
#[derive(Error, Debug)]
pub enum ZfsError {
    #[error("Volume already exists: {0}")]
    TargetExists(String),

    #[error("Failed to clone into {target} ({} volumes cloned before the failure): {source}", cloned.len())]
    CloneFailed {
        target: String,
        cloned: Vec<String>,
        source: Box<ZfsError>,
    },

    #[error("Promotion of {volume} failed, {} promotions rolled back: {source}", rolled_back.len())]
    PromotionFailed {
        volume: String,
        rolled_back: Vec<String>,
        rollback_failures: Vec<String>,
        source: Box<ZfsError>,
    },

    #[error("Pool or parent volume unavailable: {0}")]
    VolumeUnavailable(String),

    #[error("Volume not found: {0}")]
    VolumeNotFound(String),

    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(String),

    #[error("Invalid volume name: {0}")]
    InvalidName(String),

    #[error("Command execution failed: {0}")]
    CommandFailed(String),

    #[error("Required tool not found: {0}")]
    ToolMissing(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for volume operations
pub type Result<T> = std::result::Result<T, ZfsError>;
