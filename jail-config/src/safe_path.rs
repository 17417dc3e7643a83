// SPDX-License-Identifier: GPL-3.0-only

use std::path::{Component, Path, PathBuf};

use crate::error::{ConfigError, Result};

/// Resolve `relative` below `root`, following symlinks, and refuse any
/// result outside of `root`
///
/// The target itself may not exist yet; its parent directory must.
pub fn resolve_within(root: &Path, relative: &Path) -> Result<PathBuf> {
    let root = root.canonicalize()?;
    let relative: PathBuf = relative
        .components()
        .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
        .collect();
    let candidate = root.join(&relative);

    let resolved = match candidate.canonicalize() {
        Ok(path) => path,
        Err(_) if candidate.is_symlink() => {
            // dangling link; its destination cannot be checked
            return Err(ConfigError::PathEscape(candidate));
        }
        Err(_) => {
            let parent = candidate
                .parent()
                .ok_or_else(|| ConfigError::PathEscape(candidate.clone()))?
                .canonicalize()?;
            let name = candidate
                .file_name()
                .ok_or_else(|| ConfigError::PathEscape(candidate.clone()))?;
            parent.join(name)
        }
    };

    if !resolved.starts_with(&root) {
        return Err(ConfigError::PathEscape(resolved));
    }
    Ok(resolved)
}
