// SPDX-License-Identifier: GPL-3.0-only

//! Jail parameter names recognized by the host kernel

use std::collections::BTreeSet;
use std::process::Command;

use tracing::debug;
use which::which;

use crate::error::{ConfigError, Result};

const SYSCTL_PREFIX: &str = "security.jail.param.";

/// Set of kernel jail parameters, stored in config key form
/// (`allow.mount.zfs` becomes `allow_mount_zfs`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostParams {
    names: BTreeSet<String>,
}

fn normalize(name: &str) -> String {
    name.replace('.', "_")
}

impl HostParams {
    /// An empty registry; only defaults and accessors make keys known
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names.into_iter().map(|n| normalize(n.as_ref())).collect(),
        }
    }

    /// Query `sysctl -N security.jail.param`
    pub fn from_sysctl() -> Result<Self> {
        let sysctl = which("sysctl")
            .map_err(|_| ConfigError::invalid("sysctl", "tool not found in PATH"))?;

        let output = Command::new(sysctl)
            .args(["-N", "security.jail.param"])
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ConfigError::invalid("security.jail.param", stderr.trim().to_string()));
        }

        let params = Self::parse_sysctl_names(&String::from_utf8_lossy(&output.stdout));
        debug!("Host supports {} jail parameters", params.len());
        Ok(params)
    }

    /// Parameter leaves from `sysctl -N` output; nodes end with a dot
    pub fn parse_sysctl_names(output: &str) -> Self {
        Self::from_names(
            output
                .lines()
                .map(str::trim)
                .filter(|line| !line.ends_with('.'))
                .filter_map(|line| line.strip_prefix(SYSCTL_PREFIX)),
        )
    }

    pub fn contains(&self, key: &str) -> bool {
        self.names.contains(&normalize(key))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sysctl_listing() {
        let output = "security.jail.param.allow.\n\
                      security.jail.param.allow.mount.\n\
                      security.jail.param.allow.mount.zfs\n\
                      security.jail.param.host.hostname\n\
                      security.jail.param.securelevel\n";

        let params = HostParams::parse_sysctl_names(output);
        assert_eq!(params.len(), 3);
        assert!(params.contains("allow_mount_zfs"));
        assert!(params.contains("host.hostname"));
        assert!(!params.contains("allow_mount"));
    }
}
