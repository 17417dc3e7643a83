// SPDX-License-Identifier: GPL-3.0-only

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Persisted representation of a resource configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigType {
    /// Structured JSON document next to the volume's data
    Json,
    /// Legacy UCL document written by older tooling
    Ucl,
    /// One prefixed user property per key, directly on the volume
    Zfs,
    /// Not yet determined; resolved by probing the other three in order
    #[default]
    Auto,
}

impl ConfigType {
    /// Detection order used when resolving [`ConfigType::Auto`]
    pub const DETECTION_ORDER: [ConfigType; 3] = [ConfigType::Json, ConfigType::Ucl, ConfigType::Zfs];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigType::Json => "json",
            ConfigType::Ucl => "ucl",
            ConfigType::Zfs => "zfs",
            ConfigType::Auto => "auto",
        }
    }

    /// Legacy formats mark their records so defaults can be inferred differently
    pub fn is_legacy(&self) -> bool {
        matches!(self, ConfigType::Ucl | ConfigType::Zfs)
    }
}

impl fmt::Display for ConfigType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ConfigType::Json),
            "ucl" => Ok(ConfigType::Ucl),
            "zfs" => Ok(ConfigType::Zfs),
            "auto" => Ok(ConfigType::Auto),
            other => Err(format!("unknown config type: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("JSON".parse::<ConfigType>(), Ok(ConfigType::Json));
        assert_eq!("zfs".parse::<ConfigType>(), Ok(ConfigType::Zfs));
        assert!("yaml".parse::<ConfigType>().is_err());
    }

    #[test]
    fn only_old_formats_are_legacy() {
        assert!(!ConfigType::Json.is_legacy());
        assert!(ConfigType::Ucl.is_legacy());
        assert!(ConfigType::Zfs.is_legacy());
    }
}
