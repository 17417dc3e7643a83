// SPDX-License-Identifier: GPL-3.0-only

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use super::ConfigFormat;
use crate::error::{ConfigError, Result};
use crate::helpers::{StringStyle, to_string};
use crate::store::ValueStore;
use jail_types::{ConfigType, Value};

/// Configuration stored as a JSON document
#[derive(Debug, Clone)]
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn parse_error(reason: impl ToString) -> ConfigError {
    ConfigError::Parse {
        format: "json",
        reason: reason.to_string(),
    }
}

/// Parse a JSON document; blank content is an empty configuration
pub fn parse_json(content: &str) -> Result<ValueStore> {
    let content = content.trim();
    if content.is_empty() {
        return Ok(ValueStore::new());
    }

    let document: serde_json::Value = serde_json::from_str(content).map_err(parse_error)?;
    match Value::from(document) {
        Value::Map(map) => Ok(ValueStore::from_nested(&map)),
        other => Err(parse_error(format!(
            "top level must be an object, found {}",
            other.type_name()
        ))),
    }
}

fn stringify_leaves(tree: BTreeMap<String, Value>) -> serde_json::Value {
    let object = tree
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::Map(children) => stringify_leaves(children),
                leaf => serde_json::Value::String(to_string(&leaf, StringStyle::JSON)),
            };
            (key, value)
        })
        .collect();
    serde_json::Value::Object(object)
}

/// Render the configuration with every leaf as a string, keys sorted and
/// indented by four spaces
pub fn to_json(data: &ValueStore) -> Result<String> {
    let document = stringify_leaves(data.to_nested());

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    document.serialize(&mut serializer).map_err(parse_error)?;

    String::from_utf8(buf).map_err(parse_error)
}

impl ConfigFormat for JsonFile {
    fn config_type(&self) -> ConfigType {
        ConfigType::Json
    }

    fn exists(&self) -> Result<bool> {
        Ok(self.path.is_file())
    }

    fn read(&self) -> Result<ValueStore> {
        if !self.path.exists() {
            return Ok(ValueStore::new());
        }
        debug!("Reading JSON config {}", self.path.display());
        parse_json(&std::fs::read_to_string(&self.path)?)
    }

    fn write(&self, data: &ValueStore) -> Result<()> {
        debug!("Writing JSON config {}", self.path.display());
        std::fs::write(&self.path, to_json(data)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_string_leaves_sorted_and_indented() {
        let mut data = ValueStore::new();
        data.set("vnet", Value::Bool(false));
        data.set("boot", Value::Bool(true));
        data.set("priority", Value::Int(3));
        data.set("release", Value::Null);
        data.set("tags", Value::from(vec!["a", "b"]));
        data.set("provision.rev", Value::from("master"));

        let json = to_json(&data).unwrap();
        let expected = r#"{
    "boot": "yes",
    "priority": "3",
    "provision": {
        "rev": "master"
    },
    "release": "none",
    "tags": "a,b",
    "vnet": "no"
}"#;
        assert_eq!(json, expected);
    }

    #[test]
    fn blank_document_is_empty() {
        assert!(parse_json("  \n").unwrap().is_empty());
    }

    #[test]
    fn non_object_document_is_rejected() {
        assert!(matches!(
            parse_json("[1, 2]"),
            Err(ConfigError::Parse { format: "json", .. })
        ));
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let file = JsonFile::new(dir.path().join("config.json"));
        assert!(!file.exists().unwrap());
        assert!(file.read().unwrap().is_empty());

        let mut data = ValueStore::new();
        data.set("id", Value::from("web"));
        data.set("basejail", Value::Bool(true));
        file.write(&data).unwrap();

        let read = file.read().unwrap();
        assert!(file.exists().unwrap());
        assert_eq!(read.leaf("id"), Some(&Value::from("web")));
        assert_eq!(read.leaf("basejail"), Some(&Value::from("yes")));
    }
}
