// SPDX-License-Identifier: GPL-3.0-only

//! Persisted representations of a configuration
//!
//! Each adapter reads into and writes from a [`ValueStore`]. Adapters keep
//! values as they find them; interpretation is left to the property engine.

pub mod json;
pub mod ucl;
pub mod zfs;

pub use json::JsonFile;
pub use ucl::UclFile;
pub use zfs::ZfsProperties;

use crate::error::Result;
use crate::store::ValueStore;
use jail_types::{ConfigType, Value};

/// A configuration source and sink of one [`ConfigType`]
pub trait ConfigFormat {
    fn config_type(&self) -> ConfigType;

    /// Whether this representation is present for the resource
    fn exists(&self) -> Result<bool>;

    /// Read the stored configuration; absent storage reads as empty
    fn read(&self) -> Result<ValueStore>;

    fn write(&self, data: &ValueStore) -> Result<()>;
}

/// Mark data read from a legacy format
///
/// Sets `legacy` and rewrites the old `type = basejail` marker into the
/// `basejail` flag.
pub(crate) fn import_legacy(data: &mut ValueStore) {
    data.set("legacy", Value::Bool(true));

    let is_basejail = data
        .leaf("type")
        .and_then(Value::as_str)
        .is_some_and(|t| t.eq_ignore_ascii_case("basejail"));
    if is_basejail {
        data.set("basejail", Value::Bool(true));
        data.set("type", Value::from("jail"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_import_translates_basejail_type() {
        let mut data = ValueStore::new();
        data.set("type", Value::from("basejail"));
        import_legacy(&mut data);

        assert_eq!(data.leaf("legacy"), Some(&Value::Bool(true)));
        assert_eq!(data.leaf("basejail"), Some(&Value::Bool(true)));
        assert_eq!(data.leaf("type"), Some(&Value::from("jail")));
    }
}
