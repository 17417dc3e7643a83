// SPDX-License-Identifier: GPL-3.0-only

use crate::resource::Resource;

/// Selection predicate applied while enumerating resources
///
/// `matches_key` is checked against cheap values such as the resource name
/// before its configuration is loaded; `matches_resource` sees the loaded
/// resource and must hold for all terms of the filter.
pub trait ResourceFilter {
    fn matches_key(&self, key: &str, value: &str) -> bool;

    fn matches_resource(&self, resource: &Resource) -> bool;
}

/// Accepts every resource
#[derive(Debug, Default, Clone, Copy)]
pub struct MatchAll;

impl ResourceFilter for MatchAll {
    fn matches_key(&self, _key: &str, _value: &str) -> bool {
        true
    }

    fn matches_resource(&self, _resource: &Resource) -> bool {
        true
    }
}
