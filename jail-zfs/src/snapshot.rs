// SPDX-License-Identifier: GPL-3.0-only

use chrono::{DateTime, Utc};

/// Append the current UTC time to a snapshot name
///
/// Microsecond resolution keeps names unique across back-to-back clones.
pub fn append_snapshot_datetime(prefix: &str) -> String {
    format_snapshot_name(prefix, Utc::now())
}

pub(crate) fn format_snapshot_name(prefix: &str, at: DateTime<Utc>) -> String {
    format!("{prefix}{}", at.format("%Y%m%d%H%M%S.%6f"))
}
