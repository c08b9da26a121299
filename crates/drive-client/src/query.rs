//! Drive query-language builders
//!
//! String literals are escaped so ids and names containing quotes or
//! backslashes cannot change the meaning of the query.

use chrono::{DateTime, SecondsFormat, Utc};

/// Escape a value for use inside a single-quoted query literal.
pub fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Non-trashed children of `parent_id`.
pub fn children_of(parent_id: &str) -> String {
    format!("'{}' in parents AND trashed = false", escape(parent_id))
}

/// Non-trashed children of `parent_id` named exactly `name`.
pub fn child_named(parent_id: &str, name: &str) -> String {
    format!(
        "'{}' in parents AND name = '{}' AND trashed = false",
        escape(parent_id),
        escape(name)
    )
}

/// Files modified strictly after `since`.
///
/// Truncating to whole seconds widens the window, so nothing is skipped.
pub fn modified_since(since: DateTime<Utc>) -> String {
    format!(
        "modifiedTime > '{}'",
        since.to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}
