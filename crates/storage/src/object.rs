//! Remote file/folder descriptor

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Service-agnostic description of a remote file or folder.
///
/// Produced by the object mapper per API call or poll tick. Values are never
/// mutated after creation; a newer report for the same `id` replaces the old
/// one in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiObject {
    pub id: String,
    pub name: String,
    pub is_dir: bool,
    /// Size in bytes. Zero for folders and for entries the service reports
    /// without a size.
    pub size: u64,
    pub modified: DateTime<Utc>,
    /// Parent folder ids in the order the service returned them.
    pub parents: Vec<String>,
    /// Content download locator, absent for folders and native documents.
    pub download_url: Option<String>,
}
