//! Drive file → `ApiObject` translation

use chrono::{DateTime, Utc};
use storage::ApiObject;

use crate::types::DriveFile;

/// MIME type Drive uses for folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Map a Drive file resource to the service-agnostic object.
///
/// An unparsable or missing modification time is replaced by the current
/// time rather than failing the mapping. Callers that need exact mtimes must
/// not rely on objects whose source lacked one.
pub fn map_file(file: &DriveFile) -> ApiObject {
    let modified = file
        .modified_time
        .as_deref()
        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    ApiObject {
        id: file.id.clone(),
        name: file.name.clone(),
        is_dir: file.mime_type == FOLDER_MIME_TYPE,
        size: file.reported_size(),
        modified,
        parents: file.parents.clone(),
        download_url: file.web_content_link.clone(),
    }
}
