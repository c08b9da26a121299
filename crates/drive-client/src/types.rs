//! Drive API v3 response types
//!
//! See https://developers.google.com/drive/api/v3/reference/files

use serde::{Deserialize, Serialize};

/// File fields requested for every file resource.
pub const FILE_FIELDS: &str = "id,name,mimeType,size,modifiedTime,parents,webContentLink,trashed";

/// Drive file resource, as returned by `files.get` and `files.list`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub mime_type: String,

    /// Size in bytes as a decimal string, omitted for folders and native docs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,

    /// Last modification time (RFC 3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<String>,

    #[serde(default)]
    pub parents: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_content_link: Option<String>,

    #[serde(default)]
    pub trashed: bool,
}

impl DriveFile {
    /// Reported size, zero when absent or unparsable.
    pub fn reported_size(&self) -> u64 {
        self.size
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    }
}

/// One page of `files.list`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<DriveFile>,

    /// Continuation token; absent or empty on the last page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

impl FileList {
    /// Continuation token for the next page, if any.
    pub fn next_page(&self) -> Option<&str> {
        self.next_page_token.as_deref().filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_list_parses_drive_response() {
        let json = r#"{
            "nextPageToken": "~!!~AI9FV7T",
            "files": [{
                "id": "1AbC",
                "name": "movie.mkv",
                "mimeType": "video/x-matroska",
                "size": "734003200",
                "modifiedTime": "2024-05-01T12:30:00.000Z",
                "parents": ["0AFolder"],
                "webContentLink": "https://drive.google.com/uc?id=1AbC&export=download"
            }]
        }"#;
        let list: FileList = serde_json::from_str(json).unwrap();
        assert_eq!(list.next_page(), Some("~!!~AI9FV7T"));
        assert_eq!(list.files.len(), 1);
        assert_eq!(list.files[0].reported_size(), 734_003_200);
        assert_eq!(list.files[0].parents, vec!["0AFolder"]);
        assert!(!list.files[0].trashed);
    }

    #[test]
    fn empty_page_token_means_last_page() {
        let list: FileList = serde_json::from_str(r#"{"files":[],"nextPageToken":""}"#).unwrap();
        assert_eq!(list.next_page(), None);
    }

    #[test]
    fn folder_without_size_reports_zero() {
        let file: DriveFile = serde_json::from_str(
            r#"{"id":"f","name":"Photos","mimeType":"application/vnd.google-apps.folder"}"#,
        )
        .unwrap();
        assert_eq!(file.reported_size(), 0);
        assert!(file.modified_time.is_none());
    }
}
