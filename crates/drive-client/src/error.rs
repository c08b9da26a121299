//! Error types for Drive operations

use drive_pool::quota::classify_status;
use storage::ErrorClassification;

/// Errors from Drive operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("credential unavailable: {0}")]
    Pool(#[from] drive_pool::Error),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("invalid Drive API base URL: {0}")]
    BaseUrl(String),

    #[error("Drive API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("invalid Drive API response: {0}")]
    Parse(String),

    #[error("could not find {name} in directory {parent}")]
    NotFound { name: String, parent: String },

    #[error("invalid status code {status}")]
    DownloadStatus { status: u16, body: String },

    #[error("download response for {0} has no content length")]
    MissingContentLength(String),

    #[error("no buffer factory configured")]
    BufferUnavailable,

    #[error("buffer: {0}")]
    Buffer(#[from] storage::Error),
}

impl Error {
    /// How a caller should react: rotate accounts, retry, or give up.
    pub fn classification(&self) -> ErrorClassification {
        match self {
            Error::Api { status, body } | Error::DownloadStatus { status, body } => {
                classify_status(*status, body)
            }
            Error::Pool(drive_pool::Error::RefreshFailed {
                source: drive_auth::Error::InvalidCredentials(_),
                ..
            })
            | Error::Pool(drive_pool::Error::MissingToken(_))
            | Error::Pool(drive_pool::Error::Empty) => ErrorClassification::Permanent,
            Error::Pool(_) | Error::Http(_) | Error::Parse(_) | Error::Buffer(_) => {
                ErrorClassification::Transient
            }
            Error::NotFound { .. }
            | Error::BaseUrl(_)
            | Error::MissingContentLength(_)
            | Error::BufferUnavailable => ErrorClassification::Permanent,
        }
    }

    /// Whether rotating to the next account may help.
    pub fn is_quota_exceeded(&self) -> bool {
        self.classification() == ErrorClassification::QuotaExceeded
    }
}

/// Result alias for Drive operations.
pub type Result<T> = std::result::Result<T, Error>;
