//! Error types for pool operations

/// Errors from pool operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("account pool is empty")]
    Empty,

    #[error("no token for account: {0}")]
    MissingToken(String),

    #[error("token refresh failed for {account_id}: {source}")]
    RefreshFailed {
        account_id: String,
        #[source]
        source: drive_auth::Error,
    },
}

/// Result alias for pool operations.
pub type Result<T> = std::result::Result<T, Error>;
