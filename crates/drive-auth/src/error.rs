//! Error types for OAuth credential operations

/// Errors from OAuth credential operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("token parse error: {0}")]
    TokenParse(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid OAuth endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("unable to read authorization code: {0}")]
    ConsentInput(String),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
