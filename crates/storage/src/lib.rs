//! Service-agnostic storage types and collaborator seams
//!
//! Defines the `ApiObject` value handed to upper layers, the `Cache` trait the
//! change poller upserts into, and the `BufferFactory` trait that `open` hands
//! an authenticated transport to. The gateway crates depend on these traits
//! only; the concrete cache and chunk buffer live outside the gateway.

pub mod buffer;
pub mod cache;
pub mod object;

pub use buffer::{AuthorizedTransport, Buffer, BufferFactory};
pub use cache::{Cache, MemoryCache};
pub use object::ApiObject;

/// Classification of remote errors to determine retry/rotation strategy.
///
/// The gateway never acts on this itself; a consumer that sees
/// `QuotaExceeded` may rotate to the next account and retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClassification {
    /// Retryable on the same account (timeouts, 5xx)
    Transient,
    /// Usage or rate limit hit for the active account, rotate
    QuotaExceeded,
    /// Invalid or revoked credentials, or access denied
    Permanent,
}

/// Errors raised by cache and buffer collaborators.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cache error: {0}")]
    Cache(String),

    #[error("buffer error: {0}")]
    Buffer(String),
}

/// Result alias for collaborator operations.
pub type Result<T> = std::result::Result<T, Error>;
