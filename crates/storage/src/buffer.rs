//! Chunked content buffer seam
//!
//! `open` on the gateway does not read content itself. It hands the chunk
//! buffer collaborator an `AuthorizedTransport` bound to the credential that
//! was active when `open` was called, plus the object, chunk size and chunk
//! directory.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use common::Secret;

use crate::{ApiObject, Result};

/// HTTP transport carrying the bearer token of one account.
///
/// Cloning is cheap: the inner `reqwest::Client` shares its connection pool.
#[derive(Clone)]
pub struct AuthorizedTransport {
    client: reqwest::Client,
    access_token: Secret<String>,
}

impl AuthorizedTransport {
    pub fn new(client: reqwest::Client, access_token: Secret<String>) -> Self {
        Self {
            client,
            access_token,
        }
    }

    /// Start a GET request with the `Authorization: Bearer` header set.
    pub fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.client.get(url).bearer_auth(self.access_token.expose())
    }

    /// Start a ranged GET for `[offset, offset + len)`.
    ///
    /// Returns `None` for an empty range or one whose last byte does not fit
    /// in a `u64`; neither has a valid `Range` header.
    pub fn get_range(&self, url: &str, offset: u64, len: u64) -> Option<reqwest::RequestBuilder> {
        let end = offset.checked_add(len.checked_sub(1)?)?;
        Some(
            self.get(url)
                .header(reqwest::header::RANGE, format!("bytes={offset}-{end}")),
        )
    }
}

/// Open handle on a remote object's content.
pub trait Buffer: Send + Sync {
    /// The object this buffer reads.
    fn object(&self) -> &ApiObject;

    /// Read up to `size` bytes starting at `offset`.
    fn read_at(
        &self,
        offset: u64,
        size: u64,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send + '_>>;

    /// Release chunk files and connections held by this buffer.
    fn close(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Constructs buffers for `open`.
pub trait BufferFactory: Send + Sync {
    fn create(
        &self,
        transport: AuthorizedTransport,
        object: ApiObject,
        chunk_size: u64,
        chunk_dir: &Path,
    ) -> Result<Box<dyn Buffer>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_sets_bearer_token() {
        let transport =
            AuthorizedTransport::new(reqwest::Client::new(), Secret::from("ya29.token"));
        let request = transport.get("http://127.0.0.1/files/abc").build().unwrap();
        assert_eq!(
            request.headers().get(reqwest::header::AUTHORIZATION).unwrap(),
            "Bearer ya29.token"
        );
    }

    #[test]
    fn get_range_sets_inclusive_range_header() {
        let transport = AuthorizedTransport::new(reqwest::Client::new(), Secret::from("t"));
        let request = transport
            .get_range("http://127.0.0.1/files/abc", 1024, 512)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(
            request.headers().get(reqwest::header::RANGE).unwrap(),
            "bytes=1024-1535"
        );
    }

    #[test]
    fn get_range_refuses_empty_and_overflowing_ranges() {
        let transport = AuthorizedTransport::new(reqwest::Client::new(), Secret::from("t"));
        let url = "http://127.0.0.1/files/abc";
        assert!(transport.get_range(url, 0, 0).is_none());
        assert!(transport.get_range(url, u64::MAX, 2).is_none());

        let last_byte = transport.get_range(url, u64::MAX, 1).unwrap().build().unwrap();
        assert_eq!(
            last_byte.headers().get(reqwest::header::RANGE).unwrap(),
            &format!("bytes={0}-{0}", u64::MAX)
        );
    }
}
