//! Drive API v3 client bound to one credential
//!
//! A `DriveClient` is built per call from the pool's active credential and
//! carries that account's bearer token on every request. Rotating the pool
//! afterwards does not affect clients that already exist.

use std::time::Instant;

use serde::de::DeserializeOwned;
use storage::{ApiObject, AuthorizedTransport};
use tracing::{debug, instrument, warn};

use drive_pool::ActiveCredential;

use crate::error::{Error, Result};
use crate::listing::PartialResult;
use crate::mapper::{FOLDER_MIME_TYPE, map_file};
use crate::query;
use crate::types::{DriveFile, FILE_FIELDS, FileList};

/// Production Drive API base URL.
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Largest page size `files.list` accepts.
const PAGE_SIZE: &str = "1000";

fn record(operation: &'static str, outcome: &'static str, started: Instant) {
    metrics::counter!("drive_api_requests_total", "operation" => operation, "outcome" => outcome)
        .increment(1);
    metrics::histogram!("drive_api_request_duration_seconds", "operation" => operation)
        .record(started.elapsed().as_secs_f64());
}

/// Drive API client for a single account.
pub struct DriveClient {
    api_base: String,
    credential: ActiveCredential,
    transport: AuthorizedTransport,
}

impl DriveClient {
    pub fn new(http: reqwest::Client, api_base: &str, credential: ActiveCredential) -> Self {
        let transport = AuthorizedTransport::new(http, credential.access_token.clone());
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            credential,
            transport,
        }
    }

    /// Account this client authenticates as.
    pub fn account_id(&self) -> &str {
        &self.credential.account_id
    }

    pub fn credential(&self) -> &ActiveCredential {
        &self.credential
    }

    /// Transport carrying this client's bearer token, for content reads.
    pub fn transport(&self) -> AuthorizedTransport {
        self.transport.clone()
    }

    /// `{api_base}/files/{id}` with `id` percent-encoded as one path segment.
    fn file_url(&self, id: &str) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.api_base)
            .map_err(|e| Error::BaseUrl(format!("{}: {e}", self.api_base)))?;
        url.path_segments_mut()
            .map_err(|()| Error::BaseUrl(self.api_base.to_string()))?
            .pop_if_empty()
            .push("files")
            .push(id);
        Ok(url)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        let started = Instant::now();
        let response = request.send().await.map_err(|e| {
            record(operation, "transport_error", started);
            Error::Http(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            record(operation, "api_error", started);
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed = response.json::<T>().await.map_err(|e| {
            record(operation, "parse_error", started);
            Error::Parse(e.to_string())
        })?;
        record(operation, "ok", started);
        Ok(parsed)
    }

    /// Raw metadata of one file.
    pub async fn get_file(&self, id: &str) -> Result<DriveFile> {
        let request = self
            .transport
            .get(self.file_url(id)?.as_str())
            .query(&[("fields", FILE_FIELDS), ("supportsAllDrives", "true")]);
        self.send_json("get_file", request).await
    }

    /// Fetch one page of `files.list` for `q`.
    pub async fn list_page(&self, q: &str, page_token: Option<&str>) -> Result<FileList> {
        let fields = format!("nextPageToken,files({FILE_FIELDS})");
        let mut params = vec![
            ("q", q),
            ("fields", fields.as_str()),
            ("pageSize", PAGE_SIZE),
            ("supportsAllDrives", "true"),
            ("includeItemsFromAllDrives", "true"),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }

        let request = self
            .transport
            .get(&format!("{}/files", self.api_base))
            .query(&params);
        self.send_json("list", request).await
    }

    /// Follow `nextPageToken` until the last page or the first failure.
    ///
    /// Pages are fetched strictly in order and a failed page is not retried.
    #[instrument(skip(self), fields(account_id = %self.credential.account_id))]
    pub async fn list(&self, q: &str) -> PartialResult<DriveFile> {
        let mut items = Vec::new();
        let mut pages = 0usize;
        let mut page_token: Option<String> = None;

        loop {
            let page = match self.list_page(q, page_token.as_deref()).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(pages, error = %e, "listing stopped at failed page");
                    return PartialResult {
                        items,
                        pages,
                        error: Some(e),
                    };
                }
            };

            pages += 1;
            let next = page.next_page().map(str::to_owned);
            items.extend(page.files);

            match next {
                Some(token) => page_token = Some(token),
                None => {
                    debug!(pages, items = items.len(), "listing complete");
                    return PartialResult {
                        items,
                        pages,
                        error: None,
                    };
                }
            }
        }
    }

    /// One object by id.
    ///
    /// Drive reports size 0 for some files that do have content; for those the
    /// size is resolved through a download request. A failed lookup keeps the
    /// reported size.
    pub async fn get_object(&self, id: &str) -> Result<ApiObject> {
        let file = self.get_file(id).await?;
        let mut object = map_file(&file);

        if object.size == 0 && file.mime_type != FOLDER_MIME_TYPE {
            match self.file_size(id).await {
                Ok(size) => object.size = size,
                Err(e) => debug!(id, error = %e, "size lookup failed, keeping reported size"),
            }
        }
        Ok(object)
    }

    /// Every non-trashed child of `parent_id`, across all pages.
    ///
    /// A failure after the first page returns what was fetched so far; a
    /// failure on the first page is returned as an error.
    pub async fn get_objects_by_parent(&self, parent_id: &str) -> Result<Vec<ApiObject>> {
        let listing = self.list(&query::children_of(parent_id)).await;
        if let Some(e) = listing.error.as_ref().filter(|_| listing.pages > 0) {
            warn!(
                parent_id,
                pages = listing.pages,
                error = %e,
                "returning partial children listing"
            );
        }
        listing.map(|file| map_file(&file)).into_available()
    }

    /// The child of `parent` named exactly `name`.
    ///
    /// Only the first page of matches is examined.
    pub async fn get_file_by_name_and_parent(&self, name: &str, parent: &str) -> Result<DriveFile> {
        let page = self
            .list_page(&query::child_named(parent, name), None)
            .await?;
        page.files
            .into_iter()
            .find(|f| f.name == name)
            .ok_or_else(|| Error::NotFound {
                name: name.to_string(),
                parent: parent.to_string(),
            })
    }

    /// Content length of a file, from the headers of a download request.
    ///
    /// The body is never read; the response is dropped once headers arrive.
    pub async fn file_size(&self, id: &str) -> Result<u64> {
        let url = self.file_url(id)?;
        let started = Instant::now();
        let response = self
            .transport
            .get(url.as_str())
            .query(&[("alt", "media"), ("supportsAllDrives", "true")])
            .send()
            .await
            .map_err(|e| {
                record("file_size", "transport_error", started);
                Error::Http(e.to_string())
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            record("file_size", "api_error", started);
            return Err(Error::DownloadStatus {
                status: status.as_u16(),
                body,
            });
        }

        let length = response.content_length();
        drop(response);
        record("file_size", "ok", started);
        length.ok_or_else(|| Error::MissingContentLength(id.to_string()))
    }
}
