//! In-process mock Drive API and gateway fixtures for tests

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use chrono::{DateTime, TimeDelta, Utc};
use common::Secret;
use drive_auth::{Account, CredentialAuthorizer, OAuthEndpoints, Token, TokenStore};
use drive_pool::AccountPool;

use crate::gateway::Drive;
use crate::types::{DriveFile, FileList};

/// What the mock serves.
#[derive(Default)]
pub(crate) struct MockDrive {
    /// `files/{id}` metadata
    pub files: HashMap<String, DriveFile>,
    /// `files` listing pages; page N is requested with token `page-N`
    pub pages: Vec<Vec<DriveFile>>,
    /// Page index that fails, and with which status
    pub fail_page: Option<(usize, StatusCode)>,
    /// `files/{id}?alt=media` status and body
    pub media: HashMap<String, (StatusCode, Vec<u8>)>,
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub path: String,
    pub query: HashMap<String, String>,
    pub authorization: Option<String>,
}

pub(crate) struct MockState {
    drive: Mutex<MockDrive>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockState {
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn list_requests(&self) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.path == "/files")
            .count()
    }

    pub fn media_requests(&self) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.query.get("alt").map(String::as_str) == Some("media"))
            .count()
    }

    /// Change what the mock serves from now on.
    pub fn update(&self, f: impl FnOnce(&mut MockDrive)) {
        f(&mut self.drive.lock().unwrap());
    }

    fn record(&self, path: String, query: &HashMap<String, String>, headers: &HeaderMap) {
        let authorization = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        self.requests.lock().unwrap().push(RecordedRequest {
            path,
            query: query.clone(),
            authorization,
        });
    }
}

fn api_error(status: StatusCode, reason: &str) -> Response {
    let body = serde_json::json!({
        "error": {
            "code": status.as_u16(),
            "message": reason,
            "errors": [{ "reason": reason }]
        }
    });
    (status, axum::Json(body)).into_response()
}

async fn list_files(
    State(state): State<Arc<MockState>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    state.record("/files".into(), &query, &headers);

    let index = query
        .get("pageToken")
        .and_then(|t| t.strip_prefix("page-"))
        .and_then(|n| n.parse::<usize>().ok())
        .unwrap_or(0);

    let drive = state.drive.lock().unwrap();
    if let Some((_, status)) = drive.fail_page.filter(|(failing, _)| *failing == index) {
        let reason = if status == StatusCode::FORBIDDEN {
            "userRateLimitExceeded"
        } else {
            "backendError"
        };
        return api_error(status, reason);
    }

    let files = drive.pages.get(index).cloned().unwrap_or_default();
    let next_page_token = (index + 1 < drive.pages.len()).then(|| format!("page-{}", index + 1));
    axum::Json(FileList {
        files,
        next_page_token,
    })
    .into_response()
}

async fn get_file(
    State(state): State<Arc<MockState>>,
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    state.record(format!("/files/{id}"), &query, &headers);
    let drive = state.drive.lock().unwrap();

    if query.get("alt").map(String::as_str) == Some("media") {
        return match drive.media.get(&id) {
            Some((status, body)) => (*status, body.clone()).into_response(),
            None => api_error(StatusCode::NOT_FOUND, "notFound"),
        };
    }

    match drive.files.get(&id) {
        Some(file) => axum::Json(file.clone()).into_response(),
        None => api_error(StatusCode::NOT_FOUND, "notFound"),
    }
}

/// Serve `mock` on 127.0.0.1; returns the API base URL and the shared state.
pub(crate) async fn start_mock_drive(mock: MockDrive) -> (String, Arc<MockState>) {
    let state = Arc::new(MockState {
        drive: Mutex::new(mock),
        requests: Mutex::new(Vec::new()),
    });
    let app = axum::Router::new()
        .route("/files", get(list_files))
        .route("/files/{id}", get(get_file))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), state)
}

pub(crate) fn drive_file(id: &str, name: &str, mime_type: &str, size: Option<&str>) -> DriveFile {
    DriveFile {
        id: id.into(),
        name: name.into(),
        mime_type: mime_type.into(),
        size: size.map(String::from),
        modified_time: Some("2024-06-01T12:30:00.000Z".into()),
        parents: vec!["root".into()],
        web_content_link: Some(format!("https://drive.google.com/uc?id={id}&export=download")),
        trashed: false,
    }
}

/// Gateway over accounts `ids` whose tokens (`at_<id>`) are valid for hours.
pub(crate) async fn test_drive(dir: &tempfile::TempDir, ids: &[&str], api_base: &str) -> Drive {
    let expiry = Some(Utc::now() + TimeDelta::hours(2));
    test_drive_with(dir, ids, api_base, expiry, "http://127.0.0.1:9/token").await
}

pub(crate) async fn test_drive_with(
    dir: &tempfile::TempDir,
    ids: &[&str],
    api_base: &str,
    expiry: Option<DateTime<Utc>>,
    token_url: &str,
) -> Drive {
    let accounts: Vec<Account> = ids
        .iter()
        .map(|id| Account {
            id: id.to_string(),
            client_id: format!("client-{id}"),
            client_secret: Secret::from("secret"),
        })
        .collect();
    let store = Arc::new(TokenStore::open(dir.path().join("tokens.json"), &accounts).await);
    for id in ids {
        store
            .insert(
                id.to_string(),
                Token {
                    access_token: format!("at_{id}"),
                    token_type: "Bearer".into(),
                    refresh_token: format!("rt_{id}"),
                    expiry,
                },
            )
            .await;
    }

    let endpoints = OAuthEndpoints {
        token_url: token_url.to_string(),
        ..OAuthEndpoints::default()
    };
    let configs = CredentialAuthorizer::new(endpoints).configs(&accounts);
    let pool = AccountPool::new(configs, store, reqwest::Client::new()).unwrap();
    Drive::new(Arc::new(pool), api_base, dir.path().join("chunks"))
}
