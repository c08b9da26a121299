//! Durable token storage keyed by account id
//!
//! The token file is a JSON object mapping account ids to tokens. Older
//! deployments wrote a JSON array aligned positionally with the configured
//! accounts; that layout is still read, bound to account ids in account
//! order, and rewritten in keyed form on the next save.
//!
//! Loading never fails: a missing, unreadable or malformed file is treated as
//! "no credentials yet". Writes use temp file + rename so a crash mid-write
//! cannot corrupt the existing file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::account::Account;
use crate::error::{Error, Result};
use crate::token::Token;

/// Parsed contents of a token file.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TokenFile {
    Keyed(BTreeMap<String, Token>),
    /// Legacy layout, one entry per configured account in account order
    Positional(Vec<Token>),
}

impl Default for TokenFile {
    fn default() -> Self {
        TokenFile::Keyed(BTreeMap::new())
    }
}

impl TokenFile {
    pub fn len(&self) -> usize {
        match self {
            TokenFile::Keyed(tokens) => tokens.len(),
            TokenFile::Positional(tokens) => tokens.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Read the token file at `path`.
///
/// Returns an empty set when the file is missing, unreadable or malformed.
pub async fn load_tokens(path: &Path) -> TokenFile {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "token file not found, starting with no tokens");
            return TokenFile::default();
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "token file unreadable, ignoring it");
            return TokenFile::default();
        }
    };

    match serde_json::from_str::<TokenFile>(&contents) {
        Ok(file) => {
            info!(path = %path.display(), tokens = file.len(), "loaded tokens");
            file
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "token file malformed, ignoring it");
            TokenFile::default()
        }
    }
}

/// Replace the token file at `path` with `tokens`.
pub async fn store_tokens(path: &Path, tokens: &BTreeMap<String, Token>) -> Result<()> {
    write_atomic(path, tokens).await
}

struct StoreState {
    tokens: BTreeMap<String, Token>,
    /// In-memory state differs from the file (new tokens or a legacy layout)
    dirty: bool,
}

/// Thread-safe token file manager.
///
/// The Mutex serializes writes. Reads take the lock briefly to clone a token.
pub struct TokenStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

impl TokenStore {
    /// Load tokens from `path`, binding legacy positional entries to `accounts`.
    pub async fn open(path: PathBuf, accounts: &[Account]) -> Self {
        let (tokens, dirty) = match load_tokens(&path).await {
            TokenFile::Keyed(tokens) => (tokens, false),
            TokenFile::Positional(tokens) => {
                if tokens.len() > accounts.len() {
                    warn!(
                        tokens = tokens.len(),
                        accounts = accounts.len(),
                        "legacy token file has more tokens than accounts, dropping the extra"
                    );
                }
                let keyed: BTreeMap<String, Token> = accounts
                    .iter()
                    .zip(tokens)
                    .map(|(account, token)| (account.id.clone(), token))
                    .collect();
                warn!(
                    bound = keyed.len(),
                    "migrating positional token file, tokens bound by account order"
                );
                (keyed, !accounts.is_empty())
            }
        };

        Self {
            path,
            state: Mutex::new(StoreState { tokens, dirty }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get a clone of an account's token.
    pub async fn get(&self, account_id: &str) -> Option<Token> {
        self.state.lock().await.tokens.get(account_id).cloned()
    }

    pub async fn contains(&self, account_id: &str) -> bool {
        self.state.lock().await.tokens.contains_key(account_id)
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.tokens.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Whether there are changes not yet written to disk.
    pub async fn is_dirty(&self) -> bool {
        self.state.lock().await.dirty
    }

    /// Add or replace a token in memory. Call `save` to persist.
    pub async fn insert(&self, account_id: String, token: Token) {
        let mut state = self.state.lock().await;
        debug!(account_id, "stored token in memory");
        state.tokens.insert(account_id, token);
        state.dirty = true;
    }

    /// Persist the full token set.
    pub async fn save(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        write_atomic(&self.path, &state.tokens).await?;
        state.dirty = false;
        Ok(())
    }

    /// Replace an existing account's token and persist, used after a refresh.
    pub async fn update(&self, account_id: &str, token: Token) -> Result<()> {
        let mut state = self.state.lock().await;
        let slot = state.tokens.get_mut(account_id).ok_or_else(|| {
            Error::NotFound(format!("account {account_id} not in token store"))
        })?;
        *slot = token;
        debug!(account_id, "updated token");
        write_atomic(&self.path, &state.tokens).await?;
        state.dirty = false;
        Ok(())
    }
}

/// Write tokens to a file atomically with 0600 permissions on unix.
async fn write_atomic(path: &Path, tokens: &BTreeMap<String, Token>) -> Result<()> {
    let json = serde_json::to_string_pretty(tokens)
        .map_err(|e| Error::TokenParse(format!("serializing tokens: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("token path has no parent directory".into()))?;
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::Io("token path has no file name".into()))?
        .to_string_lossy();
    let tmp_path = dir.join(format!(".{file_name}.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp token file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting token file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp token file: {e}")))?;

    debug!(path = %path.display(), tokens = tokens.len(), "persisted tokens");
    Ok(())
}
