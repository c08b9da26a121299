//! Active-account state machine and credential snapshots
//!
//! The active index is 1-based and only ever changes through `rotate()`,
//! which advances it cyclically with a single atomic read-modify-write.
//! `active()` reads the index exactly once, so the account id and token it
//! returns always belong together even while other callers rotate.
//!
//! Tokens live in the shared `TokenStore`. A token that expires within the
//! request-time threshold is refreshed inline; refreshes are serialized by a
//! pool-wide mutex and written back to the token file.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::Secret;
use drive_auth::{CredentialConfig, Token, TokenStore};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Tokens expiring within this window are refreshed before use.
pub const REQUEST_REFRESH_THRESHOLD: Duration = Duration::from_secs(60);

/// The credential a Drive client is built from.
#[derive(Debug, Clone)]
pub struct ActiveCredential {
    /// 1-based position of the account in the pool
    pub index: usize,
    pub account_id: String,
    pub access_token: Secret<String>,
}

/// Ordered set of authorized accounts with one active at a time.
pub struct AccountPool {
    configs: Vec<CredentialConfig>,
    active: AtomicUsize,
    token_store: Arc<TokenStore>,
    http_client: reqwest::Client,
    refresh_lock: Mutex<()>,
}

impl AccountPool {
    /// Create a pool over `configs`, starting at account #1.
    ///
    /// Every config should have a token in `token_store`; authorization
    /// guarantees this at startup.
    pub fn new(
        configs: Vec<CredentialConfig>,
        token_store: Arc<TokenStore>,
        http_client: reqwest::Client,
    ) -> Result<Self> {
        if configs.is_empty() {
            return Err(Error::Empty);
        }
        info!(accounts = configs.len(), "account pool initialized");
        Ok(Self {
            configs,
            active: AtomicUsize::new(1),
            token_store,
            http_client,
            refresh_lock: Mutex::new(()),
        })
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// 1-based index of the active account.
    pub fn active_index(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn configs(&self) -> &[CredentialConfig] {
        &self.configs
    }

    /// Switch to the next account, wrapping to #1 after the last one.
    ///
    /// Returns the new active index. Clients already built keep their
    /// credential; only clients built afterwards use the new account.
    pub fn rotate(&self) -> usize {
        let n = self.configs.len();
        let previous = match self
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |i| Some(i % n + 1))
        {
            Ok(i) | Err(i) => i,
        };
        let next = previous % n + 1;
        info!(
            from = previous,
            to = next,
            account_id = %self.configs[next - 1].account_id,
            "rotating accounts"
        );
        metrics::counter!("drive_account_rotations_total").increment(1);
        next
    }

    /// Snapshot of the active account with a usable access token.
    pub async fn active(&self) -> Result<ActiveCredential> {
        let index = self.active_index();
        let config = &self.configs[index - 1];
        let token = self.token_for(config, REQUEST_REFRESH_THRESHOLD).await?;
        Ok(ActiveCredential {
            index,
            account_id: config.account_id.clone(),
            access_token: Secret::new(token.access_token),
        })
    }

    /// Current token for `config`, refreshed if it expires within `threshold`.
    ///
    /// A failed refresh falls back to the current token while it has not
    /// actually expired yet.
    pub async fn token_for(&self, config: &CredentialConfig, threshold: Duration) -> Result<Token> {
        let account_id = config.account_id.as_str();
        let token = self.stored_token(account_id).await?;
        if !token.expires_within(threshold) {
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;
        // Another caller may have refreshed while we waited for the lock
        let token = self.stored_token(account_id).await?;
        if !token.expires_within(threshold) {
            return Ok(token);
        }

        debug!(account_id, "token expiring soon, refreshing");
        match drive_auth::refresh_token(&self.http_client, config, &token.refresh_token).await {
            Ok(fresh) => {
                metrics::counter!("drive_token_refreshes_total", "outcome" => "ok").increment(1);
                if let Err(e) = self.token_store.update(account_id, fresh.clone()).await {
                    warn!(account_id, error = %e, "failed to persist refreshed token");
                }
                info!(account_id, "token refreshed");
                Ok(fresh)
            }
            Err(e) => {
                metrics::counter!("drive_token_refreshes_total", "outcome" => "error").increment(1);
                if !token.expires_within(Duration::ZERO) {
                    warn!(account_id, error = %e, "token refresh failed, using current token until it expires");
                    return Ok(token);
                }
                warn!(account_id, error = %e, "token refresh failed");
                Err(Error::RefreshFailed {
                    account_id: account_id.to_string(),
                    source: e,
                })
            }
        }
    }

    async fn stored_token(&self, account_id: &str) -> Result<Token> {
        self.token_store
            .get(account_id)
            .await
            .ok_or_else(|| Error::MissingToken(account_id.to_string()))
    }

    /// Pool summary for the health endpoint.
    pub async fn health(&self) -> serde_json::Value {
        let active = self.active_index();
        let mut accounts = Vec::with_capacity(self.configs.len());
        let mut usable = 0usize;

        for (position, config) in self.configs.iter().enumerate() {
            let token_state = match self.token_store.get(&config.account_id).await {
                None => "missing",
                Some(token) if token.expires_within(Duration::ZERO) => "expired",
                Some(_) => "valid",
            };
            if token_state == "valid" {
                usable += 1;
            }
            accounts.push(serde_json::json!({
                "id": config.account_id,
                "position": position + 1,
                "active": position + 1 == active,
                "token": token_state,
            }));
        }

        // Expired tokens are refreshed on use, so only missing ones make the
        // pool unusable
        let missing = accounts.iter().filter(|a| a["token"] == "missing").count();
        let status = if missing == 0 && usable == accounts.len() {
            "healthy"
        } else if missing < accounts.len() {
            "degraded"
        } else {
            "unhealthy"
        };

        serde_json::json!({
            "status": status,
            "accounts_total": self.configs.len(),
            "active_index": active,
            "active_account": self.configs[active - 1].account_id,
            "accounts": accounts,
        })
    }

    /// Token store shared with the background refresh task.
    pub fn token_store(&self) -> &Arc<TokenStore> {
        &self.token_store
    }

    pub fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }
}
