//! One-time credential establishment for all configured accounts
//!
//! Every account gets a `CredentialConfig`. Accounts without a stored token
//! go through the `ConsentFlow` one at a time, in account order; the whole
//! token set is persisted once afterwards. When every account already has a
//! token, nothing is exchanged and nothing is written.

use std::future::Future;
use std::pin::Pin;

use tracing::info;

use crate::account::{Account, CredentialConfig, OAuthEndpoints};
use crate::error::Result;
use crate::token::Token;
use crate::token_store::TokenStore;

/// Obtains a fresh token for one account, typically by asking an operator.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`&dyn ConsentFlow`).
pub trait ConsentFlow: Send + Sync {
    fn authorize<'a>(
        &'a self,
        config: &'a CredentialConfig,
    ) -> Pin<Box<dyn Future<Output = Result<Token>> + Send + 'a>>;
}

/// Builds per-account credential configs and fills in missing tokens.
#[derive(Debug, Clone, Default)]
pub struct CredentialAuthorizer {
    endpoints: OAuthEndpoints,
}

impl CredentialAuthorizer {
    pub fn new(endpoints: OAuthEndpoints) -> Self {
        Self { endpoints }
    }

    /// Credential configs for `accounts`, in account order.
    pub fn configs(&self, accounts: &[Account]) -> Vec<CredentialConfig> {
        accounts
            .iter()
            .map(|account| CredentialConfig::for_account(account, &self.endpoints))
            .collect()
    }

    /// Ensure every account has a token, returning configs in account order.
    ///
    /// A consent or exchange failure aborts authorization; tokens minted
    /// before the failure are not persisted.
    pub async fn authorize(
        &self,
        accounts: &[Account],
        store: &TokenStore,
        flow: &dyn ConsentFlow,
    ) -> Result<Vec<CredentialConfig>> {
        let configs = self.configs(accounts);

        let mut minted = 0usize;
        for config in &configs {
            if store.contains(&config.account_id).await {
                continue;
            }
            info!(account_id = %config.account_id, "no stored token, starting consent exchange");
            let token = flow.authorize(config).await?;
            store.insert(config.account_id.clone(), token).await;
            minted += 1;
        }

        if store.is_dirty().await {
            store.save().await?;
            info!(minted, accounts = configs.len(), "persisted tokens");
        } else {
            info!(accounts = configs.len(), "reusing stored tokens");
        }

        Ok(configs)
    }
}
