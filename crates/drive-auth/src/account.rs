//! Account and per-account OAuth configuration

use common::Secret;

use crate::constants::{AUTHORIZE_ENDPOINT, DRIVE_SCOPE, OOB_REDIRECT_URI, TOKEN_ENDPOINT};

/// One configured identity against the Drive API.
///
/// `id` is the stable key tokens are stored under. It is a configuration
/// label, so reordering accounts never rebinds their tokens.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub client_id: String,
    pub client_secret: Secret<String>,
}

/// OAuth endpoints, redirect and scopes shared by all accounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthEndpoints {
    pub auth_url: String,
    pub token_url: String,
    pub redirect_url: String,
    pub scopes: Vec<String>,
}

impl Default for OAuthEndpoints {
    fn default() -> Self {
        Self {
            auth_url: AUTHORIZE_ENDPOINT.to_string(),
            token_url: TOKEN_ENDPOINT.to_string(),
            redirect_url: OOB_REDIRECT_URI.to_string(),
            scopes: vec![DRIVE_SCOPE.to_string()],
        }
    }
}

/// Everything needed to run consent, exchange and refresh for one account.
#[derive(Debug, Clone)]
pub struct CredentialConfig {
    pub account_id: String,
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub endpoints: OAuthEndpoints,
}

impl CredentialConfig {
    pub fn for_account(account: &Account, endpoints: &OAuthEndpoints) -> Self {
        Self {
            account_id: account.id.clone(),
            client_id: account.client_id.clone(),
            client_secret: account.client_secret.clone(),
            endpoints: endpoints.clone(),
        }
    }

    /// Scopes joined the way the authorization endpoint expects them.
    pub fn scope_param(&self) -> String {
        self.endpoints.scopes.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_endpoints_target_google_drive() {
        let endpoints = OAuthEndpoints::default();
        assert_eq!(endpoints.auth_url, "https://accounts.google.com/o/oauth2/auth");
        assert_eq!(endpoints.redirect_url, "urn:ietf:wg:oauth:2.0:oob");
        assert_eq!(endpoints.scopes, vec!["https://www.googleapis.com/auth/drive"]);
    }

    #[test]
    fn config_copies_account_identity() {
        let account = Account {
            id: "work".into(),
            client_id: "123.apps.googleusercontent.com".into(),
            client_secret: Secret::from("GOCSPX-secret"),
        };
        let config = CredentialConfig::for_account(&account, &OAuthEndpoints::default());
        assert_eq!(config.account_id, "work");
        assert_eq!(config.client_id, "123.apps.googleusercontent.com");
        assert_eq!(config.client_secret.expose(), "GOCSPX-secret");
        assert_eq!(config.scope_param(), DRIVE_SCOPE);
    }
}
