//! OAuth token material, exchange and refresh
//!
//! Both operations POST a form to the account's token endpoint with
//! different grant types. Google omits `refresh_token` from refresh
//! responses, so the previous refresh token is carried forward.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::account::CredentialConfig;
use crate::constants::DEFAULT_TOKEN_TYPE;
use crate::error::{Error, Result};

/// Credential material for one account, as stored in the token file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub refresh_token: String,
    /// Absolute expiry. `None` means the token never expires.
    #[serde(
        default,
        deserialize_with = "deserialize_expiry",
        skip_serializing_if = "Option::is_none"
    )]
    pub expiry: Option<DateTime<Utc>>,
}

fn default_token_type() -> String {
    DEFAULT_TOKEN_TYPE.to_string()
}

/// Token files written by older tools store "no expiry" as the zero time
/// (`0001-01-01T00:00:00Z`); anything at or before the Unix epoch reads as `None`.
fn deserialize_expiry<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let expiry = Option::<DateTime<Utc>>::deserialize(deserializer)?;
    Ok(expiry.filter(|expiry| *expiry > DateTime::UNIX_EPOCH))
}

impl Token {
    /// Whether the access token is expired or expires within `window`.
    pub fn expires_within(&self, window: Duration) -> bool {
        let Some(expiry) = self.expiry else {
            return false;
        };
        let window = TimeDelta::from_std(window).unwrap_or(TimeDelta::MAX);
        match Utc::now().checked_add_signed(window) {
            Some(deadline) => expiry <= deadline,
            None => true,
        }
    }
}

/// Response from the token endpoint for both exchange and refresh.
///
/// `expires_in` is a delta in seconds from the response time.
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl TokenResponse {
    /// Convert into a stored token, keeping `previous_refresh` when the
    /// endpoint did not rotate the refresh token.
    pub fn into_token(self, previous_refresh: &str) -> Token {
        let expiry = self
            .expires_in
            .and_then(|secs| Utc::now().checked_add_signed(TimeDelta::seconds(secs as i64)));
        Token {
            access_token: self.access_token,
            token_type: self.token_type.unwrap_or_else(default_token_type),
            refresh_token: self
                .refresh_token
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| previous_refresh.to_string()),
            expiry,
        }
    }
}

/// Exchange an authorization code for tokens (consent flow completion).
///
/// `verifier` is the PKCE code verifier whose challenge was embedded in the
/// consent URL.
pub async fn exchange_code(
    client: &reqwest::Client,
    config: &CredentialConfig,
    code: &str,
    verifier: &str,
) -> Result<Token> {
    let response = client
        .post(&config.endpoints.token_url)
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("code_verifier", verifier),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.expose().as_str()),
            ("redirect_uri", config.endpoints.redirect_url.as_str()),
        ])
        .send()
        .await
        .map_err(|e| Error::Http(format!("token exchange request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::TokenExchange(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    let token_response = response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid token response: {e}")))?;
    Ok(token_response.into_token(""))
}

/// Refresh an access token using the stored refresh token.
pub async fn refresh_token(
    client: &reqwest::Client,
    config: &CredentialConfig,
    refresh: &str,
) -> Result<Token> {
    if refresh.is_empty() {
        return Err(Error::InvalidCredentials(format!(
            "account {} has no refresh token",
            config.account_id
        )));
    }

    let response = client
        .post(&config.endpoints.token_url)
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.expose().as_str()),
        ])
        .send()
        .await
        .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));

        // invalid_grant means the refresh token was revoked or expired
        if status.as_u16() == 401 || body.contains("invalid_grant") {
            return Err(Error::InvalidCredentials(format!(
                "refresh token rejected ({status}): {body}"
            )));
        }

        return Err(Error::TokenExchange(format!(
            "token refresh returned {status}: {body}"
        )));
    }

    let token_response = response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid refresh response: {e}")))?;
    Ok(token_response.into_token(refresh))
}
