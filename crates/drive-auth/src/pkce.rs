//! PKCE (RFC 7636) and consent URL construction
//!
//! The consent URL asks for offline access so Google issues a refresh token,
//! and forces the consent prompt so a refresh token is issued again when an
//! account is re-authorized.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use sha2::{Digest, Sha256};

use crate::account::CredentialConfig;
use crate::error::{Error, Result};

/// Generate a random PKCE code verifier.
///
/// 64 random bytes encode to 86 URL-safe characters, inside the 43-128
/// character range RFC 7636 allows.
pub fn generate_verifier() -> String {
    let mut bytes = [0u8; 64];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate an opaque `state` value for the consent request.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Compute the S256 code challenge: `BASE64URL(SHA256(verifier))`.
pub fn compute_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Build the consent URL for one account.
pub fn build_consent_url(config: &CredentialConfig, state: &str, challenge: &str) -> Result<String> {
    let scope = config.scope_param();
    let url = reqwest::Url::parse_with_params(
        &config.endpoints.auth_url,
        &[
            ("client_id", config.client_id.as_str()),
            ("redirect_uri", config.endpoints.redirect_url.as_str()),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("code_challenge", challenge),
            ("code_challenge_method", "S256"),
            ("state", state),
        ],
    )
    .map_err(|e| Error::InvalidEndpoint(format!("{}: {e}", config.endpoints.auth_url)))?;
    Ok(url.into())
}
