//! Google OAuth credential lifecycle for the Drive gateway
//!
//! Loads and persists per-account tokens, runs the one-time interactive
//! consent exchange for accounts that have none, and exchanges/refreshes
//! tokens against the OAuth token endpoint.
//!
//! Startup flow:
//! 1. `TokenStore::open()` loads the token file (missing or malformed → empty)
//! 2. `CredentialAuthorizer::authorize()` builds one `CredentialConfig` per account
//! 3. Accounts without a token go through `ConsentFlow` (PKCE consent URL,
//!    operator pastes the code, `token::exchange_code()`)
//! 4. Newly minted tokens are persisted once via `TokenStore::save()`
//! 5. The pool later calls `token::refresh_token()` and `TokenStore::update()`

pub mod account;
pub mod authorizer;
pub mod consent;
pub mod constants;
pub mod error;
pub mod pkce;
pub mod token;
pub mod token_store;

pub use account::{Account, CredentialConfig, OAuthEndpoints};
pub use authorizer::{ConsentFlow, CredentialAuthorizer};
pub use consent::{PromptConsent, StdioConsent};
pub use constants::*;
pub use error::{Error, Result};
pub use token::{Token, TokenResponse, exchange_code, refresh_token};
pub use token_store::{TokenFile, TokenStore, load_tokens, store_tokens};
