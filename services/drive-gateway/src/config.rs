//! Configuration types and loading
//!
//! Config precedence: CLI `--config` > `CONFIG_PATH` env > `drive-gateway.toml`.
//! Client secrets resolve per account from `DRIVE_CLIENT_SECRET_<ID>`, then
//! `client_secret_file`, then an inline `client_secret`.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use common::Secret;
use drive_auth::{Account, OAuthEndpoints};
use serde::Deserialize;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub oauth: OAuthConfig,
    #[serde(default, rename = "accounts")]
    pub account_entries: Vec<AccountEntry>,
    /// Accounts with resolved secrets, in configuration order
    #[serde(skip)]
    resolved: Vec<Account>,
}

/// On-disk locations
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    pub token_path: PathBuf,
    pub chunk_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct PollerConfig {
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,
}

/// Background token refresh
#[derive(Debug, Deserialize)]
pub struct RefreshConfig {
    #[serde(default = "default_refresh_interval")]
    pub interval_secs: u64,
    /// Refresh tokens expiring within this many seconds
    #[serde(default = "default_refresh_threshold")]
    pub threshold_secs: u64,
}

/// Health/metrics listener and outbound HTTP settings
#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_base")]
    pub base_url: String,
}

/// OAuth endpoint overrides; defaults are Google's.
#[derive(Debug, Default, Deserialize)]
pub struct OAuthConfig {
    pub auth_url: Option<String>,
    pub token_url: Option<String>,
    pub redirect_url: Option<String>,
    pub scopes: Option<Vec<String>>,
}

/// One `[[accounts]]` entry
#[derive(Debug, Deserialize)]
pub struct AccountEntry {
    pub id: String,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<Secret<String>>,
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
}

fn default_poll_interval() -> u64 {
    600
}

fn default_refresh_interval() -> u64 {
    300
}

fn default_refresh_threshold() -> u64 {
    900
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9090))
}

fn default_timeout() -> u64 {
    60
}

fn default_max_connections() -> usize {
    256
}

fn default_api_base() -> String {
    drive_client::DRIVE_API_BASE.to_string()
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval(),
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_refresh_interval(),
            threshold_secs: default_refresh_threshold(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            request_timeout_secs: default_timeout(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base(),
        }
    }
}

impl OAuthConfig {
    pub fn endpoints(&self) -> OAuthEndpoints {
        let defaults = OAuthEndpoints::default();
        OAuthEndpoints {
            auth_url: self.auth_url.clone().unwrap_or(defaults.auth_url),
            token_url: self.token_url.clone().unwrap_or(defaults.token_url),
            redirect_url: self.redirect_url.clone().unwrap_or(defaults.redirect_url),
            scopes: self.scopes.clone().unwrap_or(defaults.scopes),
        }
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Env var holding the client secret for `account_id`, e.g.
/// `DRIVE_CLIENT_SECRET_PERSONAL_2` for `personal-2`.
pub fn secret_env_var(account_id: &str) -> String {
    let suffix: String = account_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("DRIVE_CLIENT_SECRET_{suffix}")
}

impl AccountEntry {
    fn resolve_secret(&self) -> common::Result<Secret<String>> {
        if let Ok(secret) = std::env::var(secret_env_var(&self.id)) {
            return Ok(Secret::new(secret));
        }
        if let Some(ref path) = self.client_secret_file {
            let secret = std::fs::read_to_string(path).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read client_secret_file {} for account {}: {e}",
                    path.display(),
                    self.id
                ))
            })?;
            let secret = secret.trim().to_owned();
            if !secret.is_empty() {
                return Ok(Secret::new(secret));
            }
        }
        match &self.client_secret {
            Some(secret) if !secret.expose().is_empty() => Ok(secret.clone()),
            _ => Err(common::Error::Config(format!(
                "account {} has no client secret (set {}, client_secret_file or client_secret)",
                self.id,
                secret_env_var(&self.id)
            ))),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, validate it and resolve secrets.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if config.account_entries.is_empty() {
            return Err(common::Error::Config(
                "at least one [[accounts]] entry is required".into(),
            ));
        }

        let mut seen = HashSet::new();
        for entry in &config.account_entries {
            if entry.id.trim().is_empty() {
                return Err(common::Error::Config("account id must not be empty".into()));
            }
            if !seen.insert(entry.id.as_str()) {
                return Err(common::Error::Config(format!(
                    "duplicate account id: {}",
                    entry.id
                )));
            }
            if entry.client_id.trim().is_empty() {
                return Err(common::Error::Config(format!(
                    "account {} has an empty client_id",
                    entry.id
                )));
            }
        }

        if !is_http_url(&config.api.base_url) {
            return Err(common::Error::Config(format!(
                "api.base_url must start with http:// or https://, got: {}",
                config.api.base_url
            )));
        }
        let endpoints = config.oauth.endpoints();
        if !is_http_url(&endpoints.auth_url) || !is_http_url(&endpoints.token_url) {
            return Err(common::Error::Config(
                "oauth auth_url and token_url must start with http:// or https://".into(),
            ));
        }

        for (name, value) in [
            ("poller.interval_secs", config.poller.interval_secs),
            ("refresh.interval_secs", config.refresh.interval_secs),
            ("http.request_timeout_secs", config.http.request_timeout_secs),
        ] {
            if value == 0 {
                return Err(common::Error::Config(format!(
                    "{name} must be greater than 0"
                )));
            }
        }
        if config.http.max_connections == 0 {
            return Err(common::Error::Config(
                "http.max_connections must be greater than 0".into(),
            ));
        }

        config.resolved = config
            .account_entries
            .iter()
            .map(|entry| {
                Ok(Account {
                    id: entry.id.clone(),
                    client_id: entry.client_id.clone(),
                    client_secret: entry.resolve_secret()?,
                })
            })
            .collect::<common::Result<_>>()?;

        Ok(config)
    }

    /// Configured accounts, in order, with secrets resolved.
    pub fn accounts(&self) -> &[Account] {
        &self.resolved
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("drive-gateway.toml")
    }
}
