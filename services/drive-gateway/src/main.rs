//! Drive Gateway
//!
//! Single-binary service that:
//! 1. Loads the account list and authorizes every account (interactive
//!    consent on stdin/stderr for accounts without a stored token)
//! 2. Polls Drive for changes into the metadata cache
//! 3. Refreshes tokens in the background before they expire
//! 4. Serves `/health` and `/metrics`

mod config;
mod metrics;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use drive_auth::{CredentialAuthorizer, StdioConsent, TokenStore};
use drive_client::{Drive, PollerSnapshot};
use drive_pool::{AccountPool, spawn_refresh_task};
use metrics_exporter_prometheus::PrometheusHandle;
use storage::MemoryCache;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

/// Shared application state accessible from all handlers
#[derive(Clone)]
struct AppState {
    pool: Arc<AccountPool>,
    cache: Arc<MemoryCache>,
    poller: watch::Receiver<PollerSnapshot>,
    prometheus: PrometheusHandle,
    started_at: Instant,
}

/// Build the axum router with all routes and shared state.
fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting drive-gateway");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle = metrics::install_recorder().context("failed to install metrics recorder")?;

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        accounts = config.accounts().len(),
        listen_addr = %config.http.listen_addr,
        api_base = %config.api.base_url,
        token_path = %config.storage.token_path.display(),
        poll_interval_secs = config.poller.interval_secs,
        "configuration loaded"
    );

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.http.request_timeout_secs))
        .build()
        .context("failed to build HTTP client")?;

    tokio::fs::create_dir_all(&config.storage.chunk_dir)
        .await
        .with_context(|| {
            format!(
                "failed to create chunk_dir {}",
                config.storage.chunk_dir.display()
            )
        })?;

    // Authorize every account; a failed consent or exchange is fatal
    let token_store =
        Arc::new(TokenStore::open(config.storage.token_path.clone(), config.accounts()).await);
    let authorizer = CredentialAuthorizer::new(config.oauth.endpoints());
    let consent = StdioConsent::stdio(http_client.clone());
    let credential_configs = authorizer
        .authorize(config.accounts(), &token_store, &consent)
        .await
        .context("account authorization failed")?;

    let pool = Arc::new(
        AccountPool::new(credential_configs, token_store, http_client)
            .context("failed to build account pool")?,
    );
    let drive = Drive::new(
        pool.clone(),
        &config.api.base_url,
        config.storage.chunk_dir.clone(),
    );
    let cache = Arc::new(MemoryCache::new());

    let cancel = CancellationToken::new();
    let poller = drive.change_poller(
        cache.clone(),
        Duration::from_secs(config.poller.interval_secs),
    );
    let poller_snapshots = poller.subscribe();
    let poller_task = poller.spawn(cancel.clone());
    let refresh_task = spawn_refresh_task(
        pool.clone(),
        Duration::from_secs(config.refresh.interval_secs),
        Duration::from_secs(config.refresh.threshold_secs),
        cancel.clone(),
    );

    let app_state = AppState {
        pool,
        cache,
        poller: poller_snapshots,
        prometheus: prometheus_handle,
        started_at: Instant::now(),
    };
    let app = build_router(app_state, config.http.max_connections);

    let listen_addr = config.http.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    let shutdown = cancel.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown.cancel();
        })
        .await;

    // Stop background tasks even if the server failed
    cancel.cancel();
    for (task, handle) in [("change poller", poller_task), ("token refresh", refresh_task)] {
        if let Err(e) = handle.await {
            error!(task, error = %e, "background task panicked");
        }
    }

    served.context("server error")?;
    info!("shutdown complete");
    Ok(())
}

/// Health endpoint: pool state, last poll tick and cache size.
/// Returns 200 while at least one account is usable, 503 otherwise.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let pool = state.pool.health().await;
    let poller = state.poller.borrow().clone();
    let cached_objects = state.cache.len().await;

    let status_code = if pool["status"] == "unhealthy" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    let body = serde_json::json!({
        "status": pool["status"],
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "pool": pool,
        "poller": poller,
        "cached_objects": cached_objects,
    });

    (
        status_code,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus metrics endpoint: text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
