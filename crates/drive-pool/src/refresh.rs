//! Proactive background token refresh
//!
//! Refreshes every account's token before it expires so request paths rarely
//! pay refresh latency. Runs until its cancellation token fires.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::pool::AccountPool;

/// Shortest period the refresh task runs at; a zero interval is raised to it.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Spawn a background task that refreshes tokens expiring within `threshold`.
///
/// Runs every `interval` (at least `MIN_REFRESH_INTERVAL`); the immediate
/// first tick is skipped because tokens were just loaded or refreshed during
/// authorization.
pub fn spawn_refresh_task(
    pool: Arc<AccountPool>,
    interval: Duration,
    threshold: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    if interval < MIN_REFRESH_INTERVAL {
        warn!(?interval, minimum = ?MIN_REFRESH_INTERVAL, "refresh interval too short, using minimum");
    }
    let interval = interval.max(MIN_REFRESH_INTERVAL);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("token refresh task stopped");
                    return;
                }
                _ = ticker.tick() => {
                    refresh_cycle(&pool, threshold).await;
                }
            }
        }
    })
}

/// Run one refresh cycle over all accounts. Returns how many tokens failed.
pub(crate) async fn refresh_cycle(pool: &AccountPool, threshold: Duration) -> usize {
    let mut failures = 0usize;
    for config in pool.configs() {
        match pool.token_for(config, threshold).await {
            Ok(_) => debug!(account_id = %config.account_id, "token checked"),
            Err(Error::RefreshFailed { account_id, source }) => {
                failures += 1;
                warn!(%account_id, error = %source, "background refresh failed, will retry next cycle");
            }
            Err(e) => {
                failures += 1;
                warn!(account_id = %config.account_id, error = %e, "background refresh skipped");
            }
        }
    }
    failures
}
