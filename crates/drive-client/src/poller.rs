//! Periodic change polling into the metadata cache
//!
//! Every tick asks Drive for files modified after the checkpoint and upserts
//! them into the cache. The checkpoint moves to "now" just before the query,
//! so the next window overlaps anything that changed while this tick ran;
//! the cache upsert makes the overlap harmless.
//!
//! Failure policy per tick:
//! - no client (credential unavailable): tick skipped, checkpoint kept
//! - failed page: remaining pages skipped until the next tick
//! - failed cache store: logged per object, the tick continues

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use storage::Cache;
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::gateway::Drive;
use crate::mapper::map_file;
use crate::query;

/// Outcome of one poll tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// No client could be built; nothing was queried
    pub skipped: bool,
    pub pages: usize,
    pub upserted: usize,
    pub store_failures: usize,
    /// A page failed and the remaining pages were not fetched
    pub aborted: bool,
}

impl TickReport {
    fn outcome(&self) -> &'static str {
        if self.skipped {
            "skipped"
        } else if self.aborted {
            "partial"
        } else {
            "ok"
        }
    }
}

/// Poller state published after every tick.
#[derive(Debug, Clone, Serialize)]
pub struct PollerSnapshot {
    pub checkpoint: DateTime<Utc>,
    pub ticks: u64,
    pub last_tick: Option<DateTime<Utc>>,
    pub last_report: Option<TickReport>,
}

/// Shortest tick period; shorter intervals, including zero, are raised to it.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Change poller over one `Drive` and one cache.
pub struct ChangePoller {
    drive: Drive,
    cache: Arc<dyn Cache>,
    interval: Duration,
    /// Held for the whole tick, which serializes ticks.
    checkpoint: Mutex<DateTime<Utc>>,
    snapshot: watch::Sender<PollerSnapshot>,
}

impl ChangePoller {
    /// The first tick reports changes made after this call.
    pub fn new(drive: Drive, cache: Arc<dyn Cache>, interval: Duration) -> Self {
        Self::starting_at(drive, cache, interval, Utc::now())
    }

    /// Poller whose first tick reports changes made after `checkpoint`.
    pub fn starting_at(
        drive: Drive,
        cache: Arc<dyn Cache>,
        interval: Duration,
        checkpoint: DateTime<Utc>,
    ) -> Self {
        if interval < MIN_POLL_INTERVAL {
            warn!(?interval, minimum = ?MIN_POLL_INTERVAL, "poll interval too short, using minimum");
        }
        let interval = interval.max(MIN_POLL_INTERVAL);
        let (snapshot, _) = watch::channel(PollerSnapshot {
            checkpoint,
            ticks: 0,
            last_tick: None,
            last_report: None,
        });
        Self {
            drive,
            cache,
            interval,
            checkpoint: Mutex::new(checkpoint),
            snapshot,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub async fn checkpoint(&self) -> DateTime<Utc> {
        *self.checkpoint.lock().await
    }

    /// Receiver for the snapshot published after each tick.
    pub fn subscribe(&self) -> watch::Receiver<PollerSnapshot> {
        self.snapshot.subscribe()
    }

    /// Run one tick.
    pub async fn poll_once(&self) -> TickReport {
        let mut checkpoint = self.checkpoint.lock().await;

        let client = match self.drive.client().await {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, "no drive client, skipping change poll tick");
                let report = TickReport {
                    skipped: true,
                    ..TickReport::default()
                };
                self.publish(*checkpoint, &report);
                return report;
            }
        };

        let since = *checkpoint;
        *checkpoint = Utc::now();
        debug!(%since, account_id = client.account_id(), "polling for changes");

        let listing = client.list(&query::modified_since(since)).await;
        let mut report = TickReport {
            pages: listing.pages,
            aborted: listing.error.is_some(),
            ..TickReport::default()
        };
        if let Some(e) = &listing.error {
            warn!(pages = listing.pages, error = %e, "change poll page failed, remaining pages wait for next tick");
        }

        for file in &listing.items {
            let object = map_file(file);
            let id = object.id.clone();
            match self.cache.store(object).await {
                Ok(()) => report.upserted += 1,
                Err(e) => {
                    report.store_failures += 1;
                    warn!(%id, error = %e, "failed to store changed object");
                }
            }
        }

        if report.upserted > 0 || report.aborted {
            info!(
                pages = report.pages,
                upserted = report.upserted,
                store_failures = report.store_failures,
                aborted = report.aborted,
                "change poll tick complete"
            );
        }
        metrics::counter!("drive_poll_objects_total").increment(report.upserted as u64);
        self.publish(*checkpoint, &report);
        report
    }

    fn publish(&self, checkpoint: DateTime<Utc>, report: &TickReport) {
        metrics::counter!("drive_poll_ticks_total", "outcome" => report.outcome()).increment(1);
        self.snapshot.send_modify(|s| {
            s.checkpoint = checkpoint;
            s.ticks += 1;
            s.last_tick = Some(Utc::now());
            s.last_report = Some(report.clone());
        });
    }

    /// Run ticks every `interval` until `cancel` fires.
    ///
    /// The first tick happens one interval after spawning. A tick in
    /// progress finishes before the task observes cancellation.
    pub fn spawn(self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("change poller stopped");
                        return;
                    }
                    _ = ticker.tick() => {
                        self.poll_once().await;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockDrive, drive_file, start_mock_drive, test_drive, test_drive_with};
    use axum::http::StatusCode;
    use chrono::{TimeDelta, TimeZone};
    use std::future::Future;
    use std::pin::Pin;
    use storage::{ApiObject, MemoryCache};

    fn file(id: &str) -> crate::DriveFile {
        drive_file(id, &format!("{id}.txt"), "text/plain", Some("1"))
    }

    fn since() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn tick_upserts_modified_files_and_advances_checkpoint() {
        let mock = MockDrive {
            pages: vec![vec![file("a"), file("b")], vec![file("c")]],
            ..MockDrive::default()
        };
        let (base, state) = start_mock_drive(mock).await;
        let dir = tempfile::tempdir().unwrap();
        let drive = test_drive(&dir, &["acct"], &base).await;
        let cache = Arc::new(MemoryCache::new());
        let poller =
            ChangePoller::starting_at(drive, cache.clone(), Duration::from_secs(600), since());

        let before = Utc::now();
        let report = poller.poll_once().await;

        assert_eq!(report.pages, 2);
        assert_eq!(report.upserted, 3);
        assert!(!report.aborted);
        assert_eq!(cache.len().await, 3);
        assert_eq!(
            state.requests()[0].query.get("q").unwrap(),
            "modifiedTime > '2024-06-01T12:00:00Z'"
        );
        assert!(poller.checkpoint().await >= before);
    }

    #[tokio::test]
    async fn failed_page_keeps_earlier_pages_and_does_not_retry() {
        let mock = MockDrive {
            pages: vec![
                vec![file("a"), file("b")],
                vec![file("c")],
                vec![file("d")],
            ],
            fail_page: Some((1, StatusCode::INTERNAL_SERVER_ERROR)),
            ..MockDrive::default()
        };
        let (base, state) = start_mock_drive(mock).await;
        let dir = tempfile::tempdir().unwrap();
        let drive = test_drive(&dir, &["acct"], &base).await;
        let cache = Arc::new(MemoryCache::new());
        let poller =
            ChangePoller::starting_at(drive, cache.clone(), Duration::from_secs(600), since());

        let report = poller.poll_once().await;

        assert!(report.aborted);
        assert_eq!(report.pages, 1);
        assert_eq!(report.upserted, 2);
        assert!(cache.get("a").await.is_some());
        assert!(cache.get("c").await.is_none());
        assert_eq!(state.list_requests(), 2);
        // Checkpoint still advances; the overlap window is the next tick's job
        assert!(poller.checkpoint().await > since());
    }

    #[tokio::test]
    async fn reported_again_overwrites_instead_of_duplicating() {
        let mock = MockDrive {
            pages: vec![vec![file("a")]],
            ..MockDrive::default()
        };
        let (base, state) = start_mock_drive(mock).await;
        let dir = tempfile::tempdir().unwrap();
        let drive = test_drive(&dir, &["acct"], &base).await;
        let cache = Arc::new(MemoryCache::new());
        let poller =
            ChangePoller::starting_at(drive, cache.clone(), Duration::from_secs(600), since());

        poller.poll_once().await;
        state.update(|m| m.pages = vec![vec![drive_file("a", "renamed.txt", "text/plain", None)]]);
        poller.poll_once().await;

        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get("a").await.unwrap().name, "renamed.txt");
    }

    #[tokio::test]
    async fn second_tick_queries_from_previous_tick_start() {
        let (base, state) = start_mock_drive(MockDrive::default()).await;
        let dir = tempfile::tempdir().unwrap();
        let drive = test_drive(&dir, &["acct"], &base).await;
        let poller = ChangePoller::starting_at(
            drive,
            Arc::new(MemoryCache::new()),
            Duration::from_secs(600),
            since(),
        );

        poller.poll_once().await;
        let checkpoint = poller.checkpoint().await;
        poller.poll_once().await;

        assert_eq!(
            state.requests()[1].query.get("q").unwrap(),
            &query::modified_since(checkpoint)
        );
    }

    #[tokio::test]
    async fn unusable_credential_skips_tick_without_advancing() {
        let (base, state) = start_mock_drive(MockDrive::default()).await;
        let dir = tempfile::tempdir().unwrap();
        let expired = Some(Utc::now() - TimeDelta::hours(1));
        let drive =
            test_drive_with(&dir, &["acct"], &base, expired, "http://127.0.0.1:9/token").await;
        let poller = ChangePoller::starting_at(
            drive,
            Arc::new(MemoryCache::new()),
            Duration::from_secs(600),
            since(),
        );
        let snapshots = poller.subscribe();

        let report = poller.poll_once().await;

        assert!(report.skipped);
        assert_eq!(poller.checkpoint().await, since());
        assert!(state.requests().is_empty());
        let snapshot = snapshots.borrow().clone();
        assert_eq!(snapshot.ticks, 1);
        assert_eq!(snapshot.last_report, Some(report));
    }

    struct FailingCache;

    impl Cache for FailingCache {
        fn store(
            &self,
            object: ApiObject,
        ) -> Pin<Box<dyn Future<Output = storage::Result<()>> + Send + '_>> {
            Box::pin(async move {
                if object.id == "bad" {
                    Err(storage::Error::Cache("disk full".into()))
                } else {
                    Ok(())
                }
            })
        }
    }

    #[tokio::test]
    async fn store_failures_do_not_stop_the_tick() {
        let mock = MockDrive {
            pages: vec![vec![file("a"), file("bad"), file("c")]],
            ..MockDrive::default()
        };
        let (base, _state) = start_mock_drive(mock).await;
        let dir = tempfile::tempdir().unwrap();
        let drive = test_drive(&dir, &["acct"], &base).await;
        let poller =
            ChangePoller::starting_at(drive, Arc::new(FailingCache), Duration::from_secs(600), since());

        let report = poller.poll_once().await;

        assert_eq!(report.upserted, 2);
        assert_eq!(report.store_failures, 1);
        assert!(!report.aborted);
    }

    #[tokio::test]
    async fn spawned_poller_ticks_until_cancelled() {
        let mock = MockDrive {
            pages: vec![vec![file("a")]],
            ..MockDrive::default()
        };
        let (base, _state) = start_mock_drive(mock).await;
        let dir = tempfile::tempdir().unwrap();
        let drive = test_drive(&dir, &["acct"], &base).await;
        let cache = Arc::new(MemoryCache::new());
        let poller = drive.change_poller(cache.clone(), MIN_POLL_INTERVAL);
        let mut snapshots = poller.subscribe();
        let cancel = CancellationToken::new();

        let handle = poller.spawn(cancel.clone());
        tokio::time::timeout(Duration::from_secs(5), snapshots.changed())
            .await
            .expect("poller never ticked")
            .unwrap();
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("poller did not stop")
            .unwrap();

        assert!(snapshots.borrow().ticks >= 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn cancelled_before_first_tick_never_polls() {
        let (base, state) = start_mock_drive(MockDrive::default()).await;
        let dir = tempfile::tempdir().unwrap();
        let drive = test_drive(&dir, &["acct"], &base).await;
        let poller = drive.change_poller(Arc::new(MemoryCache::new()), Duration::from_secs(3600));
        let cancel = CancellationToken::new();

        let handle = poller.spawn(cancel.clone());
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("poller did not stop")
            .unwrap();

        assert!(state.requests().is_empty());
    }

    #[tokio::test]
    async fn zero_interval_is_raised_to_minimum() {
        let (base, _state) = start_mock_drive(MockDrive::default()).await;
        let dir = tempfile::tempdir().unwrap();
        let drive = test_drive(&dir, &["acct"], &base).await;
        let poller = drive.change_poller(Arc::new(MemoryCache::new()), Duration::ZERO);
        assert_eq!(poller.interval(), MIN_POLL_INTERVAL);

        let cancel = CancellationToken::new();
        let handle = poller.spawn(cancel.clone());
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("poller did not stop")
            .expect("poller must not panic on a zero interval");
    }
}
