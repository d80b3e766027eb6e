//! The tracking scheduler: one full sync cycle per tracked source, on a
//! fixed interval, forever — until explicitly stopped.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use adtrack_db::NewAd;
use anyhow::Result;
use tokio::sync::watch;

use crate::boundary::resolve_boundary;
use crate::pacing::Pacing;
use crate::ports::{AdStore, RemoteLibrary};
use crate::reconcile::{reconcile_statuses, ReconcileSummary};
use crate::walker::{collect_new_ads, WalkConfig};

const STOPPED: u8 = 0;
const RUNNING: u8 = 1;

/// Tunables for the tracking scheduler.
#[derive(Debug, Clone, Copy)]
pub struct TrackerConfig {
    /// Time between the start of one cycle and the next.
    pub interval: Duration,
    pub walk: WalkConfig,
    /// Size of the best-effort reconciliation snapshot.
    pub snapshot_limit: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(900),
            walk: WalkConfig::default(),
            snapshot_limit: 2_000,
        }
    }
}

impl TrackerConfig {
    #[must_use]
    pub fn from_app_config(config: &adtrack_core::AppConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.tracking_interval_secs),
            walk: WalkConfig {
                page_size: config.page_size,
                max_pages: config.max_pages,
            },
            snapshot_limit: config.snapshot_limit,
        }
    }
}

/// What one per-source sync produced, for logging and the manual trigger.
#[derive(Debug, Clone, Copy)]
pub struct SourceSyncSummary {
    /// Newly discovered ads actually written this cycle.
    pub new_ads: usize,
    pub reconcile: ReconcileSummary,
    /// The brand's recomputed ad count.
    pub total_ads: i64,
}

/// The tracking scheduler service.
///
/// Owns its lifecycle: `start` flips `Stopped → Running` with a
/// compare-and-swap (so a second start is a no-op even if the host ever
/// parallelizes callers) and spawns a single driving task; `stop` flips back
/// and wakes the task, which exits after the in-flight cycle completes. No
/// process-wide state.
pub struct Tracker<S, L> {
    inner: Arc<TrackerInner<S, L>>,
}

struct TrackerInner<S, L> {
    store: S,
    library: L,
    config: TrackerConfig,
    pacing: Pacing,
    state: AtomicU8,
    shutdown: watch::Sender<bool>,
}

impl<S, L> Tracker<S, L>
where
    S: AdStore + 'static,
    L: RemoteLibrary + 'static,
{
    pub fn new(store: S, library: L, config: TrackerConfig, pacing: Pacing) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(TrackerInner {
                store,
                library,
                config,
                pacing,
                state: AtomicU8::new(STOPPED),
                shutdown,
            }),
        }
    }

    /// Starts the scheduler. Returns `false` (and does nothing) if it is
    /// already running. The first cycle runs immediately; subsequent cycles
    /// follow every `interval`.
    pub fn start(&self) -> bool {
        if self
            .inner
            .state
            .compare_exchange(STOPPED, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        // Reset the shutdown signal before subscribing so a receiver from a
        // previous stop/start round does not fire immediately.
        self.inner.shutdown.send_replace(false);
        let mut shutdown_rx = self.inner.shutdown.subscribe();
        let inner = Arc::clone(&self.inner);

        tokio::spawn(async move {
            tracing::info!(
                interval_secs = inner.config.interval.as_secs(),
                "tracking scheduler started"
            );
            loop {
                inner.run_cycle().await;

                tokio::select! {
                    () = tokio::time::sleep(inner.config.interval) => {}
                    _ = shutdown_rx.changed() => break,
                }
            }
            tracing::info!("tracking scheduler stopped");
        });

        true
    }

    /// Stops the scheduler. The in-flight cycle (if any) runs to completion;
    /// only the next tick is suppressed. Returns `false` if it was not
    /// running.
    pub fn stop(&self) -> bool {
        if self
            .inner
            .state
            .compare_exchange(RUNNING, STOPPED, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        self.inner.shutdown.send_replace(true);
        true
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.state.load(Ordering::SeqCst) == RUNNING
    }

    /// Runs one full cycle over every tracked source, outside the timer.
    pub async fn run_cycle(&self) {
        self.inner.run_cycle().await;
    }

    /// Runs the per-source cycle body for one source, outside the timer (the
    /// manual trigger).
    ///
    /// # Errors
    ///
    /// Propagates store failures and reconciliation failures for this source.
    pub async fn sync_source(&self, source_id: &str) -> Result<SourceSyncSummary> {
        self.inner.sync_source(source_id).await
    }
}

impl<S, L> TrackerInner<S, L>
where
    S: AdStore,
    L: RemoteLibrary,
{
    async fn run_cycle(&self) {
        let sources = match self.store.list_tracked_source_ids().await {
            Ok(sources) => sources,
            Err(e) => {
                tracing::error!(error = %e, "tracking cycle: failed to enumerate sources");
                return;
            }
        };

        if sources.is_empty() {
            tracing::info!("tracking cycle: no tracked sources");
            return;
        }

        tracing::info!(count = sources.len(), "tracking cycle: processing sources");

        for (index, source_id) in sources.iter().enumerate() {
            if index > 0 {
                self.pacing.between_sources().await;
            }

            match self.sync_source(source_id).await {
                Ok(summary) => {
                    tracing::info!(
                        source_id,
                        new_ads = summary.new_ads,
                        deactivated = summary.reconcile.deactivated,
                        reactivated = summary.reconcile.reactivated,
                        total_ads = summary.total_ads,
                        "tracking cycle: source synced"
                    );
                }
                Err(e) => {
                    // One bad source must not starve the rest of the cycle.
                    tracing::error!(source_id, error = %e, "tracking cycle: source failed");
                }
            }
        }
    }

    async fn sync_source(&self, source_id: &str) -> Result<SourceSyncSummary> {
        let brand = match self.store.find_brand_by_source_id(source_id).await? {
            Some(brand) => brand,
            // First successful sync of a source not yet tracked (manual
            // trigger); the display name catches up on the next seed.
            None => self.store.create_brand(source_id, source_id).await?,
        };

        let boundary = resolve_boundary(&self.store, source_id).await?;

        let mut new_ads = 0usize;
        if let Some(boundary) = &boundary {
            let collected = collect_new_ads(
                &self.library,
                &self.store,
                source_id,
                boundary,
                self.config.walk,
                &self.pacing,
            )
            .await?;

            for record in &collected {
                let inserted = self
                    .store
                    .insert_ad(NewAd {
                        library_id: &record.id,
                        brand_id: brand.id,
                        raw_content: &record.content,
                    })
                    .await?;
                if inserted {
                    new_ads += 1;
                } else {
                    tracing::debug!(
                        source_id,
                        library_id = %record.id,
                        "duplicate insert swallowed"
                    );
                }
            }
        } else {
            tracing::info!(
                source_id,
                "no active ads to bound against — skipping incremental walk"
            );
        }

        let reconcile = reconcile_statuses(
            &self.library,
            &self.store,
            source_id,
            boundary.as_ref().map(|b| b.library_id.as_str()),
            self.config.snapshot_limit,
        )
        .await?;

        let total_ads = self.store.count_ads_for_brand(brand.id).await?;
        self.store.update_brand_total_ads(brand.id, total_ads).await?;

        Ok(SourceSyncSummary {
            new_ads,
            reconcile,
            total_ads,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{remote_ad, MemStore, ScriptedLibrary};
    use serde_json::json;

    fn test_tracker(store: MemStore, library: ScriptedLibrary) -> Tracker<MemStore, ScriptedLibrary> {
        Tracker::new(store, library, TrackerConfig::default(), Pacing::none())
    }

    fn tracker_with_interval(
        store: MemStore,
        library: ScriptedLibrary,
        interval: Duration,
    ) -> Tracker<MemStore, ScriptedLibrary> {
        let config = TrackerConfig {
            interval,
            ..TrackerConfig::default()
        };
        Tracker::new(store, library, config, Pacing::none())
    }

    #[tokio::test]
    async fn fresh_source_runs_reconciliation_only() {
        // No local ads ⇒ no boundary ⇒ the walk is skipped entirely and the
        // only remote call is the reconciliation snapshot.
        let store = MemStore::new();
        store.add_brand("src-1");
        let library = ScriptedLibrary::new();
        let tracker = test_tracker(store, library);

        let summary = tracker.sync_source("src-1").await.unwrap();

        assert_eq!(summary.new_ads, 0);
        assert_eq!(summary.reconcile, ReconcileSummary::default());
        assert_eq!(summary.total_ads, 0);
        assert_eq!(tracker.inner.library.call_count(), 1);
        assert_eq!(tracker.inner.library.offsets(), vec![0]);
    }

    #[tokio::test]
    async fn sync_source_persists_new_ads_and_refreshes_totals() {
        let store = MemStore::new();
        let brand = store.add_brand("src-1");
        store.add_ad(
            brand,
            "bound",
            json!({"is_active": true, "start_date": 1_000}),
            1_000,
        );

        let library = ScriptedLibrary::new();
        library.set_page(
            "src-1",
            0,
            vec![
                remote_ad("n1", 2_002),
                remote_ad("n2", 2_001),
                remote_ad("bound", 1_000),
            ],
        );

        let tracker = test_tracker(store, library);
        let summary = tracker.sync_source("src-1").await.unwrap();

        assert_eq!(summary.new_ads, 2);
        assert_eq!(summary.total_ads, 3);

        let store = &tracker.inner.store;
        let stored = store.get_ad("n1").expect("n1 persisted");
        assert_eq!(stored.media_status, adtrack_db::MediaStatus::Pending);
        assert_eq!(stored.media_retry_count, 0);
        assert_eq!(store.get_brand("src-1").unwrap().total_ads, 3);
    }

    #[tokio::test]
    async fn sync_source_creates_brand_for_unknown_source() {
        let store = MemStore::new();
        let library = ScriptedLibrary::new();
        let tracker = test_tracker(store, library);

        tracker.sync_source("brand-new").await.unwrap();

        assert!(tracker.inner.store.get_brand("brand-new").is_some());
    }

    #[tokio::test]
    async fn cycle_isolates_per_source_failures() {
        let store = MemStore::new();
        let bad_brand = store.add_brand("src-bad");
        store.add_ad(
            bad_brand,
            "bad-ad",
            json!({"is_active": true, "start_date": 1_000}),
            1_000,
        );
        store.add_brand("src-good");

        let library = ScriptedLibrary::new();
        // The bad source's snapshot fetch errors; the walk's page-0 failure
        // is tolerated, but reconciliation propagates it.
        library.fail_at("src-bad", 0);
        library.set_page("src-good", 0, vec![]);

        let tracker = test_tracker(store, library);
        tracker.run_cycle().await;

        // The bad source made two remote calls (failed walk page + failed
        // snapshot); the good source still got its snapshot call.
        assert_eq!(tracker.inner.library.call_count(), 3);
        assert!(tracker.inner.store.get_brand("src-good").is_some());
    }

    #[tokio::test]
    async fn start_is_idempotent_and_stop_rearms() {
        let store = MemStore::new();
        let library = ScriptedLibrary::new();
        let tracker = tracker_with_interval(store, library, Duration::from_secs(3_600));

        assert!(tracker.start());
        assert!(tracker.is_running());
        assert!(!tracker.start(), "second start must be a no-op");

        assert!(tracker.stop());
        assert!(!tracker.is_running());
        assert!(!tracker.stop(), "second stop must be a no-op");

        assert!(tracker.start(), "start after stop re-arms the scheduler");
        tracker.stop();
    }

    #[tokio::test]
    async fn stop_suppresses_further_cycles() {
        let store = MemStore::new();
        store.add_brand("src-1");
        let library = ScriptedLibrary::new();
        let tracker = tracker_with_interval(store, library, Duration::from_secs(3_600));

        tracker.start();

        // Wait for the immediate first cycle to happen.
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while tracker.inner.store.list_sources_calls() == 0 {
            assert!(std::time::Instant::now() < deadline, "first cycle never ran");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        tracker.stop();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // With a one-hour interval, exactly one cycle can have run.
        assert_eq!(tracker.inner.store.list_sources_calls(), 1);
        assert!(!tracker.is_running());
    }
}
