//! The media ingestion worker: drains the media queue in bounded batches on
//! its own interval, independent of the tracking scheduler.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use adtrack_db::AdRow;
use adtrack_media::{extract_media_candidates, MediaKind};
use anyhow::Result;
use tokio::sync::watch;

use crate::pacing::Pacing;
use crate::ports::{AdStore, MediaSink};

const STOPPED: u8 = 0;
const RUNNING: u8 = 1;

/// Tunables for the media worker.
#[derive(Debug, Clone, Copy)]
pub struct MediaWorkerConfig {
    /// Time between the start of one batch and the next.
    pub interval: Duration,
    /// Maximum ads processed per batch.
    pub batch_size: usize,
    /// Retry ceiling on the no-accessible-media path; reaching it is a
    /// terminal failure.
    pub retry_ceiling: i32,
    /// Lower retry ceiling applied when processing an ad errors outright.
    pub exception_retry_ceiling: i32,
}

impl Default for MediaWorkerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(120),
            batch_size: 5,
            retry_ceiling: 5,
            exception_retry_ceiling: 3,
        }
    }
}

impl MediaWorkerConfig {
    #[must_use]
    pub fn from_app_config(config: &adtrack_core::AppConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.media_interval_secs),
            batch_size: config.media_batch_size,
            retry_ceiling: config.media_retry_ceiling,
            exception_retry_ceiling: config.media_exception_retry_ceiling,
        }
    }
}

/// What one batch did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: usize,
    pub succeeded: usize,
    /// Ads parked back in `pending` for a later batch.
    pub retried: usize,
    /// Ads that reached a terminal `failed` state this batch.
    pub failed: usize,
}

/// Aggregate counters since process start. Observability only — nothing
/// reads these to make decisions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub images: u64,
    pub videos: u64,
}

/// The media ingestion worker service.
///
/// Same lifecycle contract as the tracking scheduler: compare-and-swap
/// guarded `start`/`stop`, a single driving task, cooperative shutdown that
/// lets the in-flight batch finish.
pub struct MediaWorker<S, M> {
    inner: Arc<MediaWorkerInner<S, M>>,
}

struct MediaWorkerInner<S, M> {
    store: S,
    sink: M,
    config: MediaWorkerConfig,
    pacing: Pacing,
    state: AtomicU8,
    shutdown: watch::Sender<bool>,
    processed: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    images: AtomicU64,
    videos: AtomicU64,
}

enum AdOutcome {
    Success { image: bool, video: bool },
    Retried,
    PermanentFailure,
}

impl<S, M> MediaWorker<S, M>
where
    S: AdStore + 'static,
    M: MediaSink + 'static,
{
    pub fn new(store: S, sink: M, config: MediaWorkerConfig, pacing: Pacing) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(MediaWorkerInner {
                store,
                sink,
                config,
                pacing,
                state: AtomicU8::new(STOPPED),
                shutdown,
                processed: AtomicU64::new(0),
                succeeded: AtomicU64::new(0),
                failed: AtomicU64::new(0),
                images: AtomicU64::new(0),
                videos: AtomicU64::new(0),
            }),
        }
    }

    /// Starts the worker. Returns `false` (and does nothing) if it is
    /// already running. The first batch runs immediately.
    pub fn start(&self) -> bool {
        if self
            .inner
            .state
            .compare_exchange(STOPPED, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        self.inner.shutdown.send_replace(false);
        let mut shutdown_rx = self.inner.shutdown.subscribe();
        let inner = Arc::clone(&self.inner);

        tokio::spawn(async move {
            tracing::info!(
                interval_secs = inner.config.interval.as_secs(),
                batch_size = inner.config.batch_size,
                "media worker started"
            );
            loop {
                match inner.run_batch().await {
                    Ok(summary) if summary.processed > 0 => {
                        tracing::info!(
                            processed = summary.processed,
                            succeeded = summary.succeeded,
                            retried = summary.retried,
                            failed = summary.failed,
                            "media batch complete"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::error!(error = %e, "media batch failed");
                    }
                }

                tokio::select! {
                    () = tokio::time::sleep(inner.config.interval) => {}
                    _ = shutdown_rx.changed() => break,
                }
            }
            tracing::info!("media worker stopped");
        });

        true
    }

    /// Stops the worker. The in-flight batch (if any) runs to completion.
    /// Returns `false` if it was not running.
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

    /// Snapshot of the aggregate counters.
    #[must_use]
    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            processed: self.inner.processed.load(Ordering::Relaxed),
            succeeded: self.inner.succeeded.load(Ordering::Relaxed),
            failed: self.inner.failed.load(Ordering::Relaxed),
            images: self.inner.images.load(Ordering::Relaxed),
            videos: self.inner.videos.load(Ordering::Relaxed),
        }
    }

    /// Processes one batch outside the timer.
    ///
    /// # Errors
    ///
    /// Propagates queue-selection failures; per-ad failures are absorbed into
    /// the ad's retry state instead.
    pub async fn run_batch(&self) -> Result<BatchSummary> {
        self.inner.run_batch().await
    }
}

impl<S, M> MediaWorkerInner<S, M>
where
    S: AdStore,
    M: MediaSink,
{
    async fn run_batch(&self) -> Result<BatchSummary> {
        let batch = self
            .store
            .list_media_queue(
                i64::try_from(self.config.batch_size).unwrap_or(i64::MAX),
                self.config.retry_ceiling,
            )
            .await?;

        let mut summary = BatchSummary::default();
        for (index, ad) in batch.iter().enumerate() {
            if index > 0 {
                self.pacing.between_ads().await;
            }

            summary.processed += 1;
            self.processed.fetch_add(1, Ordering::Relaxed);

            match self.process_ad(ad).await {
                Ok(AdOutcome::Success { image, video }) => {
                    summary.succeeded += 1;
                    self.succeeded.fetch_add(1, Ordering::Relaxed);
                    if image {
                        self.images.fetch_add(1, Ordering::Relaxed);
                    }
                    if video {
                        self.videos.fetch_add(1, Ordering::Relaxed);
                    }
                }
                Ok(AdOutcome::Retried) => summary.retried += 1,
                Ok(AdOutcome::PermanentFailure) => {
                    summary.failed += 1;
                    self.failed.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    let terminal = self.absorb_ad_failure(ad, &e).await;
                    if terminal {
                        summary.failed += 1;
                        self.failed.fetch_add(1, Ordering::Relaxed);
                    } else {
                        summary.retried += 1;
                    }
                }
            }
        }

        Ok(summary)
    }

    async fn process_ad(&self, ad: &AdRow) -> Result<AdOutcome> {
        self.store.mark_media_processing(ad.id).await?;

        let candidates = extract_media_candidates(&ad.raw_content);
        let image = self
            .first_accessible_upload(&candidates.images, MediaKind::Image)
            .await?;
        let video = self
            .first_accessible_upload(&candidates.videos, MediaKind::Video)
            .await?;

        if image.is_some() || video.is_some() {
            self.store
                .record_media_success(ad.id, image.as_deref(), video.as_deref())
                .await?;
            tracing::debug!(
                library_id = %ad.library_id,
                has_image = image.is_some(),
                has_video = video.is_some(),
                "media ingested"
            );
            return Ok(AdOutcome::Success {
                image: image.is_some(),
                video: video.is_some(),
            });
        }

        let retry_count = ad.media_retry_count + 1;
        let terminal = retry_count >= self.config.retry_ceiling;
        if terminal {
            let message = format!("no accessible media after {retry_count} attempts");
            self.store
                .record_media_retry(ad.id, retry_count, true, Some(&message))
                .await?;
            tracing::warn!(library_id = %ad.library_id, retry_count, "media permanently failed");
            Ok(AdOutcome::PermanentFailure)
        } else {
            self.store
                .record_media_retry(ad.id, retry_count, false, None)
                .await?;
            Ok(AdOutcome::Retried)
        }
    }

    /// Probes candidates in order and uploads the first accessible one.
    /// Upload errors propagate: a host that answers a HEAD but rejects the
    /// transfer is a failure worth counting against the ad.
    async fn first_accessible_upload(
        &self,
        candidates: &[String],
        kind: MediaKind,
    ) -> Result<Option<String>> {
        for url in candidates {
            if self.sink.probe(url).await {
                let secure_url = self.sink.upload(url, kind).await?;
                return Ok(Some(secure_url));
            }
        }
        Ok(None)
    }

    /// Absorbs a per-ad processing error into the ad's retry state. Returns
    /// whether the ad is now terminally failed.
    async fn absorb_ad_failure(&self, ad: &AdRow, error: &anyhow::Error) -> bool {
        let retry_count = ad.media_retry_count + 1;
        let terminal = retry_count >= self.config.exception_retry_ceiling;
        let message = format!("{error:#}");

        tracing::warn!(
            library_id = %ad.library_id,
            retry_count,
            terminal,
            error = %message,
            "media processing errored"
        );

        if let Err(e) = self
            .store
            .record_media_retry(ad.id, retry_count, terminal, Some(&message))
            .await
        {
            tracing::error!(ad_id = ad.id, error = %e, "failed to record media failure");
        }

        terminal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MemStore, ScriptedSink};
    use adtrack_db::MediaStatus;
    use serde_json::json;

    fn test_worker(store: MemStore, sink: ScriptedSink) -> MediaWorker<MemStore, ScriptedSink> {
        MediaWorker::new(store, sink, MediaWorkerConfig::default(), Pacing::none())
    }

    fn content_with_image(url: &str) -> serde_json::Value {
        json!({"is_active": true, "snapshot": {"images": [{"original_image_url": url}]}})
    }

    #[tokio::test]
    async fn successful_image_ingest_records_urls_and_resets_retries() {
        let store = MemStore::new();
        let brand = store.add_brand("src-1");
        store.add_ad(
            brand,
            "ad-1",
            content_with_image("https://cdn.example.com/a.jpg"),
            1_000,
        );
        store.set_media_state("ad-1", MediaStatus::Pending, 2);

        let sink = ScriptedSink::new();
        sink.allow("https://cdn.example.com/a.jpg");

        let worker = test_worker(store, sink);
        let summary = worker.run_batch().await.unwrap();

        assert_eq!(summary.processed, 1);
        assert_eq!(summary.succeeded, 1);

        let ad = worker.inner.store.get_ad("ad-1").unwrap();
        assert_eq!(ad.media_status, MediaStatus::Success);
        assert_eq!(ad.media_retry_count, 0);
        assert!(ad.media_error.is_none());
        assert!(ad.media_downloaded_at.is_some());
        assert_eq!(
            ad.local_image_url.as_deref(),
            Some("https://storage.local/image/a.jpg")
        );
        assert!(ad.local_video_url.is_none());

        let stats = worker.stats();
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.images, 1);
        assert_eq!(stats.videos, 0);
    }

    #[tokio::test]
    async fn image_and_video_are_fetched_independently() {
        let store = MemStore::new();
        let brand = store.add_brand("src-1");
        store.add_ad(
            brand,
            "ad-1",
            json!({"is_active": true, "snapshot": {
                "images": [{"original_image_url": "https://cdn.example.com/a.jpg"}],
                "videos": [{"video_hd_url": "https://cdn.example.com/clip.mp4"}]
            }}),
            1_000,
        );

        let sink = ScriptedSink::new();
        sink.allow("https://cdn.example.com/a.jpg");
        sink.allow("https://cdn.example.com/clip.mp4");

        let worker = test_worker(store, sink);
        worker.run_batch().await.unwrap();

        let ad = worker.inner.store.get_ad("ad-1").unwrap();
        assert!(ad.local_image_url.is_some());
        assert!(ad.local_video_url.is_some());
        assert_eq!(worker.inner.sink.upload_count(), 2);
    }

    #[tokio::test]
    async fn first_accessible_candidate_wins_and_stops_the_search() {
        let store = MemStore::new();
        let brand = store.add_brand("src-1");
        store.add_ad(
            brand,
            "ad-1",
            json!({"is_active": true, "snapshot": {"images": [
                {"original_image_url": "https://cdn.example.com/gone.jpg"},
                {"original_image_url": "https://cdn.example.com/alive.jpg"},
                {"original_image_url": "https://cdn.example.com/never-tried.jpg"}
            ]}}),
            1_000,
        );

        let sink = ScriptedSink::new();
        sink.allow("https://cdn.example.com/alive.jpg");
        sink.allow("https://cdn.example.com/never-tried.jpg");

        let worker = test_worker(store, sink);
        worker.run_batch().await.unwrap();

        let uploads = worker.inner.sink.uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].0, "https://cdn.example.com/alive.jpg");
    }

    #[tokio::test]
    async fn no_accessible_media_increments_retry_until_terminal() {
        // Scenario: an ad with zero accessible candidates crosses the whole
        // retry ladder — pending with rising counts, then terminally failed,
        // then never selected again.
        let store = MemStore::new();
        let brand = store.add_brand("src-1");
        store.add_ad(
            brand,
            "ad-1",
            content_with_image("https://cdn.example.com/dead.jpg"),
            1_000,
        );

        let worker = test_worker(store, ScriptedSink::new());

        for expected_retry in 1..=4 {
            let summary = worker.run_batch().await.unwrap();
            assert_eq!(summary.retried, 1, "pass {expected_retry} should retry");
            let ad = worker.inner.store.get_ad("ad-1").unwrap();
            assert_eq!(ad.media_status, MediaStatus::Pending);
            assert_eq!(ad.media_retry_count, expected_retry);
        }

        let summary = worker.run_batch().await.unwrap();
        assert_eq!(summary.failed, 1);
        let ad = worker.inner.store.get_ad("ad-1").unwrap();
        assert_eq!(ad.media_status, MediaStatus::Failed);
        assert_eq!(ad.media_retry_count, 5);
        assert!(ad
            .media_error
            .as_deref()
            .is_some_and(|m| m.contains("no accessible media")));

        // A sixth batch finds nothing to do.
        let summary = worker.run_batch().await.unwrap();
        assert_eq!(summary.processed, 0);
    }

    #[tokio::test]
    async fn upload_errors_take_the_exception_path() {
        let store = MemStore::new();
        let brand = store.add_brand("src-1");
        store.add_ad(
            brand,
            "ad-1",
            content_with_image("https://cdn.example.com/a.jpg"),
            1_000,
        );

        let sink = ScriptedSink::new();
        sink.allow("https://cdn.example.com/a.jpg");
        sink.fail_uploads();

        let worker = test_worker(store, sink);

        // Exception ceiling is 3: two erroring passes stay pending, the
        // third is terminal.
        for expected_retry in 1..=2 {
            worker.run_batch().await.unwrap();
            let ad = worker.inner.store.get_ad("ad-1").unwrap();
            assert_eq!(ad.media_status, MediaStatus::Pending);
            assert_eq!(ad.media_retry_count, expected_retry);
            assert!(ad
                .media_error
                .as_deref()
                .is_some_and(|m| m.contains("storage rejected upload")));
        }

        let summary = worker.run_batch().await.unwrap();
        assert_eq!(summary.failed, 1);
        let ad = worker.inner.store.get_ad("ad-1").unwrap();
        assert_eq!(ad.media_status, MediaStatus::Failed);
        assert_eq!(ad.media_retry_count, 3);
    }

    #[tokio::test]
    async fn batch_is_bounded_and_ordered_by_retry_then_age() {
        let store = MemStore::new();
        let brand = store.add_brand("src-1");
        store.add_ad(brand, "old-retried", json!({}), 1_000);
        store.add_ad(brand, "young-fresh", json!({}), 3_000);
        store.add_ad(brand, "old-fresh", json!({}), 2_000);
        store.set_media_state("old-retried", MediaStatus::Pending, 2);

        let config = MediaWorkerConfig {
            batch_size: 2,
            ..MediaWorkerConfig::default()
        };
        let worker = MediaWorker::new(store, ScriptedSink::new(), config, Pacing::none());

        let summary = worker.run_batch().await.unwrap();
        assert_eq!(summary.processed, 2);

        // The two fresh ads (retry 0) beat the retried one; oldest first.
        assert_eq!(
            worker.inner.store.get_ad("old-fresh").unwrap().media_retry_count,
            1
        );
        assert_eq!(
            worker
                .inner
                .store
                .get_ad("young-fresh")
                .unwrap()
                .media_retry_count,
            1
        );
        assert_eq!(
            worker
                .inner
                .store
                .get_ad("old-retried")
                .unwrap()
                .media_retry_count,
            2
        );
    }

    #[tokio::test]
    async fn start_is_idempotent_and_stop_rearms() {
        let store = MemStore::new();
        let config = MediaWorkerConfig {
            interval: Duration::from_secs(3_600),
            ..MediaWorkerConfig::default()
        };
        let worker = MediaWorker::new(store, ScriptedSink::new(), config, Pacing::none());

        assert!(worker.start());
        assert!(!worker.start());
        assert!(worker.is_running());
        assert!(worker.stop());
        assert!(!worker.stop());
        assert!(!worker.is_running());
        assert!(worker.start());
        worker.stop();
    }
}
