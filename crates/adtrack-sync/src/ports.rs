//! Ports the sync core consumes: the ad store, the remote library, and the
//! media sink. Production adapters are in [`crate::adapters`]; tests plug in
//! in-memory fakes.

use adtrack_client::RemoteAd;
use adtrack_db::{AdRow, BrandRow, NewAd};
use adtrack_media::MediaKind;
use anyhow::Result;
use async_trait::async_trait;

/// Persistent storage for brands and ads, reduced to the operations the sync
/// core actually performs.
#[async_trait]
pub trait AdStore: Send + Sync {
    async fn find_brand_by_source_id(&self, source_id: &str) -> Result<Option<BrandRow>>;

    async fn create_brand(&self, source_id: &str, name: &str) -> Result<BrandRow>;

    async fn update_brand_total_ads(&self, brand_id: i64, total_ads: i64) -> Result<()>;

    /// Distinct source ids of every tracked brand.
    async fn list_tracked_source_ids(&self) -> Result<Vec<String>>;

    async fn ad_exists(&self, library_id: &str) -> Result<bool>;

    /// Inserts a newly discovered ad. Returns `false` when a concurrent
    /// writer already inserted the same `library_id` (a benign race).
    async fn insert_ad(&self, ad: NewAd<'_>) -> Result<bool>;

    /// All ads for a source, newest first by local ingestion time.
    async fn list_ads_for_source(&self, source_id: &str) -> Result<Vec<AdRow>>;

    async fn update_ad_content(&self, ad_id: i64, raw_content: &serde_json::Value) -> Result<()>;

    /// The next media batch: `pending`, or `failed` below `retry_ceiling`,
    /// ordered by ascending retry count then ascending creation time.
    async fn list_media_queue(&self, batch_size: i64, retry_ceiling: i32) -> Result<Vec<AdRow>>;

    async fn mark_media_processing(&self, ad_id: i64) -> Result<()>;

    async fn record_media_success(
        &self,
        ad_id: i64,
        local_image_url: Option<&str>,
        local_video_url: Option<&str>,
    ) -> Result<()>;

    async fn record_media_retry(
        &self,
        ad_id: i64,
        retry_count: i32,
        terminal: bool,
        error: Option<&str>,
    ) -> Result<()>;

    async fn count_ads_for_brand(&self, brand_id: i64) -> Result<i64>;
}

/// Paginated reads from the remote ad library.
#[async_trait]
pub trait RemoteLibrary: Send + Sync {
    /// One page of ads for a source at the given offset, newest first.
    async fn list_ads(
        &self,
        source_id: &str,
        page_size: u32,
        offset: u32,
    ) -> Result<Vec<RemoteAd>>;
}

/// Origin probing and durable upload of media assets.
#[async_trait]
pub trait MediaSink: Send + Sync {
    /// Whether the origin URL is still accessible. Failures count as "no".
    async fn probe(&self, url: &str) -> bool;

    /// Uploads the asset at `url` and returns its durable secure URL.
    async fn upload(&self, url: &str, kind: MediaKind) -> Result<String>;
}
