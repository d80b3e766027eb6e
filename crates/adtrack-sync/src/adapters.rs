//! Production adapters binding the ports to Postgres and the HTTP clients.

use adtrack_client::{LibraryClient, RemoteAd};
use adtrack_db::{AdRow, BrandRow, NewAd};
use adtrack_media::{MediaKind, MediaStorage};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;

use crate::ports::{AdStore, MediaSink, RemoteLibrary};

/// [`AdStore`] over a Postgres pool, delegating to `adtrack-db`.
#[derive(Clone)]
pub struct PgAdStore {
    pool: PgPool,
}

impl PgAdStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl AdStore for PgAdStore {
    async fn find_brand_by_source_id(&self, source_id: &str) -> Result<Option<BrandRow>> {
        Ok(adtrack_db::find_brand_by_source_id(&self.pool, source_id).await?)
    }

    async fn create_brand(&self, source_id: &str, name: &str) -> Result<BrandRow> {
        Ok(adtrack_db::create_brand(&self.pool, source_id, name).await?)
    }

    async fn update_brand_total_ads(&self, brand_id: i64, total_ads: i64) -> Result<()> {
        Ok(adtrack_db::update_brand_total_ads(&self.pool, brand_id, total_ads).await?)
    }

    async fn list_tracked_source_ids(&self) -> Result<Vec<String>> {
        Ok(adtrack_db::list_tracked_source_ids(&self.pool).await?)
    }

    async fn ad_exists(&self, library_id: &str) -> Result<bool> {
        Ok(adtrack_db::ad_exists(&self.pool, library_id).await?)
    }

    async fn insert_ad(&self, ad: NewAd<'_>) -> Result<bool> {
        Ok(adtrack_db::insert_ad(&self.pool, ad).await?)
    }

    async fn list_ads_for_source(&self, source_id: &str) -> Result<Vec<AdRow>> {
        Ok(adtrack_db::list_ads_for_source(&self.pool, source_id).await?)
    }

    async fn update_ad_content(&self, ad_id: i64, raw_content: &serde_json::Value) -> Result<()> {
        Ok(adtrack_db::update_ad_content(&self.pool, ad_id, raw_content).await?)
    }

    async fn list_media_queue(&self, batch_size: i64, retry_ceiling: i32) -> Result<Vec<AdRow>> {
        Ok(adtrack_db::list_media_queue(&self.pool, batch_size, retry_ceiling).await?)
    }

    async fn mark_media_processing(&self, ad_id: i64) -> Result<()> {
        Ok(adtrack_db::mark_media_processing(&self.pool, ad_id).await?)
    }

    async fn record_media_success(
        &self,
        ad_id: i64,
        local_image_url: Option<&str>,
        local_video_url: Option<&str>,
    ) -> Result<()> {
        Ok(
            adtrack_db::record_media_success(&self.pool, ad_id, local_image_url, local_video_url)
                .await?,
        )
    }

    async fn record_media_retry(
        &self,
        ad_id: i64,
        retry_count: i32,
        terminal: bool,
        error: Option<&str>,
    ) -> Result<()> {
        Ok(adtrack_db::record_media_retry(&self.pool, ad_id, retry_count, terminal, error).await?)
    }

    async fn count_ads_for_brand(&self, brand_id: i64) -> Result<i64> {
        Ok(adtrack_db::count_ads_for_brand(&self.pool, brand_id).await?)
    }
}

#[async_trait]
impl RemoteLibrary for LibraryClient {
    async fn list_ads(
        &self,
        source_id: &str,
        page_size: u32,
        offset: u32,
    ) -> Result<Vec<RemoteAd>> {
        Ok(LibraryClient::list_ads(self, source_id, page_size, offset).await?)
    }
}

#[async_trait]
impl MediaSink for MediaStorage {
    async fn probe(&self, url: &str) -> bool {
        MediaStorage::probe(self, url).await
    }

    async fn upload(&self, url: &str, kind: MediaKind) -> Result<String> {
        Ok(MediaStorage::upload(self, url, kind).await?)
    }
}
