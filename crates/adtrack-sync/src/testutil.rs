//! In-memory fakes for the three ports, used by the unit tests in this crate.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;

use adtrack_client::RemoteAd;
use adtrack_db::{AdRow, BrandRow, MediaStatus, NewAd};
use adtrack_media::MediaKind;
use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::ports::{AdStore, MediaSink, RemoteLibrary};

/// Builds a remote ad record with an active content document dated at
/// `start_epoch` (epoch seconds).
pub fn remote_ad(id: &str, start_epoch: i64) -> RemoteAd {
    RemoteAd {
        id: id.to_owned(),
        ad_type: Some("image".to_owned()),
        content: json!({"is_active": true, "start_date": start_epoch}),
        image_url: None,
        video_url: None,
        text: None,
        headline: None,
        description: None,
        created_time: None,
    }
}

fn epoch(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).expect("test epoch in range")
}

// ---------------------------------------------------------------------------
// MemStore
// ---------------------------------------------------------------------------

/// In-memory `AdStore` with the same ordering semantics as the Postgres
/// adapter.
#[derive(Default)]
pub struct MemStore {
    brands: Mutex<Vec<BrandRow>>,
    ads: Mutex<Vec<AdRow>>,
    next_id: AtomicI64,
    list_sources_calls: AtomicUsize,
    content_updates: AtomicUsize,
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            ..Self::default()
        }
    }

    fn fresh_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    pub fn add_brand(&self, source_id: &str) -> i64 {
        let id = self.fresh_id();
        self.brands.lock().unwrap().push(BrandRow {
            id,
            public_id: Uuid::new_v4(),
            source_id: source_id.to_owned(),
            name: source_id.to_owned(),
            total_ads: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        });
        id
    }

    pub fn add_ad(&self, brand_id: i64, library_id: &str, content: Value, created_epoch: i64) -> i64 {
        let id = self.fresh_id();
        self.ads.lock().unwrap().push(AdRow {
            id,
            library_id: library_id.to_owned(),
            brand_id,
            raw_content: content,
            media_status: MediaStatus::Pending,
            media_retry_count: 0,
            local_image_url: None,
            local_video_url: None,
            media_error: None,
            media_downloaded_at: None,
            created_at: epoch(created_epoch),
            updated_at: epoch(created_epoch),
        });
        id
    }

    pub fn get_ad(&self, library_id: &str) -> Option<AdRow> {
        self.ads
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.library_id == library_id)
            .cloned()
    }

    pub fn get_brand(&self, source_id: &str) -> Option<BrandRow> {
        self.brands
            .lock()
            .unwrap()
            .iter()
            .find(|b| b.source_id == source_id)
            .cloned()
    }

    pub fn set_media_state(&self, library_id: &str, status: MediaStatus, retry_count: i32) {
        let mut ads = self.ads.lock().unwrap();
        let ad = ads
            .iter_mut()
            .find(|a| a.library_id == library_id)
            .expect("set_media_state: unknown ad");
        ad.media_status = status;
        ad.media_retry_count = retry_count;
    }

    pub fn list_sources_calls(&self) -> usize {
        self.list_sources_calls.load(Ordering::SeqCst)
    }

    pub fn content_update_count(&self) -> usize {
        self.content_updates.load(Ordering::SeqCst)
    }

    fn with_ad<T>(&self, ad_id: i64, f: impl FnOnce(&mut AdRow) -> T) -> Result<T> {
        let mut ads = self.ads.lock().unwrap();
        match ads.iter_mut().find(|a| a.id == ad_id) {
            Some(ad) => Ok(f(ad)),
            None => bail!("no ad with id {ad_id}"),
        }
    }
}

#[async_trait]
impl AdStore for MemStore {
    async fn find_brand_by_source_id(&self, source_id: &str) -> Result<Option<BrandRow>> {
        Ok(self.get_brand(source_id))
    }

    async fn create_brand(&self, source_id: &str, name: &str) -> Result<BrandRow> {
        let row = BrandRow {
            id: self.fresh_id(),
            public_id: Uuid::new_v4(),
            source_id: source_id.to_owned(),
            name: name.to_owned(),
            total_ads: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.brands.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn update_brand_total_ads(&self, brand_id: i64, total_ads: i64) -> Result<()> {
        let mut brands = self.brands.lock().unwrap();
        match brands.iter_mut().find(|b| b.id == brand_id) {
            Some(brand) => {
                brand.total_ads = total_ads;
                Ok(())
            }
            None => bail!("no brand with id {brand_id}"),
        }
    }

    async fn list_tracked_source_ids(&self) -> Result<Vec<String>> {
        self.list_sources_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .brands
            .lock()
            .unwrap()
            .iter()
            .map(|b| b.source_id.clone())
            .collect())
    }

    async fn ad_exists(&self, library_id: &str) -> Result<bool> {
        Ok(self.get_ad(library_id).is_some())
    }

    async fn insert_ad(&self, ad: NewAd<'_>) -> Result<bool> {
        if self.get_ad(ad.library_id).is_some() {
            return Ok(false);
        }
        let id = self.fresh_id();
        self.ads.lock().unwrap().push(AdRow {
            id,
            library_id: ad.library_id.to_owned(),
            brand_id: ad.brand_id,
            raw_content: ad.raw_content.clone(),
            media_status: MediaStatus::Pending,
            media_retry_count: 0,
            local_image_url: None,
            local_video_url: None,
            media_error: None,
            media_downloaded_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        });
        Ok(true)
    }

    async fn list_ads_for_source(&self, source_id: &str) -> Result<Vec<AdRow>> {
        let Some(brand) = self.get_brand(source_id) else {
            return Ok(Vec::new());
        };
        let mut rows: Vec<AdRow> = self
            .ads
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.brand_id == brand.id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn update_ad_content(&self, ad_id: i64, raw_content: &Value) -> Result<()> {
        self.content_updates.fetch_add(1, Ordering::SeqCst);
        self.with_ad(ad_id, |ad| {
            ad.raw_content = raw_content.clone();
            ad.updated_at = Utc::now();
        })
    }

    async fn list_media_queue(&self, batch_size: i64, retry_ceiling: i32) -> Result<Vec<AdRow>> {
        let mut rows: Vec<AdRow> = self
            .ads
            .lock()
            .unwrap()
            .iter()
            .filter(|a| {
                a.media_status == MediaStatus::Pending
                    || (a.media_status == MediaStatus::Failed
                        && a.media_retry_count < retry_ceiling)
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.media_retry_count
                .cmp(&b.media_retry_count)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        rows.truncate(usize::try_from(batch_size).unwrap_or(0));
        Ok(rows)
    }

    async fn mark_media_processing(&self, ad_id: i64) -> Result<()> {
        self.with_ad(ad_id, |ad| {
            ad.media_status = MediaStatus::Processing;
        })
    }

    async fn record_media_success(
        &self,
        ad_id: i64,
        local_image_url: Option<&str>,
        local_video_url: Option<&str>,
    ) -> Result<()> {
        self.with_ad(ad_id, |ad| {
            ad.media_status = MediaStatus::Success;
            ad.media_retry_count = 0;
            ad.media_error = None;
            ad.media_downloaded_at = Some(Utc::now());
            if let Some(url) = local_image_url {
                ad.local_image_url = Some(url.to_owned());
            }
            if let Some(url) = local_video_url {
                ad.local_video_url = Some(url.to_owned());
            }
        })
    }

    async fn record_media_retry(
        &self,
        ad_id: i64,
        retry_count: i32,
        terminal: bool,
        error: Option<&str>,
    ) -> Result<()> {
        self.with_ad(ad_id, |ad| {
            ad.media_status = if terminal {
                MediaStatus::Failed
            } else {
                MediaStatus::Pending
            };
            ad.media_retry_count = retry_count;
            if let Some(message) = error {
                ad.media_error = Some(message.to_owned());
            }
        })
    }

    async fn count_ads_for_brand(&self, brand_id: i64) -> Result<i64> {
        let count = self
            .ads
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.brand_id == brand_id)
            .count();
        Ok(count as i64)
    }
}

// ---------------------------------------------------------------------------
// ScriptedLibrary
// ---------------------------------------------------------------------------

/// Scripted `RemoteLibrary`: pages keyed by `(source_id, offset)`; unset
/// offsets return an empty page; scripted failures return errors.
#[derive(Default)]
pub struct ScriptedLibrary {
    pages: Mutex<HashMap<(String, u32), Vec<RemoteAd>>>,
    failures: Mutex<HashSet<(String, u32)>>,
    calls: Mutex<Vec<(String, u32, u32)>>,
}

impl ScriptedLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_page(&self, source_id: &str, offset: u32, records: Vec<RemoteAd>) {
        self.pages
            .lock()
            .unwrap()
            .insert((source_id.to_owned(), offset), records);
    }

    pub fn fail_at(&self, source_id: &str, offset: u32) {
        self.failures
            .lock()
            .unwrap()
            .insert((source_id.to_owned(), offset));
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// The offsets requested so far, in order.
    pub fn offsets(&self) -> Vec<u32> {
        self.calls.lock().unwrap().iter().map(|c| c.2).collect()
    }
}

#[async_trait]
impl RemoteLibrary for ScriptedLibrary {
    async fn list_ads(
        &self,
        source_id: &str,
        page_size: u32,
        offset: u32,
    ) -> Result<Vec<RemoteAd>> {
        self.calls
            .lock()
            .unwrap()
            .push((source_id.to_owned(), page_size, offset));

        let key = (source_id.to_owned(), offset);
        if self.failures.lock().unwrap().contains(&key) {
            bail!("scripted remote failure at offset {offset}");
        }
        Ok(self
            .pages
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// ScriptedSink
// ---------------------------------------------------------------------------

/// Scripted `MediaSink`: only allow-listed URLs probe as accessible; uploads
/// can be forced to fail.
#[derive(Default)]
pub struct ScriptedSink {
    accessible: Mutex<HashSet<String>>,
    uploads: Mutex<Vec<(String, MediaKind)>>,
    fail_uploads: AtomicBool,
}

impl ScriptedSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(&self, url: &str) {
        self.accessible.lock().unwrap().insert(url.to_owned());
    }

    pub fn fail_uploads(&self) {
        self.fail_uploads.store(true, Ordering::SeqCst);
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }

    pub fn uploads(&self) -> Vec<(String, MediaKind)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaSink for ScriptedSink {
    async fn probe(&self, url: &str) -> bool {
        self.accessible.lock().unwrap().contains(url)
    }

    async fn upload(&self, url: &str, kind: MediaKind) -> Result<String> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            bail!("storage rejected upload of {url}");
        }
        self.uploads.lock().unwrap().push((url.to_owned(), kind));
        let suffix = url.rsplit('/').next().unwrap_or("asset");
        Ok(format!("https://storage.local/{kind}/{suffix}"))
    }
}
