//! Sync boundary resolution.
//!
//! The remote library offers no cursor or delta API, so incremental sync is
//! bounded by the oldest still-active ad we already know about. Each cycle
//! re-derives that boundary from the store.

use adtrack_core::envelope::AdContent;
use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::ports::AdStore;

/// The oldest currently-active known ad for a source; bounds the pagination
/// walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncBoundary {
    /// Remote library id of the boundary ad.
    pub library_id: String,
    /// Effective start date of the boundary ad.
    pub date: DateTime<Utc>,
    /// How many ads (active or not) were known for the source at resolution
    /// time.
    pub known_count: usize,
}

/// Resolves the sync boundary for a source, or `None` when the source has no
/// active ads to bound against (fresh source, or everything expired).
///
/// Ads whose content cannot be parsed count as active — dropping an ad from
/// boundary consideration because its document is malformed would quietly
/// unbound the walk.
///
/// # Errors
///
/// Propagates store failures.
pub async fn resolve_boundary<S>(store: &S, source_id: &str) -> Result<Option<SyncBoundary>>
where
    S: AdStore + ?Sized,
{
    let ads = store.list_ads_for_source(source_id).await?;
    let known_count = ads.len();

    // Newest-first in, so the last active entry is the oldest active ad.
    let oldest_active = ads
        .iter()
        .filter(|ad| AdContent::new(&ad.raw_content).is_active_or_default())
        .next_back();

    let Some(ad) = oldest_active else {
        return Ok(None);
    };

    let date = AdContent::new(&ad.raw_content).effective_date(ad.created_at);

    Ok(Some(SyncBoundary {
        library_id: ad.library_id.clone(),
        date,
        known_count,
    }))
}
