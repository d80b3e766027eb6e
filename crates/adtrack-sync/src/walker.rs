//! The pagination walk: sequential offset-based fetches from the remote
//! library, bounded by the sync boundary.

use adtrack_client::RemoteAd;
use adtrack_core::envelope::AdContent;
use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::boundary::SyncBoundary;
use crate::pacing::Pacing;
use crate::ports::{AdStore, RemoteLibrary};

/// Page size and safety ceiling for one pagination walk.
#[derive(Debug, Clone, Copy)]
pub struct WalkConfig {
    pub page_size: u32,
    /// Hard ceiling on pages fetched per walk. Offset pagination gives no
    /// cursor, so this guarantees termination even when the boundary never
    /// reappears.
    pub max_pages: usize,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            page_size: 200,
            max_pages: 20,
        }
    }
}

/// Walks the remote library from offset 0 and collects the records that are
/// newer than `boundary` and not already stored.
///
/// The walk stops on the first of: the boundary ad reappearing (exact id
/// match — the strong signal), a record dated at or before the boundary (the
/// fallback for a boundary ad that went invisible), an empty or short page
/// (remote exhausted), or the page ceiling.
///
/// A transient remote failure mid-walk is logged and treated as "exhausted
/// for this cycle" — whatever was collected so far is returned and the next
/// cycle retries from offset 0.
///
/// # Errors
///
/// Propagates store failures; remote failures end the walk instead.
pub async fn collect_new_ads<L, S>(
    library: &L,
    store: &S,
    source_id: &str,
    boundary: &SyncBoundary,
    config: WalkConfig,
    pacing: &Pacing,
) -> Result<Vec<RemoteAd>>
where
    L: RemoteLibrary + ?Sized,
    S: AdStore + ?Sized,
{
    let mut collected: Vec<RemoteAd> = Vec::new();
    let mut offset = 0u32;
    let mut page = 0usize;

    'pages: while page < config.max_pages {
        let records = match library.list_ads(source_id, config.page_size, offset).await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(
                    source_id,
                    offset,
                    error = %e,
                    "page fetch failed — ending walk for this cycle"
                );
                break;
            }
        };

        if records.is_empty() {
            break;
        }

        let full_page = records.len() as u64 == u64::from(config.page_size);

        for record in records {
            if record.id == boundary.library_id {
                tracing::debug!(source_id, library_id = %record.id, "boundary ad reached");
                break 'pages;
            }

            if let Some(date) = remote_effective_date(&record) {
                if date <= boundary.date {
                    tracing::debug!(source_id, library_id = %record.id, "date boundary reached");
                    break 'pages;
                }
            }

            if store.ad_exists(&record.id).await? {
                continue;
            }

            collected.push(record);
        }

        if !full_page {
            break;
        }

        offset += config.page_size;
        page += 1;
        pacing.between_pages().await;
    }

    Ok(collected)
}

/// The date a remote record is ordered by against the boundary: the content's
/// start time, else the listing-level creation time. Records with neither
/// cannot terminate the walk by date.
fn remote_effective_date(record: &RemoteAd) -> Option<DateTime<Utc>> {
    AdContent::new(&record.content).start_time().or_else(|| {
        record
            .created_time
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    })
}
