//! Status reconciliation: converging local active flags onto a fresh remote
//! snapshot.

use std::collections::HashSet;

use adtrack_core::envelope::{with_active_flag, AdContent};
use anyhow::Result;

use crate::ports::{AdStore, RemoteLibrary};

/// Counts from one reconciliation pass, for cycle summaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub unchanged_active: usize,
    pub deactivated: usize,
    pub reactivated: usize,
    /// Set when the current sync boundary ad was deactivated; the next
    /// cycle's boundary resolution will pick a new one.
    pub boundary_invalidated: bool,
}

/// Updates every locally known ad's active flag to match one best-effort
/// remote snapshot.
///
/// The snapshot is a single bounded fetch (`snapshot_limit` records at offset
/// 0), not an exhaustive walk — absence from it is *inferred* inactivity, an
/// accepted approximation for sources larger than the cap.
///
/// # Errors
///
/// Propagates snapshot-fetch and store failures; the caller treats either as
/// a source-level failure for this cycle.
pub async fn reconcile_statuses<L, S>(
    library: &L,
    store: &S,
    source_id: &str,
    boundary_library_id: Option<&str>,
    snapshot_limit: u32,
) -> Result<ReconcileSummary>
where
    L: RemoteLibrary + ?Sized,
    S: AdStore + ?Sized,
{
    let snapshot = library.list_ads(source_id, snapshot_limit, 0).await?;
    let remote_ids: HashSet<&str> = snapshot.iter().map(|r| r.id.as_str()).collect();

    let local = store.list_ads_for_source(source_id).await?;
    let mut summary = ReconcileSummary::default();

    for ad in &local {
        let locally_active = AdContent::new(&ad.raw_content).is_active_or_default();
        let present = remote_ids.contains(ad.library_id.as_str());

        match (present, locally_active) {
            (true, true) | (false, false) => {
                if present {
                    summary.unchanged_active += 1;
                }
            }
            (true, false) => {
                let rewritten = with_active_flag(&ad.raw_content, true);
                store.update_ad_content(ad.id, &rewritten).await?;
                summary.reactivated += 1;
            }
            (false, true) => {
                let rewritten = with_active_flag(&ad.raw_content, false);
                store.update_ad_content(ad.id, &rewritten).await?;
                summary.deactivated += 1;
                if boundary_library_id == Some(ad.library_id.as_str()) {
                    summary.boundary_invalidated = true;
                }
            }
        }
    }

    tracing::debug!(
        source_id,
        unchanged_active = summary.unchanged_active,
        deactivated = summary.deactivated,
        reactivated = summary.reactivated,
        boundary_invalidated = summary.boundary_invalidated,
        "reconciliation pass complete"
    );

    Ok(summary)
}
