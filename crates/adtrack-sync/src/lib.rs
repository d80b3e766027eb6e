//! The tracking core: boundary resolution, bounded pagination, status
//! reconciliation, the tracking scheduler, and the media ingestion worker.
//!
//! Everything here talks to the outside world through three ports —
//! [`AdStore`], [`RemoteLibrary`], and [`MediaSink`] — so the cycle logic is
//! testable without a database or network. The production adapters live in
//! [`adapters`].

mod adapters;
mod boundary;
mod media_worker;
mod pacing;
mod ports;
mod reconcile;
mod tracker;
mod walker;

#[cfg(test)]
mod testutil;

pub use adapters::PgAdStore;
pub use boundary::{resolve_boundary, SyncBoundary};
pub use media_worker::{BatchSummary, MediaWorker, MediaWorkerConfig, WorkerStats};
pub use pacing::Pacing;
pub use ports::{AdStore, MediaSink, RemoteLibrary};
pub use reconcile::{reconcile_statuses, ReconcileSummary};
pub use tracker::{SourceSyncSummary, Tracker, TrackerConfig};
pub use walker::{collect_new_ads, WalkConfig};
