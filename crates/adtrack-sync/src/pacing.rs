//! Inter-request delays, injectable so tests run without wall-clock waits.

use std::time::Duration;

/// The fixed delays inserted between remote operations. The remote library
/// and the storage service both penalize bursts, so throughput is capped by
/// these rather than by concurrency.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    /// Between pagination pages within one walk.
    pub inter_page: Duration,
    /// Between sources within one tracking cycle.
    pub inter_source: Duration,
    /// Between ads within one media batch.
    pub inter_ad: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            inter_page: Duration::from_millis(500),
            inter_source: Duration::from_millis(2000),
            inter_ad: Duration::from_millis(1000),
        }
    }
}

impl Pacing {
    /// All delays zeroed; for tests.
    #[must_use]
    pub fn none() -> Self {
        Self {
            inter_page: Duration::ZERO,
            inter_source: Duration::ZERO,
            inter_ad: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn from_app_config(config: &adtrack_core::AppConfig) -> Self {
        Self {
            inter_page: Duration::from_millis(config.inter_page_delay_ms),
            inter_source: Duration::from_millis(config.inter_source_delay_ms),
            inter_ad: Duration::from_millis(config.inter_ad_delay_ms),
        }
    }

    pub(crate) async fn between_pages(&self) {
        sleep_unless_zero(self.inter_page).await;
    }

    pub(crate) async fn between_sources(&self) {
        sleep_unless_zero(self.inter_source).await;
    }

    pub(crate) async fn between_ads(&self) {
        sleep_unless_zero(self.inter_ad).await;
    }
}

async fn sleep_unless_zero(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}
