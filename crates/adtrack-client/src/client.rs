//! HTTP client for the ad-library `ads` listing endpoint.

use std::time::Duration;

use reqwest::{Client, Url};

use crate::error::LibraryError;
use crate::rate_limit::retry_with_backoff;
use crate::types::{ListAdsResponse, RemoteAd};

/// Client for the remote ad-library API.
///
/// Handles rate limiting (429), not-found (404), and other non-2xx responses
/// as typed errors. Transient errors (429, network failures) are automatically
/// retried with exponential backoff up to `max_retries` additional attempts.
pub struct LibraryClient {
    client: Client,
    base_url: Url,
    /// Maximum number of retry attempts after the first failure.
    max_retries: u32,
    /// Base delay in seconds for exponential backoff: `backoff_base_secs * 2^attempt`.
    backoff_base_secs: u64,
}

impl LibraryClient {
    /// Creates a `LibraryClient` with configured timeout, `User-Agent`, and
    /// retry policy. `base_url` may point at a mock server in tests.
    ///
    /// `max_retries` is the number of additional attempts after the first
    /// failure for retriable errors (429, network errors). Set to `0` to
    /// disable retries.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`LibraryError::InvalidBaseUrl`] if
    /// `base_url` does not parse.
    pub fn new(
        base_url: &str,
        timeout_secs: u64,
        user_agent: &str,
        max_retries: u32,
        backoff_base_secs: u64,
    ) -> Result<Self, LibraryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        // Normalise: ensure the base URL ends with exactly one slash so that
        // Url::join appends to the path rather than replacing the last segment.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| LibraryError::InvalidBaseUrl {
            base_url: base_url.to_owned(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            base_url,
            max_retries,
            backoff_base_secs,
        })
    }

    /// Fetches one page of ads for a source at the given offset, with
    /// automatic retry on transient errors.
    ///
    /// The remote orders results newest first; no other ordering contract is
    /// assumed.
    ///
    /// # Errors
    ///
    /// - [`LibraryError::RateLimited`] — HTTP 429 after all retries exhausted.
    /// - [`LibraryError::NotFound`] — HTTP 404 (not retried).
    /// - [`LibraryError::UnexpectedStatus`] — any other non-2xx status (not retried).
    /// - [`LibraryError::Http`] — network or TLS failure after all retries exhausted.
    /// - [`LibraryError::Deserialize`] — response body is not valid JSON (not retried).
    pub async fn list_ads(
        &self,
        source_id: &str,
        page_size: u32,
        offset: u32,
    ) -> Result<Vec<RemoteAd>, LibraryError> {
        let url = self.ads_url(source_id, page_size, offset)?;
        let max_retries = self.max_retries;
        let backoff_base_secs = self.backoff_base_secs;

        retry_with_backoff(max_retries, backoff_base_secs, || {
            let url = url.clone();
            let source_id = source_id.to_owned();
            async move {
                let response = self
                    .client
                    .get(url.clone())
                    .header(reqwest::header::ACCEPT, "application/json")
                    .send()
                    .await?;
                let status = response.status();

                if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    let retry_after_secs = response
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .unwrap_or(60);

                    return Err(LibraryError::RateLimited {
                        source_id,
                        retry_after_secs,
                    });
                }

                if status == reqwest::StatusCode::NOT_FOUND {
                    return Err(LibraryError::NotFound {
                        url: url.to_string(),
                    });
                }

                if !status.is_success() {
                    return Err(LibraryError::UnexpectedStatus {
                        status: status.as_u16(),
                        url: url.to_string(),
                    });
                }

                let body = response.text().await?;
                let parsed = serde_json::from_str::<ListAdsResponse>(&body).map_err(|e| {
                    LibraryError::Deserialize {
                        context: format!("ads page for source {source_id} at offset {offset}"),
                        source: e,
                    }
                })?;

                Ok(parsed.ads)
            }
        })
        .await
    }

    /// Builds the `ads` listing URL for the given source, page size, and offset.
    fn ads_url(&self, source_id: &str, limit: u32, offset: u32) -> Result<Url, LibraryError> {
        let mut url = self
            .base_url
            .join("ads")
            .map_err(|e| LibraryError::InvalidBaseUrl {
                base_url: self.base_url.to_string(),
                reason: e.to_string(),
            })?;

        url.query_pairs_mut()
            .append_pair("source_id", source_id)
            .append_pair("limit", &limit.to_string())
            .append_pair("offset", &offset.to_string());

        Ok(url)
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
