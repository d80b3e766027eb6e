//! Client for the durable media storage service.
//!
//! The storage service ingests media by reference: we hand it the origin URL
//! and it fetches, transcodes, and hosts the asset, returning a stable
//! secure URL. Origin URLs are HEAD-probed first so an upload is only
//! attempted against a host that still serves the asset.

use std::time::Duration;

use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::MediaError;

/// The kind of asset being ingested; selects the upload timeout and the
/// storage service's processing profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize)]
struct UploadRequest<'a> {
    source_url: &'a str,
    kind: &'static str,
    public_id: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

/// HTTP client for probing media origins and uploading to durable storage.
pub struct MediaStorage {
    client: Client,
    base_url: Url,
    probe_timeout: Duration,
    image_timeout: Duration,
    video_timeout: Duration,
}

impl MediaStorage {
    /// Creates a `MediaStorage` client.
    ///
    /// `base_url` is the storage service root; it may point at a mock server
    /// in tests. The probe timeout bounds origin HEAD checks; the image/video
    /// timeouts bound uploads of the respective kind.
    ///
    /// # Errors
    ///
    /// Returns [`MediaError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`MediaError::InvalidBaseUrl`] if `base_url`
    /// does not parse.
    pub fn new(
        base_url: &str,
        user_agent: &str,
        probe_timeout_secs: u64,
        image_timeout_secs: u64,
        video_timeout_secs: u64,
    ) -> Result<Self, MediaError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| MediaError::InvalidBaseUrl {
            base_url: base_url.to_owned(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            base_url,
            probe_timeout: Duration::from_secs(probe_timeout_secs),
            image_timeout: Duration::from_secs(image_timeout_secs),
            video_timeout: Duration::from_secs(video_timeout_secs),
        })
    }

    /// HEAD-checks whether a media origin URL is still accessible.
    ///
    /// Any failure — timeout, network error, non-2xx status — counts as
    /// inaccessible; the caller simply moves on to the next candidate.
    pub async fn probe(&self, url: &str) -> bool {
        let result = self
            .client
            .head(url)
            .timeout(self.probe_timeout)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                tracing::debug!(url, status = response.status().as_u16(), "probe rejected");
                false
            }
            Err(e) => {
                tracing::debug!(url, error = %e, "probe failed");
                false
            }
        }
    }

    /// Uploads the asset at `source_url` to durable storage by reference and
    /// returns the stable secure URL it is now served from.
    ///
    /// # Errors
    ///
    /// - [`MediaError::Http`] — network failure or timeout.
    /// - [`MediaError::UnexpectedStatus`] — non-2xx from the storage service.
    /// - [`MediaError::Deserialize`] — response body is not the expected shape.
    pub async fn upload(&self, source_url: &str, kind: MediaKind) -> Result<String, MediaError> {
        let url = self
            .base_url
            .join("upload")
            .map_err(|e| MediaError::InvalidBaseUrl {
                base_url: self.base_url.to_string(),
                reason: e.to_string(),
            })?;

        let timeout = match kind {
            MediaKind::Image => self.image_timeout,
            MediaKind::Video => self.video_timeout,
        };

        let request = UploadRequest {
            source_url,
            kind: kind.as_str(),
            public_id: public_id_for(source_url),
        };

        let response = self
            .client
            .post(url.clone())
            .timeout(timeout)
            .json(&request)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            return Err(MediaError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        let parsed =
            serde_json::from_str::<UploadResponse>(&body).map_err(|e| MediaError::Deserialize {
                context: format!("upload response for {source_url}"),
                source: e,
            })?;

        Ok(parsed.secure_url)
    }
}

/// Derives a stable storage public id from the origin URL, so re-uploading
/// the same origin overwrites rather than duplicates.
fn public_id_for(source_url: &str) -> String {
    let digest = Sha256::digest(source_url.as_bytes());
    let hex = format!("{digest:x}");
    hex[..32].to_owned()
}
