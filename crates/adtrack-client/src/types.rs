//! Typed response shapes for the ad-library API.

use serde::Deserialize;

/// One ad record as returned by the library's `ads` listing endpoint.
///
/// `content` is the opaque creative document the rest of the system stores
/// verbatim; the typed fields alongside it are the listing-level conveniences
/// the API duplicates out of the document.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteAd {
    pub id: String,
    #[serde(default, rename = "type")]
    pub ad_type: Option<String>,
    pub content: serde_json::Value,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_time: Option<String>,
}

/// Envelope for the `ads` listing endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ListAdsResponse {
    pub ads: Vec<RemoteAd>,
}
