//! Candidate media URL extraction from raw ad content.
//!
//! Ad-library creative documents bury their media references at varying
//! depths (card decks, snapshots, per-variant renditions), so extraction
//! walks the whole JSON tree and classifies every HTTPS URL it finds by a
//! combination of known media-host shapes, file-extension heuristics, and
//! the name of the key the URL was stored under.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static IMAGE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(jpe?g|png|gif|webp)(\?|$)").expect("image extension regex must compile")
});

static VIDEO_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(mp4|mov|webm|m4v)(\?|$)").expect("video extension regex must compile")
});

/// Known ad-CDN hosts that serve video without a file extension in the path.
static VIDEO_HOST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^https://video[.-][\w.-]+/").expect("video host regex must compile")
});

/// Known ad-CDN hosts that serve images without a file extension in the path.
static IMAGE_HOST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^https://(scontent|img|images?)[.-][\w.-]+/")
        .expect("image host regex must compile")
});

/// Candidate media URLs extracted from one ad's raw content, in document
/// order, deduplicated, HTTPS only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaCandidates {
    pub images: Vec<String>,
    pub videos: Vec<String>,
}

impl MediaCandidates {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.images.is_empty() && self.videos.is_empty()
    }
}

/// Extracts image and video candidate URLs from a raw ad content document.
///
/// Only URLs on a secure transport are kept. Candidates retain document order
/// so the first entry is the remote's preferred rendition.
#[must_use]
pub fn extract_media_candidates(doc: &Value) -> MediaCandidates {
    let mut candidates = MediaCandidates::default();
    let mut seen = HashSet::new();
    walk(doc, None, &mut candidates, &mut seen);
    candidates
}

fn walk<'a>(
    value: &'a Value,
    key_hint: Option<&str>,
    out: &mut MediaCandidates,
    seen: &mut HashSet<&'a str>,
) {
    match value {
        Value::String(s) => classify(s, key_hint, out, seen),
        Value::Array(items) => {
            for item in items {
                walk(item, key_hint, out, seen);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                walk(item, Some(key.as_str()), out, seen);
            }
        }
        _ => {}
    }
}

fn classify<'a>(
    raw: &'a str,
    key_hint: Option<&str>,
    out: &mut MediaCandidates,
    seen: &mut HashSet<&'a str>,
) {
    let url = raw.trim();
    if !url.starts_with("https://") || !seen.insert(url) {
        return;
    }

    if is_video_url(url, key_hint) {
        out.videos.push(url.to_owned());
    } else if is_image_url(url, key_hint) {
        out.images.push(url.to_owned());
    }
}

fn is_video_url(url: &str, key_hint: Option<&str>) -> bool {
    if VIDEO_URL.is_match(url) || VIDEO_HOST.is_match(url) {
        return true;
    }
    // Key names like "video_hd_url" mark extension-less renditions, but
    // "video_preview_image_url" is a poster frame, not a video.
    key_hint.is_some_and(|k| {
        let k = k.to_ascii_lowercase();
        k.contains("video") && !k.contains("image")
    })
}

fn is_image_url(url: &str, key_hint: Option<&str>) -> bool {
    if IMAGE_URL.is_match(url) || IMAGE_HOST.is_match(url) {
        return true;
    }
    key_hint.is_some_and(|k| k.to_ascii_lowercase().contains("image"))
}
