//! HTTP client for the remote ad-library API.

mod client;
mod error;
pub(crate) mod rate_limit;
mod types;

pub use client::LibraryClient;
pub use error::LibraryError;
pub use types::{ListAdsResponse, RemoteAd};
