//! Media candidate extraction and the durable-storage client.

mod error;
mod extract;
mod storage;

pub use error::MediaError;
pub use extract::{extract_media_candidates, MediaCandidates};
pub use storage::{MediaKind, MediaStorage};
