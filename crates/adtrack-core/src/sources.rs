//! Tracked-source seed configuration (`config/sources.yaml`).

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// One tracked ad-library source as declared in the sources file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Remote ad-library page identifier.
    pub source_id: String,
    /// Human-readable brand name.
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct SourcesFile {
    sources: Vec<SourceConfig>,
}

/// Load and validate the tracked-source list from a yaml file.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] / [`ConfigError::Yaml`] on read or parse
/// failure, and [`ConfigError::DuplicateSource`] when two entries share a
/// `source_id`.
pub fn load_sources_file(path: &Path) -> Result<Vec<SourceConfig>, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    parse_sources(&raw)
}

fn parse_sources(raw: &str) -> Result<Vec<SourceConfig>, ConfigError> {
    let file: SourcesFile = serde_yaml::from_str(raw)?;

    let mut seen = HashSet::new();
    for source in &file.sources {
        if !seen.insert(source.source_id.as_str()) {
            return Err(ConfigError::DuplicateSource(source.source_id.clone()));
        }
    }

    Ok(file.sources)
}
