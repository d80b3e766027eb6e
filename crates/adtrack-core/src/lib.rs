use thiserror::Error;

pub mod app_config;
pub mod config;
pub mod envelope;
pub mod sources;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use envelope::{
    with_active_flag, AdContent, DEFAULT_ACTIVE_ON_PARSE_ERROR,
    FALLBACK_TO_CREATED_AT_ON_DATE_PARSE_ERROR,
};
pub use sources::{load_sources_file, SourceConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("could not read sources file: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse sources file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("duplicate source id in sources file: {0}")]
    DuplicateSource(String),
}
