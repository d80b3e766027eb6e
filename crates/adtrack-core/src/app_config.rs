use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,
    pub sources_path: PathBuf,
    pub library_base_url: String,
    pub storage_base_url: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub client_max_retries: u32,
    pub client_backoff_base_secs: u64,
    pub tracking_interval_secs: u64,
    pub media_interval_secs: u64,
    pub page_size: u32,
    pub max_pages: usize,
    pub snapshot_limit: u32,
    pub inter_page_delay_ms: u64,
    pub inter_source_delay_ms: u64,
    pub inter_ad_delay_ms: u64,
    pub media_batch_size: usize,
    pub media_retry_ceiling: i32,
    pub media_exception_retry_ceiling: i32,
    pub probe_timeout_secs: u64,
    pub upload_image_timeout_secs: u64,
    pub upload_video_timeout_secs: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("sources_path", &self.sources_path)
            .field("database_url", &"[redacted]")
            .field("library_base_url", &self.library_base_url)
            .field("storage_base_url", &self.storage_base_url)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("client_max_retries", &self.client_max_retries)
            .field("client_backoff_base_secs", &self.client_backoff_base_secs)
            .field("tracking_interval_secs", &self.tracking_interval_secs)
            .field("media_interval_secs", &self.media_interval_secs)
            .field("page_size", &self.page_size)
            .field("max_pages", &self.max_pages)
            .field("snapshot_limit", &self.snapshot_limit)
            .field("inter_page_delay_ms", &self.inter_page_delay_ms)
            .field("inter_source_delay_ms", &self.inter_source_delay_ms)
            .field("inter_ad_delay_ms", &self.inter_ad_delay_ms)
            .field("media_batch_size", &self.media_batch_size)
            .field("media_retry_ceiling", &self.media_retry_ceiling)
            .field(
                "media_exception_retry_ceiling",
                &self.media_exception_retry_ceiling,
            )
            .field("probe_timeout_secs", &self.probe_timeout_secs)
            .field("upload_image_timeout_secs", &self.upload_image_timeout_secs)
            .field("upload_video_timeout_secs", &self.upload_video_timeout_secs)
            .finish()
    }
}
