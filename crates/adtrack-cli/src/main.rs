use clap::{Parser, Subcommand};
use sqlx::PgPool;

use adtrack_client::LibraryClient;
use adtrack_core::AppConfig;
use adtrack_media::MediaStorage;
use adtrack_sync::{
    MediaWorker, MediaWorkerConfig, Pacing, PgAdStore, Tracker, TrackerConfig,
};

#[derive(Debug, Parser)]
#[command(name = "adtrack-cli")]
#[command(about = "Ad-library tracking command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Upsert tracked sources from the sources config file.
    Seed,
    /// Run one tracking cycle, or sync a single source out of band.
    Sync {
        /// Remote source id to sync; omitting it syncs every tracked source.
        #[arg(long)]
        source: Option<String>,
    },
    /// Process one media ingestion batch.
    MediaBatch,
    /// Show tracked brands and their ad counts.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = adtrack_core::load_app_config()?;
    let pool_config = adtrack_db::PoolConfig::from_app_config(&config);
    let pool = adtrack_db::connect_pool(&config.database_url, pool_config).await?;
    adtrack_db::run_migrations(&pool).await?;

    match cli.command {
        Commands::Seed => run_seed(&pool, &config).await,
        Commands::Sync { source } => run_sync(pool, &config, source.as_deref()).await,
        Commands::MediaBatch => run_media_batch(pool, &config).await,
        Commands::Status => run_status(&pool).await,
    }
}

async fn run_seed(pool: &PgPool, config: &AppConfig) -> anyhow::Result<()> {
    let sources = adtrack_core::load_sources_file(&config.sources_path)?;
    let seeded = adtrack_db::seed_sources(pool, &sources).await?;
    println!("seeded {seeded} tracked sources");
    Ok(())
}

async fn run_sync(pool: PgPool, config: &AppConfig, source: Option<&str>) -> anyhow::Result<()> {
    let library = LibraryClient::new(
        &config.library_base_url,
        config.request_timeout_secs,
        &config.user_agent,
        config.client_max_retries,
        config.client_backoff_base_secs,
    )?;
    let tracker = Tracker::new(
        PgAdStore::new(pool),
        library,
        TrackerConfig::from_app_config(config),
        Pacing::from_app_config(config),
    );

    match source {
        Some(source_id) => {
            let summary = tracker.sync_source(source_id).await?;
            println!(
                "synced {source_id}: {} new, {} deactivated, {} reactivated, {} total",
                summary.new_ads,
                summary.reconcile.deactivated,
                summary.reconcile.reactivated,
                summary.total_ads
            );
        }
        None => {
            tracker.run_cycle().await;
            println!("tracking cycle complete");
        }
    }
    Ok(())
}

async fn run_media_batch(pool: PgPool, config: &AppConfig) -> anyhow::Result<()> {
    let storage = MediaStorage::new(
        &config.storage_base_url,
        &config.user_agent,
        config.probe_timeout_secs,
        config.upload_image_timeout_secs,
        config.upload_video_timeout_secs,
    )?;
    let worker = MediaWorker::new(
        PgAdStore::new(pool),
        storage,
        MediaWorkerConfig::from_app_config(config),
        Pacing::from_app_config(config),
    );

    let summary = worker.run_batch().await?;
    println!(
        "media batch: {} processed, {} succeeded, {} retried, {} failed",
        summary.processed, summary.succeeded, summary.retried, summary.failed
    );
    Ok(())
}

async fn run_status(pool: &PgPool) -> anyhow::Result<()> {
    let source_ids = adtrack_db::list_tracked_source_ids(pool).await?;
    if source_ids.is_empty() {
        println!("no tracked sources");
        return Ok(());
    }

    for source_id in source_ids {
        if let Some(brand) = adtrack_db::find_brand_by_source_id(pool, &source_id).await? {
            println!(
                "{:<24} source={:<16} ads={}",
                brand.name, brand.source_id, brand.total_ads
            );
        }
    }
    Ok(())
}
