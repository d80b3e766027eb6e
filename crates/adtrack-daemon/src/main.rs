use tracing_subscriber::EnvFilter;

use adtrack_client::LibraryClient;
use adtrack_media::MediaStorage;
use adtrack_sync::{
    MediaWorker, MediaWorkerConfig, Pacing, PgAdStore, Tracker, TrackerConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = adtrack_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = adtrack_db::PoolConfig::from_app_config(&config);
    let pool = adtrack_db::connect_pool(&config.database_url, pool_config).await?;
    adtrack_db::run_migrations(&pool).await?;

    match adtrack_core::load_sources_file(&config.sources_path) {
        Ok(sources) => {
            let seeded = adtrack_db::seed_sources(&pool, &sources).await?;
            tracing::info!(seeded, "tracked sources seeded from config");
        }
        Err(e) => {
            tracing::warn!(
                path = %config.sources_path.display(),
                error = %e,
                "could not load sources file — continuing with already-tracked sources"
            );
        }
    }

    let library = LibraryClient::new(
        &config.library_base_url,
        config.request_timeout_secs,
        &config.user_agent,
        config.client_max_retries,
        config.client_backoff_base_secs,
    )?;
    let storage = MediaStorage::new(
        &config.storage_base_url,
        &config.user_agent,
        config.probe_timeout_secs,
        config.upload_image_timeout_secs,
        config.upload_video_timeout_secs,
    )?;
    let pacing = Pacing::from_app_config(&config);

    let tracker = Tracker::new(
        PgAdStore::new(pool.clone()),
        library,
        TrackerConfig::from_app_config(&config),
        pacing,
    );
    let media_worker = MediaWorker::new(
        PgAdStore::new(pool),
        storage,
        MediaWorkerConfig::from_app_config(&config),
        pacing,
    );

    tracker.start();
    media_worker.start();

    shutdown_signal().await;

    tracker.stop();
    media_worker.stop();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
