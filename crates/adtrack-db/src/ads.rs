//! Database operations for the `ads` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// Media pipeline state for one ad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "media_status", rename_all = "lowercase")]
pub enum MediaStatus {
    Pending,
    Processing,
    Success,
    Failed,
}

/// A row from the `ads` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AdRow {
    pub id: i64,
    pub library_id: String,
    pub brand_id: i64,
    pub raw_content: serde_json::Value,
    pub media_status: MediaStatus,
    pub media_retry_count: i32,
    pub local_image_url: Option<String>,
    pub local_video_url: Option<String>,
    pub media_error: Option<String>,
    pub media_downloaded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to ingest a newly discovered remote ad. Media fields start
/// at their defaults (`pending`, zero retries).
#[derive(Debug, Clone, Copy)]
pub struct NewAd<'a> {
    pub library_id: &'a str,
    pub brand_id: i64,
    pub raw_content: &'a serde_json::Value,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Inserts a newly discovered ad, swallowing duplicate `library_id` races.
///
/// Returns `true` when a row was actually written and `false` when another
/// writer got there first (`ON CONFLICT DO NOTHING`).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails for any reason other than a
/// duplicate key.
pub async fn insert_ad(pool: &PgPool, ad: NewAd<'_>) -> Result<bool, DbError> {
    let result = sqlx::query(
        "INSERT INTO ads (library_id, brand_id, raw_content) \
         VALUES ($1, $2, $3) \
         ON CONFLICT (library_id) DO NOTHING",
    )
    .bind(ad.library_id)
    .bind(ad.brand_id)
    .bind(ad.raw_content)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Returns the ad with the given remote library id, or `None` if unknown.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_ad_by_library_id(
    pool: &PgPool,
    library_id: &str,
) -> Result<Option<AdRow>, DbError> {
    let row = sqlx::query_as::<_, AdRow>(
        "SELECT id, library_id, brand_id, raw_content, media_status, media_retry_count, \
                local_image_url, local_video_url, media_error, media_downloaded_at, \
                created_at, updated_at \
         FROM ads \
         WHERE library_id = $1",
    )
    .bind(library_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns whether an ad with the given remote library id is already stored.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn ad_exists(pool: &PgPool, library_id: &str) -> Result<bool, DbError> {
    let exists =
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM ads WHERE library_id = $1)")
            .bind(library_id)
            .fetch_one(pool)
            .await?;

    Ok(exists)
}

/// Returns every ad belonging to the brand tracking `source_id`, newest first
/// by local ingestion time.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_ads_for_source(pool: &PgPool, source_id: &str) -> Result<Vec<AdRow>, DbError> {
    let rows = sqlx::query_as::<_, AdRow>(
        "SELECT a.id, a.library_id, a.brand_id, a.raw_content, a.media_status, \
                a.media_retry_count, a.local_image_url, a.local_video_url, a.media_error, \
                a.media_downloaded_at, a.created_at, a.updated_at \
         FROM ads a \
         JOIN brands b ON b.id = a.brand_id \
         WHERE b.source_id = $1 \
         ORDER BY a.created_at DESC",
    )
    .bind(source_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Rewrites an ad's raw content document.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn update_ad_content(
    pool: &PgPool,
    ad_id: i64,
    raw_content: &serde_json::Value,
) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE ads \
         SET raw_content = $1, updated_at = NOW() \
         WHERE id = $2",
    )
    .bind(raw_content)
    .bind(ad_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Selects the next batch of ads for the media worker: `pending`, or `failed`
/// with a retry count still below `retry_ceiling`. Ordered by ascending retry
/// count then ascending creation time so fresh work and starving retries are
/// both serviced.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_media_queue(
    pool: &PgPool,
    batch_size: i64,
    retry_ceiling: i32,
) -> Result<Vec<AdRow>, DbError> {
    let rows = sqlx::query_as::<_, AdRow>(
        "SELECT id, library_id, brand_id, raw_content, media_status, media_retry_count, \
                local_image_url, local_video_url, media_error, media_downloaded_at, \
                created_at, updated_at \
         FROM ads \
         WHERE media_status = 'pending' \
            OR (media_status = 'failed' AND media_retry_count < $1) \
         ORDER BY media_retry_count ASC, created_at ASC \
         LIMIT $2",
    )
    .bind(retry_ceiling)
    .bind(batch_size)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Marks an ad as being processed by the media worker.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn mark_media_processing(pool: &PgPool, ad_id: i64) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE ads \
         SET media_status = 'processing', updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(ad_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Records a successful media fetch: resets the retry count, clears any prior
/// error, stamps the download time, and stores whichever local URLs were
/// produced.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn record_media_success(
    pool: &PgPool,
    ad_id: i64,
    local_image_url: Option<&str>,
    local_video_url: Option<&str>,
) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE ads \
         SET media_status = 'success', \
             media_retry_count = 0, \
             media_error = NULL, \
             media_downloaded_at = NOW(), \
             local_image_url = COALESCE($1, local_image_url), \
             local_video_url = COALESCE($2, local_video_url), \
             updated_at = NOW() \
         WHERE id = $3",
    )
    .bind(local_image_url)
    .bind(local_video_url)
    .bind(ad_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Records an unsuccessful media pass: bumps the retry count, optionally
/// replaces the error message, and either parks the ad back in `pending` or
/// marks it terminally `failed`.
///
/// When `error` is `None` the existing `media_error` is preserved.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn record_media_retry(
    pool: &PgPool,
    ad_id: i64,
    retry_count: i32,
    terminal: bool,
    error: Option<&str>,
) -> Result<(), DbError> {
    let status = if terminal {
        MediaStatus::Failed
    } else {
        MediaStatus::Pending
    };
    let error_supplied = error.is_some();

    sqlx::query(
        "UPDATE ads \
         SET media_status = $1, \
             media_retry_count = $2, \
             media_error = CASE WHEN $3::BOOL THEN $4 ELSE media_error END, \
             updated_at = NOW() \
         WHERE id = $5",
    )
    .bind(status)
    .bind(retry_count)
    .bind(error_supplied)
    .bind(error)
    .bind(ad_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Counts the ads belonging to a brand.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_ads_for_brand(pool: &PgPool, brand_id: i64) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM ads WHERE brand_id = $1")
        .bind(brand_id)
        .fetch_one(pool)
        .await?;

    Ok(count)
}
