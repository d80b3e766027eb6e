//! Database operations for the `brands` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row type
// ---------------------------------------------------------------------------

/// A row from the `brands` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BrandRow {
    pub id: i64,
    pub public_id: Uuid,
    pub source_id: String,
    pub name: String,
    pub total_ads: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Returns the brand tracking the given remote source, or `None` if not found.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_brand_by_source_id(
    pool: &PgPool,
    source_id: &str,
) -> Result<Option<BrandRow>, DbError> {
    let row = sqlx::query_as::<_, BrandRow>(
        "SELECT id, public_id, source_id, name, total_ads, created_at, updated_at \
         FROM brands \
         WHERE source_id = $1",
    )
    .bind(source_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Creates a new brand row for a tracked source and returns the inserted row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails (including unique constraint
/// violations on `source_id`).
pub async fn create_brand(pool: &PgPool, source_id: &str, name: &str) -> Result<BrandRow, DbError> {
    let row = sqlx::query_as::<_, BrandRow>(
        "INSERT INTO brands (source_id, name) \
         VALUES ($1, $2) \
         RETURNING id, public_id, source_id, name, total_ads, created_at, updated_at",
    )
    .bind(source_id)
    .bind(name)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Updates the denormalized `total_ads` count for a brand.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn update_brand_total_ads(
    pool: &PgPool,
    brand_id: i64,
    total_ads: i64,
) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE brands \
         SET total_ads = $1, updated_at = NOW() \
         WHERE id = $2",
    )
    .bind(total_ads)
    .bind(brand_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Returns the distinct source ids of every tracked brand, ordered by name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_tracked_source_ids(pool: &PgPool) -> Result<Vec<String>, DbError> {
    let ids = sqlx::query_scalar::<_, String>("SELECT source_id FROM brands ORDER BY name")
        .fetch_all(pool)
        .await?;

    Ok(ids)
}
