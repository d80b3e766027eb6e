//! Seeding of tracked sources from the yaml config file.

use adtrack_core::SourceConfig;
use sqlx::PgPool;

use crate::DbError;

/// Upsert tracked sources from config into the `brands` table.
///
/// Returns the number of sources processed (inserted or updated). All upserts
/// run inside a single transaction; if any operation fails the entire batch
/// is rolled back. `total_ads` is never touched here — it belongs to the
/// tracking cycle.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any database operation fails.
pub async fn seed_sources(pool: &PgPool, sources: &[SourceConfig]) -> Result<usize, DbError> {
    let mut tx = pool.begin().await?;
    let mut count = 0usize;

    for source in sources {
        sqlx::query(
            "INSERT INTO brands (source_id, name) \
             VALUES ($1, $2) \
             ON CONFLICT (source_id) DO UPDATE SET \
                 name = EXCLUDED.name, \
                 updated_at = NOW()",
        )
        .bind(&source.source_id)
        .bind(&source.name)
        .execute(&mut *tx)
        .await?;

        count += 1;
    }

    tx.commit().await?;
    Ok(count)
}
