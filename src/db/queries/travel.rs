//! Travel cache database queries

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::TravelCacheEntry;

/// Fetch every cache entry whose both endpoints are among the given
/// clients, in one round-trip. The caller narrows the result to the exact
/// pairs it asked for.
pub async fn get_entries_among(pool: &PgPool, client_ids: &[Uuid]) -> Result<Vec<TravelCacheEntry>> {
    let entries = sqlx::query_as::<_, TravelCacheEntry>(
        r#"
        SELECT origin_client_id, dest_client_id, distance_km, minutes
        FROM travel_cache
        WHERE origin_client_id = ANY($1) AND dest_client_id = ANY($1)
        "#,
    )
    .bind(client_ids)
    .fetch_all(pool)
    .await?;

    Ok(entries)
}

/// Insert or refresh a cache entry. The upsert keeps races between
/// concurrent rota requests harmless.
pub async fn upsert_entry(pool: &PgPool, entry: &TravelCacheEntry) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO travel_cache (origin_client_id, dest_client_id, distance_km, minutes, created_at)
        VALUES ($1, $2, $3, $4, NOW())
        ON CONFLICT (origin_client_id, dest_client_id)
        DO UPDATE SET distance_km = EXCLUDED.distance_km, minutes = EXCLUDED.minutes
        "#,
    )
    .bind(entry.origin_client_id)
    .bind(entry.dest_client_id)
    .bind(entry.distance_km)
    .bind(entry.minutes)
    .execute(pool)
    .await?;

    Ok(())
}

/// Delete every entry where the client appears on either side. Called when
/// a client's coordinates change.
pub async fn delete_for_client(pool: &PgPool, client_id: Uuid) -> Result<i64> {
    let result = sqlx::query(
        "DELETE FROM travel_cache WHERE origin_client_id = $1 OR dest_client_id = $1",
    )
    .bind(client_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() as i64)
}
