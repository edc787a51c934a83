//! Travel cache types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Memoized travel estimate between two client locations. Stored under the
/// ordered pair; lookups treat direction loosely.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TravelCacheEntry {
    pub origin_client_id: Uuid,
    pub dest_client_id: Uuid,
    pub distance_km: f64,
    pub minutes: i64,
}

/// Request to drop all cached estimates touching a client. Sent by the
/// geocoding pipeline after a coordinate change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidateTravelRequest {
    pub client_id: Uuid,
}

/// Response for a cache invalidation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidateTravelResponse {
    pub entries_removed: i64,
    pub invalidated_at: DateTime<Utc>,
}
