//! Carer (care staff) types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Carer entity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Carer {
    pub id: Uuid,
    pub agency_id: Uuid,
    pub name: String,
    /// Inactive carers are excluded from new scheduling but keep their
    /// historical visit references.
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to create a carer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCarerRequest {
    pub agency_id: Uuid,
    pub name: String,
}

/// Request to update a carer (rename or activate/deactivate)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCarerRequest {
    pub id: Uuid,
    pub agency_id: Uuid,
    pub name: Option<String>,
    pub active: Option<bool>,
}

/// Request to list carers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCarersRequest {
    pub agency_id: Uuid,
    pub include_inactive: Option<bool>,
}

/// Response for listing carers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCarersResponse {
    pub carers: Vec<Carer>,
}
