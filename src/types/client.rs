//! Client (care recipient) types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Client entity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: Uuid,
    pub agency_id: Uuid,
    pub name: String,
    pub address: String,
    pub postcode: Option<String>,

    // Coordinates (from geocoding). Geocoding is asynchronous and may never
    // succeed; both are set together or not at all.
    pub lat: Option<f64>,
    pub lng: Option<f64>,

    // Geocoding status: 'pending', 'success', 'failed'
    pub geocode_status: String,

    pub requires_double_up: bool,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Client {
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some(Coordinates { lat, lng }),
            _ => None,
        }
    }
}

/// Coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// Request to create a client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClientRequest {
    pub agency_id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub postcode: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub requires_double_up: Option<bool>,
}

/// Request to update a client. Coordinate changes (manual edit or geocoding
/// result) invalidate the travel cache for this client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClientRequest {
    pub id: Uuid,
    pub agency_id: Uuid,
    pub name: Option<String>,
    pub address: Option<String>,
    pub postcode: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub geocode_status: Option<String>,
    pub requires_double_up: Option<bool>,
}

/// Request to list clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListClientsRequest {
    pub agency_id: Uuid,
    pub search: Option<String>,
    pub include_archived: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Response for listing clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListClientsResponse {
    pub clients: Vec<Client>,
    pub total: i64,
}

/// Request to archive a client (and its visits)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveClientRequest {
    pub id: Uuid,
    pub agency_id: Uuid,
}

/// Response for archiving a client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveClientResponse {
    pub archived: bool,
    pub visits_archived: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinates_require_both_fields() {
        let mut client = Client {
            id: Uuid::new_v4(),
            agency_id: Uuid::new_v4(),
            name: "Ada Price".to_string(),
            address: "12 Hill Road".to_string(),
            postcode: Some("SW1A 1AA".to_string()),
            lat: Some(51.5007),
            lng: Some(-0.1246),
            geocode_status: "success".to_string(),
            requires_double_up: false,
            archived: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert!(client.coordinates().is_some());

        client.lng = None;
        assert!(client.coordinates().is_none());
    }
}
