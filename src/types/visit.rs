//! Visit types
//!
//! A visit is a scheduled care appointment at a client's home. Most visits
//! have a single carer; a joint (double-up) visit carries two distinct carer
//! references because both must be present for the whole slot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Visit status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisitStatus {
    Scheduled,
    InProgress,
    Completed,
    Missed,
}

impl VisitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Missed => "missed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scheduled" => Some(Self::Scheduled),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "missed" => Some(Self::Missed),
            _ => None,
        }
    }
}

/// Carer assignment of a visit, normalized once at the ingestion boundary.
///
/// The record store carries `carer_id` + `second_carer_id`; everything
/// downstream matches on this sum type instead of re-checking the two
/// columns ad hoc.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarerAssignment {
    Single(Uuid),
    Joint(Uuid, Uuid),
}

impl CarerAssignment {
    /// Normalize the raw column pair. A second carer equal to the primary
    /// collapses to `Single`; no primary at all means unassigned (`None`).
    pub fn from_columns(carer_id: Option<Uuid>, second_carer_id: Option<Uuid>) -> Option<Self> {
        match (carer_id, second_carer_id) {
            (Some(primary), Some(secondary)) if primary != secondary => {
                Some(Self::Joint(primary, secondary))
            }
            (Some(primary), _) => Some(Self::Single(primary)),
            (None, Some(secondary)) => Some(Self::Single(secondary)),
            (None, None) => None,
        }
    }

    pub fn is_joint(&self) -> bool {
        matches!(self, Self::Joint(_, _))
    }

    pub fn carer_ids(&self) -> Vec<Uuid> {
        match self {
            Self::Single(id) => vec![*id],
            Self::Joint(a, b) => vec![*a, *b],
        }
    }

    /// The other participant of a joint visit, from one participant's side.
    pub fn companion_of(&self, carer_id: Uuid) -> Option<Uuid> {
        match self {
            Self::Joint(a, b) if *a == carer_id => Some(*b),
            Self::Joint(a, b) if *b == carer_id => Some(*a),
            _ => None,
        }
    }
}

/// Visit entity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    pub id: Uuid,
    pub agency_id: Uuid,
    pub client_id: Uuid,
    pub carer_id: Option<Uuid>,
    pub second_carer_id: Option<Uuid>,

    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,

    pub status: String,
    pub notes: Option<String>,

    pub actual_arrival: Option<DateTime<Utc>>,
    pub actual_departure: Option<DateTime<Utc>>,

    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Visit {
    pub fn assignment(&self) -> Option<CarerAssignment> {
        CarerAssignment::from_columns(self.carer_id, self.second_carer_id)
    }
}

/// Request to book a visit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookVisitRequest {
    pub agency_id: Uuid,
    pub client_id: Uuid,
    pub carer_id: Option<Uuid>,
    pub second_carer_id: Option<Uuid>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub notes: Option<String>,
}

/// Request to update a visit. A time change requires a reason, which is
/// recorded as an immutable adjustment entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVisitRequest {
    pub id: Uuid,
    pub agency_id: Uuid,
    pub carer_id: Option<Uuid>,
    pub second_carer_id: Option<Uuid>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub notes: Option<String>,
    pub adjustment_reason: Option<String>,
}

/// Request to list visits in a range
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListVisitsRequest {
    pub agency_id: Uuid,
    pub client_id: Option<Uuid>,
    pub carer_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Response for listing visits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListVisitsResponse {
    pub visits: Vec<Visit>,
    pub total: i64,
}

/// Request to check a carer in or out of a visit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitCheckRequest {
    pub id: Uuid,
    pub agency_id: Uuid,
    pub at: Option<DateTime<Utc>>,
}

/// Request to apply a time-slot swap between two visits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapVisitsRequest {
    pub agency_id: Uuid,
    pub first_visit_id: Uuid,
    pub second_visit_id: Uuid,
}

/// Response for a time-slot swap. An introduced overlap does not block the
/// apply; it is surfaced here for the operator to judge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapVisitsResponse {
    pub applied: bool,
    pub warnings: Vec<SwapWarning>,
}

/// A visit that would newly overlap after the swap
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapWarning {
    pub carer_id: Uuid,
    pub swapped_visit_id: Uuid,
    pub overlapping_visit_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assignment_normalization() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        assert_eq!(
            CarerAssignment::from_columns(Some(a), Some(b)),
            Some(CarerAssignment::Joint(a, b))
        );
        assert_eq!(
            CarerAssignment::from_columns(Some(a), None),
            Some(CarerAssignment::Single(a))
        );
        // Duplicate second carer collapses to a single assignment.
        assert_eq!(
            CarerAssignment::from_columns(Some(a), Some(a)),
            Some(CarerAssignment::Single(a))
        );
        // A secondary without a primary is still a single assignment.
        assert_eq!(
            CarerAssignment::from_columns(None, Some(b)),
            Some(CarerAssignment::Single(b))
        );
        assert_eq!(CarerAssignment::from_columns(None, None), None);
    }

    #[test]
    fn test_companion_resolution() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let joint = CarerAssignment::Joint(a, b);

        assert_eq!(joint.companion_of(a), Some(b));
        assert_eq!(joint.companion_of(b), Some(a));
        assert_eq!(joint.companion_of(Uuid::new_v4()), None);
        assert_eq!(CarerAssignment::Single(a).companion_of(a), None);
    }

    #[test]
    fn test_visit_status_roundtrip() {
        for status in [
            VisitStatus::Scheduled,
            VisitStatus::InProgress,
            VisitStatus::Completed,
            VisitStatus::Missed,
        ] {
            assert_eq!(VisitStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(VisitStatus::parse("cancelled"), None);
    }
}
