//! Rota view types
//!
//! Everything here is derived per request from a week snapshot and never
//! persisted: carer-day sequences, conflict flags, week summaries, and
//! reorder suggestions.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::client::Coordinates;
use super::visit::CarerAssignment;

/// A visit row joined with the client fields the rota engine needs.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RotaVisit {
    pub id: Uuid,
    pub client_id: Uuid,
    pub client_name: String,
    pub client_postcode: Option<String>,
    pub client_lat: Option<f64>,
    pub client_lng: Option<f64>,
    pub client_requires_double_up: bool,
    pub carer_id: Option<Uuid>,
    pub second_carer_id: Option<Uuid>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: String,
    pub notes: Option<String>,
}

impl RotaVisit {
    pub fn assignment(&self) -> Option<CarerAssignment> {
        CarerAssignment::from_columns(self.carer_id, self.second_carer_id)
    }

    pub fn is_joint(&self) -> bool {
        self.assignment().map(|a| a.is_joint()).unwrap_or(false)
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.client_lat, self.client_lng) {
            (Some(lat), Some(lng)) => Some(Coordinates { lat, lng }),
            _ => None,
        }
    }

    /// Scheduled duration in whole minutes.
    pub fn duration_minutes(&self) -> i64 {
        (self.end_at - self.start_at).num_minutes()
    }

    /// Calendar day used for carer-day bucketing (UTC date of the start).
    pub fn day(&self) -> NaiveDate {
        self.start_at.date_naive()
    }
}

/// A gap too small for the estimated travel between two consecutive visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelTight {
    /// Minutes between the previous visit's end and this visit's start.
    pub gap_minutes: i64,
    /// Estimated travel minutes needed for that transition.
    pub need_minutes: i64,
}

/// A visit as it appears inside one carer's day sequence. A joint visit
/// produces one of these per participating carer, each carrying the other
/// participant's name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledVisit {
    pub visit: RotaVisit,
    pub companion_name: Option<String>,
    pub overlap: bool,
    pub travel_tight: Option<TravelTight>,
    pub missing_second_carer: bool,
}

impl ScheduledVisit {
    pub fn new(visit: RotaVisit, companion_name: Option<String>) -> Self {
        Self {
            visit,
            companion_name,
            overlap: false,
            travel_tight: None,
            missing_second_carer: false,
        }
    }

    /// Composite display status; first matching condition wins.
    pub fn health(&self) -> VisitHealth {
        if self.missing_second_carer {
            VisitHealth::MissingSecondCarer
        } else if self.overlap {
            VisitHealth::Overlap
        } else if self.travel_tight.is_some() {
            VisitHealth::TravelTight
        } else if self.visit.status == "completed" {
            VisitHealth::Completed
        } else {
            VisitHealth::Clear
        }
    }
}

/// Severity ladder for a visit's display status, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitHealth {
    MissingSecondCarer,
    Overlap,
    TravelTight,
    Completed,
    Clear,
}

/// One carer's ordered visits for one day, as returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarerDayRota {
    pub carer_id: Uuid,
    pub date: NaiveDate,
    pub visits: Vec<AnnotatedVisit>,
}

/// A scheduled visit plus its resolved display status.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedVisit {
    #[serde(flatten)]
    pub scheduled: ScheduledVisit,
    pub health: VisitHealth,
}

/// Per-carer aggregates over the whole requested week.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarerWeekSummary {
    pub carer_id: Uuid,
    pub visit_count: i64,
    /// Scheduled care minutes. A joint visit counts once per participating
    /// carer: both people are occupied for its full duration.
    pub scheduled_minutes: i64,
    pub first_start: Option<DateTime<Utc>>,
    pub last_end: Option<DateTime<Utc>>,
    pub travel_tight_count: i64,
    pub missing_second_carer_count: i64,
}

impl CarerWeekSummary {
    pub fn empty(carer_id: Uuid) -> Self {
        Self {
            carer_id,
            visit_count: 0,
            scheduled_minutes: 0,
            first_start: None,
            last_end: None,
            travel_tight_count: 0,
            missing_second_carer_count: 0,
        }
    }
}

/// Lifecycle of a reorder suggestion. Suggestions are ephemeral; applying
/// one is not idempotent, so the caller refreshes the set afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionState {
    Proposed,
    Reviewed,
    Applied,
    Dismissed,
}

/// A proposed adjacent time-slot swap that reduces a carer-day's total
/// travel time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderSuggestion {
    pub carer_id: Uuid,
    pub date: NaiveDate,
    pub first_visit_id: Uuid,
    pub second_visit_id: Uuid,
    pub minutes_saved: i64,
    pub state: SuggestionState,
}

/// Request for a week's rota
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekRotaRequest {
    pub agency_id: Uuid,
    pub week_start: DateTime<Utc>,
    pub week_end: DateTime<Utc>,
}

/// Full rota view for a week
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekRotaResponse {
    pub carers: Vec<super::carer::Carer>,
    pub days: Vec<CarerDayRota>,
    pub unassigned: Vec<RotaVisit>,
    pub summaries: Vec<CarerWeekSummary>,
    pub suggestions: Vec<ReorderSuggestion>,
    /// Travel minutes for exactly the client pairs this rota needed, keyed
    /// by the direction-insensitive pair key.
    pub travel_minutes: std::collections::HashMap<String, i64>,
}
