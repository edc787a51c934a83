//! Schedule grouping: week snapshot -> per-carer, per-day sequences
//!
//! Pure computation over an immutable snapshot. A joint visit is inserted
//! into BOTH participating carers' buckets, each copy annotated with the
//! other participant's name. Visits with no resolvable active carer land in
//! the unassigned bucket and are excluded from all per-carer analysis.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;
use uuid::Uuid;

use crate::types::{Carer, CarerWeekSummary, RotaVisit, ScheduledVisit};

/// Key of one carer's day within the week.
pub type CarerDayKey = (Uuid, NaiveDate);

/// Grouped week: ordered carer-day buckets plus week-level aggregates.
#[derive(Debug, Default)]
pub struct WeekGrouping {
    pub buckets: BTreeMap<CarerDayKey, Vec<ScheduledVisit>>,
    pub unassigned: Vec<RotaVisit>,
    pub summaries: HashMap<Uuid, CarerWeekSummary>,
}

/// Partition a week's visits into per-carer-day sequences.
///
/// Sequences are sorted ascending by start time; equal starts keep snapshot
/// order (stable sort). The issue counters on the summaries are zero here
/// and filled in by the conflict detector.
pub fn group_week(visits: &[RotaVisit], carers: &[Carer]) -> WeekGrouping {
    let names: HashMap<Uuid, String> = carers
        .iter()
        .map(|c| (c.id, c.name.clone()))
        .collect();
    let active: HashSet<Uuid> = carers.iter().filter(|c| c.active).map(|c| c.id).collect();

    let mut grouping = WeekGrouping::default();
    for carer in carers.iter().filter(|c| c.active) {
        grouping
            .summaries
            .insert(carer.id, CarerWeekSummary::empty(carer.id));
    }

    for visit in visits {
        let assignment = match visit.assignment() {
            Some(a) => a,
            None => {
                grouping.unassigned.push(visit.clone());
                continue;
            }
        };

        let participants: Vec<Uuid> = assignment
            .carer_ids()
            .into_iter()
            .filter(|id| active.contains(id))
            .collect();

        if participants.is_empty() {
            grouping.unassigned.push(visit.clone());
            continue;
        }

        for carer_id in participants {
            let companion_name = assignment
                .companion_of(carer_id)
                .and_then(|id| names.get(&id).cloned());

            grouping
                .buckets
                .entry((carer_id, visit.day()))
                .or_default()
                .push(ScheduledVisit::new(visit.clone(), companion_name));

            let summary = grouping
                .summaries
                .entry(carer_id)
                .or_insert_with(|| CarerWeekSummary::empty(carer_id));
            summary.visit_count += 1;
            // A joint visit's duration counts once per participating carer:
            // both people are occupied for the whole slot.
            summary.scheduled_minutes += visit.duration_minutes();
            summary.first_start = match summary.first_start {
                Some(current) => Some(current.min(visit.start_at)),
                None => Some(visit.start_at),
            };
            summary.last_end = match summary.last_end {
                Some(current) => Some(current.max(visit.end_at)),
                None => Some(visit.end_at),
            };
        }
    }

    for bucket in grouping.buckets.values_mut() {
        bucket.sort_by_key(|s| s.visit.start_at);
    }

    grouping
}

#[cfg(test)]
pub mod fixtures {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    pub fn carer(name: &str, active: bool) -> Carer {
        Carer {
            id: Uuid::new_v4(),
            agency_id: Uuid::nil(),
            name: name.to_string(),
            active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    pub fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, day, hour, minute, 0).unwrap()
    }

    pub fn visit(
        client_id: Uuid,
        carer_id: Option<Uuid>,
        second_carer_id: Option<Uuid>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RotaVisit {
        RotaVisit {
            id: Uuid::new_v4(),
            client_id,
            client_name: "Client".to_string(),
            client_postcode: None,
            client_lat: None,
            client_lng: None,
            client_requires_double_up: false,
            carer_id,
            second_carer_id,
            start_at: start,
            end_at: end,
            status: "scheduled".to_string(),
            notes: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{at, carer, visit};
    use super::*;

    #[test]
    fn test_visits_bucketed_by_carer_and_day() {
        let x = carer("Priya", true);
        let client = Uuid::new_v4();

        let monday = visit(client, Some(x.id), None, at(3, 9, 0), at(3, 10, 0));
        let tuesday = visit(client, Some(x.id), None, at(4, 9, 0), at(4, 10, 0));

        let grouping = group_week(&[monday.clone(), tuesday.clone()], &[x.clone()]);

        assert_eq!(grouping.buckets.len(), 2);
        assert_eq!(grouping.buckets[&(x.id, monday.day())].len(), 1);
        assert_eq!(grouping.buckets[&(x.id, tuesday.day())].len(), 1);
        assert!(grouping.unassigned.is_empty());
    }

    #[test]
    fn test_bucket_sorted_by_start_time() {
        let x = carer("Priya", true);
        let client = Uuid::new_v4();

        let late = visit(client, Some(x.id), None, at(3, 14, 0), at(3, 15, 0));
        let early = visit(client, Some(x.id), None, at(3, 8, 0), at(3, 9, 0));
        let middle = visit(client, Some(x.id), None, at(3, 11, 0), at(3, 12, 0));

        let grouping = group_week(&[late.clone(), early.clone(), middle.clone()], &[x.clone()]);
        let bucket = &grouping.buckets[&(x.id, early.day())];

        let ids: Vec<Uuid> = bucket.iter().map(|s| s.visit.id).collect();
        assert_eq!(ids, vec![early.id, middle.id, late.id]);
    }

    #[test]
    fn test_equal_starts_keep_snapshot_order() {
        let x = carer("Priya", true);
        let client = Uuid::new_v4();

        let first = visit(client, Some(x.id), None, at(3, 9, 0), at(3, 10, 0));
        let second = visit(client, Some(x.id), None, at(3, 9, 0), at(3, 9, 30));

        let grouping = group_week(&[first.clone(), second.clone()], &[x.clone()]);
        let bucket = &grouping.buckets[&(x.id, first.day())];

        assert_eq!(bucket[0].visit.id, first.id);
        assert_eq!(bucket[1].visit.id, second.id);
    }

    #[test]
    fn test_joint_visit_appears_in_both_buckets_with_crossed_companions() {
        let x = carer("Priya", true);
        let y = carer("Marek", true);
        let client = Uuid::new_v4();

        let joint = visit(client, Some(x.id), Some(y.id), at(3, 9, 0), at(3, 10, 0));
        let grouping = group_week(&[joint.clone()], &[x.clone(), y.clone()]);

        let in_x = &grouping.buckets[&(x.id, joint.day())];
        let in_y = &grouping.buckets[&(y.id, joint.day())];
        assert_eq!(in_x.len(), 1);
        assert_eq!(in_y.len(), 1);
        assert_eq!(in_x[0].companion_name.as_deref(), Some("Marek"));
        assert_eq!(in_y[0].companion_name.as_deref(), Some("Priya"));
    }

    #[test]
    fn test_joint_minutes_counted_for_each_carer() {
        let x = carer("Priya", true);
        let y = carer("Marek", true);
        let client = Uuid::new_v4();

        // 90-minute joint visit.
        let joint = visit(client, Some(x.id), Some(y.id), at(3, 9, 0), at(3, 10, 30));
        let grouping = group_week(&[joint], &[x.clone(), y.clone()]);

        assert_eq!(grouping.summaries[&x.id].scheduled_minutes, 90);
        assert_eq!(grouping.summaries[&y.id].scheduled_minutes, 90);
        assert_eq!(grouping.summaries[&x.id].visit_count, 1);
        assert_eq!(grouping.summaries[&y.id].visit_count, 1);
    }

    #[test]
    fn test_unassigned_visit_goes_to_unassigned_bucket() {
        let x = carer("Priya", true);
        let client = Uuid::new_v4();

        let orphan = visit(client, None, None, at(3, 9, 0), at(3, 10, 0));
        let grouping = group_week(&[orphan.clone()], &[x]);

        assert!(grouping.buckets.is_empty());
        assert_eq!(grouping.unassigned.len(), 1);
        assert_eq!(grouping.unassigned[0].id, orphan.id);
    }

    #[test]
    fn test_inactive_carer_excluded_from_scheduling() {
        let retired = carer("Retired", false);
        let client = Uuid::new_v4();

        let v = visit(client, Some(retired.id), None, at(3, 9, 0), at(3, 10, 0));
        let grouping = group_week(&[v], &[retired.clone()]);

        // The only assigned carer is inactive, so the visit is unassigned
        // and the inactive carer gets no summary.
        assert!(grouping.buckets.is_empty());
        assert_eq!(grouping.unassigned.len(), 1);
        assert!(!grouping.summaries.contains_key(&retired.id));
    }

    #[test]
    fn test_joint_visit_with_one_inactive_carer_kept_for_the_active_one() {
        let x = carer("Priya", true);
        let retired = carer("Retired", false);
        let client = Uuid::new_v4();

        let joint = visit(client, Some(x.id), Some(retired.id), at(3, 9, 0), at(3, 10, 0));
        let grouping = group_week(&[joint.clone()], &[x.clone(), retired]);

        assert_eq!(grouping.buckets.len(), 1);
        let bucket = &grouping.buckets[&(x.id, joint.day())];
        // Companion name still resolves for display even though the
        // companion is inactive.
        assert_eq!(bucket[0].companion_name.as_deref(), Some("Retired"));
    }

    #[test]
    fn test_unknown_carer_reference_goes_unassigned() {
        let x = carer("Priya", true);
        let client = Uuid::new_v4();

        let v = visit(client, Some(Uuid::new_v4()), None, at(3, 9, 0), at(3, 10, 0));
        let grouping = group_week(&[v], &[x]);

        assert!(grouping.buckets.is_empty());
        assert_eq!(grouping.unassigned.len(), 1);
    }

    #[test]
    fn test_week_summary_first_and_last_times() {
        let x = carer("Priya", true);
        let client = Uuid::new_v4();

        let visits = vec![
            visit(client, Some(x.id), None, at(4, 12, 0), at(4, 13, 0)),
            visit(client, Some(x.id), None, at(3, 7, 30), at(3, 8, 15)),
            visit(client, Some(x.id), None, at(5, 16, 0), at(5, 17, 30)),
        ];
        let grouping = group_week(&visits, &[x.clone()]);
        let summary = &grouping.summaries[&x.id];

        assert_eq!(summary.visit_count, 3);
        assert_eq!(summary.scheduled_minutes, 60 + 45 + 90);
        assert_eq!(summary.first_start, Some(at(3, 7, 30)));
        assert_eq!(summary.last_end, Some(at(5, 17, 30)));
    }

    #[test]
    fn test_carer_with_no_visits_gets_empty_summary() {
        let x = carer("Priya", true);
        let grouping = group_week(&[], &[x.clone()]);

        let summary = &grouping.summaries[&x.id];
        assert_eq!(summary.visit_count, 0);
        assert!(summary.first_start.is_none());
        assert!(summary.last_end.is_none());
    }
}
