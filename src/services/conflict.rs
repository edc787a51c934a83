//! Conflict and tightness detection over grouped carer-day sequences
//!
//! Walks each sequence's consecutive pairs: a time overlap implicates both
//! visits; a non-negative gap smaller than the estimated travel time marks
//! the later visit as travel-tight. Missing-second-carer is a per-visit
//! check independent of sequence position.

use crate::services::grouping::WeekGrouping;
use crate::services::travel_cache::{TravelPlanner, TravelPoint};
use crate::types::TravelTight;

/// Annotate every bucket in place and feed the issue counters into the
/// carer week summaries.
pub fn annotate_conflicts(grouping: &mut WeekGrouping, planner: &mut TravelPlanner) {
    let WeekGrouping {
        buckets, summaries, ..
    } = grouping;

    for ((carer_id, _day), bucket) in buckets.iter_mut() {
        for scheduled in bucket.iter_mut() {
            if scheduled.visit.client_requires_double_up && !scheduled.visit.is_joint() {
                scheduled.missing_second_carer = true;
            }
        }

        for i in 1..bucket.len() {
            let (before, after) = bucket.split_at_mut(i);
            let prev = &mut before[i - 1];
            let curr = &mut after[0];

            if curr.visit.start_at < prev.visit.end_at {
                // An overlap always implicates both members of the pair.
                prev.overlap = true;
                curr.overlap = true;
                continue;
            }

            let gap = (curr.visit.start_at - prev.visit.end_at).num_minutes();
            let need = planner.resolve(
                &TravelPoint::of_visit(&prev.visit),
                &TravelPoint::of_visit(&curr.visit),
            );
            if gap < need {
                curr.travel_tight = Some(TravelTight {
                    gap_minutes: gap,
                    need_minutes: need,
                });
            }
        }

        if let Some(summary) = summaries.get_mut(carer_id) {
            summary.travel_tight_count += bucket
                .iter()
                .filter(|s| s.travel_tight.is_some())
                .count() as i64;
            summary.missing_second_carer_count += bucket
                .iter()
                .filter(|s| s.missing_second_carer)
                .count() as i64;
        }
    }
}
