//! Route reorder optimizer
//!
//! For every carer-day sequence with at least two visits, evaluates each
//! single adjacent transposition and proposes the one that saves the most
//! travel time, provided it clears the savings threshold. The search is
//! O(n) candidates per sequence; full permutation search is deliberately
//! out of scope.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::services::grouping::WeekGrouping;
use crate::services::travel_cache::{TravelPlanner, TravelPoint};
use crate::types::{ReorderSuggestion, SuggestionState};

/// A swap must save strictly more than this many minutes to be proposed.
pub const MIN_SAVINGS_MINUTES: i64 = 8;

/// Scan the grouped week for beneficial adjacent swaps, at most one
/// suggestion per carer-day.
pub fn suggest_reorders(
    grouping: &WeekGrouping,
    planner: &mut TravelPlanner,
) -> Vec<ReorderSuggestion> {
    let mut suggestions = Vec::new();

    for ((carer_id, date), bucket) in &grouping.buckets {
        if bucket.len() < 2 {
            continue;
        }

        let points: Vec<TravelPoint> = bucket
            .iter()
            .map(|s| TravelPoint::of_visit(&s.visit))
            .collect();

        let order: Vec<usize> = (0..points.len()).collect();
        let current_total = total_travel(&order, &points, planner);

        // Left-to-right scan with strict `>`: the earliest index wins ties,
        // and nothing at or below the threshold survives.
        let mut best_savings = MIN_SAVINGS_MINUTES;
        let mut best_index: Option<usize> = None;

        for i in 0..points.len() - 1 {
            let mut candidate = order.clone();
            candidate.swap(i, i + 1);
            let candidate_total = total_travel(&candidate, &points, planner);
            let savings = current_total - candidate_total;
            if savings > best_savings {
                best_savings = savings;
                best_index = Some(i);
            }
        }

        if let Some(i) = best_index {
            suggestions.push(ReorderSuggestion {
                carer_id: *carer_id,
                date: *date,
                first_visit_id: bucket[i].visit.id,
                second_visit_id: bucket[i + 1].visit.id,
                minutes_saved: best_savings,
                state: SuggestionState::Proposed,
            });
        }
    }

    suggestions
}

/// Total travel minutes of a sequence visited in the given index order.
fn total_travel(order: &[usize], points: &[TravelPoint], planner: &mut TravelPlanner) -> i64 {
    order
        .windows(2)
        .map(|w| planner.resolve(&points[w[0]], &points[w[1]]))
        .sum()
}

/// Exchange the time slots of two visits. Clients and carer assignments
/// stay put; only the times move. The operation is its own inverse, which
/// is what makes undo exact.
pub fn swap_time_slots(
    first: &mut (DateTime<Utc>, DateTime<Utc>),
    second: &mut (DateTime<Utc>, DateTime<Utc>),
) {
    std::mem::swap(first, second);
}

/// Whether two half-open intervals intersect.
pub fn intervals_overlap(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// Of the candidate `(id, start, end)` intervals, the ids that intersect
/// the current slot but did not intersect the previous one. Overlaps that
/// predate the change are not reported.
pub fn introduced_overlaps(
    previous: (DateTime<Utc>, DateTime<Utc>),
    current: (DateTime<Utc>, DateTime<Utc>),
    candidates: &[(Uuid, DateTime<Utc>, DateTime<Utc>)],
) -> Vec<Uuid> {
    candidates
        .iter()
        .filter(|(_, start, end)| {
            intervals_overlap(*start, *end, current.0, current.1)
                && !intervals_overlap(*start, *end, previous.0, previous.1)
        })
        .map(|(id, _, _)| *id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::grouping::fixtures::{at, carer, visit};
    use crate::services::grouping::group_week;
    use crate::types::{Carer, RotaVisit, TravelCacheEntry};
    use uuid::Uuid;

    fn cached(origin: Uuid, dest: Uuid, minutes: i64) -> TravelCacheEntry {
        TravelCacheEntry {
            origin_client_id: origin,
            dest_client_id: dest,
            distance_km: 1.0,
            minutes,
        }
    }

    /// Three visits for one carer on one day at clients a, b, c.
    fn three_visit_day(x: &Carer, a: Uuid, b: Uuid, c: Uuid) -> Vec<RotaVisit> {
        vec![
            visit(a, Some(x.id), None, at(3, 9, 0), at(3, 9, 30)),
            visit(b, Some(x.id), None, at(3, 9, 35), at(3, 10, 5)),
            visit(c, Some(x.id), None, at(3, 10, 10), at(3, 10, 40)),
        ]
    }

    #[test]
    fn test_no_suggestion_when_order_is_already_best() {
        let x = carer("Priya", true);
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        // Current total A->B + B->C = 25. Swapping B,C yields
        // A->C + C->B = 25 + 5 = 30; swapping A,B yields B->A + A->C = 45.
        let visits = three_visit_day(&x, a, b, c);
        let grouping = group_week(&visits, &[x]);
        let mut planner = TravelPlanner::from_entries([
            cached(a, b, 20),
            cached(b, c, 5),
            cached(a, c, 25),
        ]);

        let suggestions = suggest_reorders(&grouping, &mut planner);
        assert!(suggestions.is_empty());
    }

    #[test]
    fn test_finds_the_documented_minimum() {
        let x = carer("Priya", true);
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        // Current total A->B + B->C = 35. Order A,C,B totals 4 + 5 = 9,
        // saving 26 minutes.
        let visits = three_visit_day(&x, a, b, c);
        let grouping = group_week(&visits, &[x.clone()]);
        let mut planner = TravelPlanner::from_entries([
            cached(a, b, 30),
            cached(b, c, 5),
            cached(a, c, 4),
        ]);

        let suggestions = suggest_reorders(&grouping, &mut planner);
        assert_eq!(suggestions.len(), 1);

        let suggestion = &suggestions[0];
        assert_eq!(suggestion.carer_id, x.id);
        assert_eq!(suggestion.first_visit_id, visits[1].id);
        assert_eq!(suggestion.second_visit_id, visits[2].id);
        assert_eq!(suggestion.minutes_saved, 26);
        assert_eq!(suggestion.state, SuggestionState::Proposed);
    }

    #[test]
    fn test_threshold_is_strict() {
        let x = carer("Priya", true);
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let visits = three_visit_day(&x, a, b, c);

        // Swapping A,B changes the total by t(B,C) - t(A,C).
        // Exactly 8 minutes saved: not proposed.
        let grouping = group_week(&visits, &[x.clone()]);
        let mut planner = TravelPlanner::from_entries([
            cached(a, b, 5),
            cached(b, c, 20),
            cached(a, c, 12),
        ]);
        assert!(suggest_reorders(&grouping, &mut planner).is_empty());

        // 9 minutes saved: proposed.
        let mut planner = TravelPlanner::from_entries([
            cached(a, b, 5),
            cached(b, c, 20),
            cached(a, c, 11),
        ]);
        let suggestions = suggest_reorders(&grouping, &mut planner);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].minutes_saved, 9);
        assert_eq!(suggestions[0].first_visit_id, visits[0].id);
        assert_eq!(suggestions[0].second_visit_id, visits[1].id);
    }

    #[test]
    fn test_equal_savings_keep_the_earliest_index() {
        let x = carer("Priya", true);
        let (a, b, c, d) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        let visits = vec![
            visit(a, Some(x.id), None, at(3, 8, 0), at(3, 8, 30)),
            visit(b, Some(x.id), None, at(3, 9, 0), at(3, 9, 30)),
            visit(c, Some(x.id), None, at(3, 10, 0), at(3, 10, 30)),
            visit(d, Some(x.id), None, at(3, 11, 0), at(3, 11, 30)),
        ];

        // Swapping (A,B) and swapping (C,D) both save 20 minutes.
        let grouping = group_week(&visits, &[x]);
        let mut planner = TravelPlanner::from_entries([
            cached(a, b, 12),
            cached(b, c, 30),
            cached(c, d, 12),
            cached(a, c, 10),
            cached(b, d, 10),
            cached(a, d, 50),
        ]);

        let suggestions = suggest_reorders(&grouping, &mut planner);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].minutes_saved, 20);
        assert_eq!(suggestions[0].first_visit_id, visits[0].id);
        assert_eq!(suggestions[0].second_visit_id, visits[1].id);
    }

    #[test]
    fn test_single_visit_day_yields_nothing() {
        let x = carer("Priya", true);
        let a = Uuid::new_v4();
        let visits = vec![visit(a, Some(x.id), None, at(3, 9, 0), at(3, 10, 0))];

        let grouping = group_week(&visits, &[x]);
        let mut planner = TravelPlanner::new();
        assert!(suggest_reorders(&grouping, &mut planner).is_empty());
    }

    #[test]
    fn test_each_carer_day_judged_independently() {
        let x = carer("Priya", true);
        let y = carer("Marek", true);
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        let mut visits = three_visit_day(&x, a, b, c);
        // Marek has an identical day; both should get the same suggestion.
        visits.extend(three_visit_day(&y, a, b, c));

        let grouping = group_week(&visits, &[x.clone(), y.clone()]);
        let mut planner = TravelPlanner::from_entries([
            cached(a, b, 30),
            cached(b, c, 5),
            cached(a, c, 4),
        ]);

        let suggestions = suggest_reorders(&grouping, &mut planner);
        assert_eq!(suggestions.len(), 2);
        let carers: Vec<Uuid> = suggestions.iter().map(|s| s.carer_id).collect();
        assert!(carers.contains(&x.id));
        assert!(carers.contains(&y.id));
    }

    #[test]
    fn test_swap_is_its_own_inverse() {
        let mut first = (at(3, 9, 0), at(3, 9, 30));
        let mut second = (at(3, 10, 10), at(3, 10, 40));
        let original = (first, second);

        swap_time_slots(&mut first, &mut second);
        assert_eq!(first, original.1);
        assert_eq!(second, original.0);

        swap_time_slots(&mut first, &mut second);
        assert_eq!((first, second), original);
    }

    #[test]
    fn test_introduced_overlaps_skip_preexisting() {
        let previous = (at(3, 9, 0), at(3, 10, 0));
        let current = (at(3, 10, 30), at(3, 11, 30));

        let newly_hit = Uuid::new_v4();
        let always_hit = Uuid::new_v4();
        let never_hit = Uuid::new_v4();
        let candidates = vec![
            // Clear of the old slot, inside the new one.
            (newly_hit, at(3, 11, 0), at(3, 12, 0)),
            // Straddles both slots; the operator already knew about it.
            (always_hit, at(3, 9, 30), at(3, 10, 45)),
            // Clear of both.
            (never_hit, at(3, 8, 0), at(3, 8, 30)),
        ];

        assert_eq!(introduced_overlaps(previous, current, &candidates), vec![newly_hit]);
    }

    #[test]
    fn test_swapping_back_introduces_nothing() {
        let mut first = (at(3, 9, 0), at(3, 9, 30));
        let mut second = (at(3, 10, 10), at(3, 10, 40));
        let original_first = first;

        // A visit sitting right on top of the first slot.
        let candidates = vec![(Uuid::new_v4(), at(3, 9, 0), at(3, 9, 30))];

        swap_time_slots(&mut first, &mut second);
        swap_time_slots(&mut first, &mut second);

        // Two swaps land every visit back in its original slot, so
        // nothing counts as introduced.
        assert_eq!(first, original_first);
        assert!(introduced_overlaps(original_first, first, &candidates).is_empty());
    }

    #[test]
    fn test_intervals_overlap_rule() {
        assert!(intervals_overlap(at(3, 9, 0), at(3, 10, 0), at(3, 9, 30), at(3, 10, 30)));
        // Touching endpoints do not overlap.
        assert!(!intervals_overlap(at(3, 9, 0), at(3, 10, 0), at(3, 10, 0), at(3, 11, 0)));
        assert!(!intervals_overlap(at(3, 9, 0), at(3, 10, 0), at(3, 11, 0), at(3, 12, 0)));
        // Containment overlaps.
        assert!(intervals_overlap(at(3, 9, 0), at(3, 12, 0), at(3, 10, 0), at(3, 11, 0)));
    }
}
