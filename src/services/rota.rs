//! Week rota assembly
//!
//! Ties the engine together for one request: group the snapshot into
//! carer-day sequences, prime one travel planner for every adjacent pair
//! the week needs, annotate conflicts, search for reorder suggestions, and
//! shape the response. The caller flushes the planner's pending cache
//! writes after replying.

use std::collections::BTreeSet;

use anyhow::Result;

use crate::services::conflict::annotate_conflicts;
use crate::services::grouping::{group_week, WeekGrouping};
use crate::services::optimizer::suggest_reorders;
use crate::services::travel_cache::{PairKey, TravelPlanner, TravelStore};
use crate::types::{
    AnnotatedVisit, Carer, CarerDayRota, RotaVisit, TravelCacheEntry, WeekRotaResponse,
};

/// The rota view plus the cache write intents collected while building it.
pub struct BuiltRota {
    pub response: WeekRotaResponse,
    pub pending_cache_writes: Vec<TravelCacheEntry>,
}

/// Build the full rota view for a week snapshot.
pub async fn build_week_rota(
    visits: Vec<RotaVisit>,
    carers: Vec<Carer>,
    store: &dyn TravelStore,
) -> Result<BuiltRota> {
    let mut grouping = group_week(&visits, &carers);

    let pairs = route_pairs(&grouping);
    let mut planner = TravelPlanner::primed(store, &pairs).await?;

    annotate_conflicts(&mut grouping, &mut planner);
    let suggestions = suggest_reorders(&grouping, &mut planner);

    let travel_minutes = planner.minutes_map();
    let pending_cache_writes = planner.take_pending();

    let WeekGrouping {
        buckets,
        unassigned,
        summaries,
    } = grouping;

    let days = buckets
        .into_iter()
        .map(|((carer_id, date), bucket)| CarerDayRota {
            carer_id,
            date,
            visits: bucket
                .into_iter()
                .map(|scheduled| {
                    let health = scheduled.health();
                    AnnotatedVisit { scheduled, health }
                })
                .collect(),
        })
        .collect();

    let mut summaries: Vec<_> = summaries.into_values().collect();
    summaries.sort_by_key(|s| s.carer_id);

    // The full carer list fed the grouping above so a former colleague's
    // name still resolves on joint visits; the reply lists active only.
    let carers: Vec<Carer> = carers.into_iter().filter(|c| c.active).collect();

    Ok(BuiltRota {
        response: WeekRotaResponse {
            carers,
            days,
            unassigned,
            summaries,
            suggestions,
            travel_minutes,
        },
        pending_cache_writes,
    })
}

/// Every client pair this rota can ask the planner about: consecutive
/// transitions, plus the skip pairs an adjacent swap would create. This is
/// exactly the set one batched cache read has to cover; same-client
/// transitions cost nothing and are skipped.
fn route_pairs(grouping: &WeekGrouping) -> Vec<PairKey> {
    let mut pairs = BTreeSet::new();
    let mut add = |from: &RotaVisit, to: &RotaVisit| {
        if from.client_id != to.client_id {
            pairs.insert(PairKey::new(from.client_id, to.client_id));
        }
    };
    for bucket in grouping.buckets.values() {
        for pair in bucket.windows(2) {
            add(&pair[0].visit, &pair[1].visit);
        }
        for triple in bucket.windows(3) {
            add(&triple[0].visit, &triple[2].visit);
        }
    }
    pairs.into_iter().collect()
}
