//! Travel cache: memoized client-to-client travel estimates
//!
//! The cache is a pure performance aid. Every request builds a
//! [`TravelPlanner`] over the pairs it is about to need: one batched read
//! primes it, misses are computed from coordinates (queued as best-effort
//! write intents) or from the postcode heuristic (never persisted), and the
//! handler flushes the queued writes in a detached task after replying.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::db::queries;
use crate::services::geo;
use crate::types::{Coordinates, TravelCacheEntry};

/// Direction-insensitive key for a client pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey(Uuid, Uuid);

impl PairKey {
    pub fn new(a: Uuid, b: Uuid) -> Self {
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.0, self.1)
    }
}

/// What the planner needs to know about one end of a transition.
#[derive(Debug, Clone)]
pub struct TravelPoint {
    pub client_id: Uuid,
    pub coordinates: Option<Coordinates>,
    pub postcode: Option<String>,
}

impl TravelPoint {
    pub fn of_visit(visit: &crate::types::RotaVisit) -> Self {
        Self {
            client_id: visit.client_id,
            coordinates: visit.coordinates(),
            postcode: visit.client_postcode.clone(),
        }
    }
}

/// Storage backend for the travel cache. Postgres in production, in-memory
/// in engine tests.
#[async_trait]
pub trait TravelStore: Send + Sync {
    /// Fetch whatever the store has for the given pairs, one round-trip.
    /// Entries may come back in either direction.
    async fn get_many(&self, pairs: &[PairKey]) -> Result<Vec<TravelCacheEntry>>;

    /// Persist a computed estimate. Idempotent: re-writing a pair with the
    /// same inputs yields the same value, so races are harmless.
    async fn put(&self, entry: &TravelCacheEntry) -> Result<()>;

    /// Delete every entry where the client appears on either side.
    async fn delete_for_client(&self, client_id: Uuid) -> Result<i64>;
}

/// Postgres-backed travel store
pub struct PgTravelStore {
    pool: PgPool,
}

impl PgTravelStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TravelStore for PgTravelStore {
    async fn get_many(&self, pairs: &[PairKey]) -> Result<Vec<TravelCacheEntry>> {
        let ids: Vec<Uuid> = pairs
            .iter()
            .flat_map(|p| [p.0, p.1])
            .collect();
        let candidates = queries::travel::get_entries_among(&self.pool, &ids).await?;

        // The SQL fetches all entries among the involved clients; keep only
        // the requested pairs (either direction).
        let wanted: std::collections::HashSet<PairKey> = pairs.iter().copied().collect();
        Ok(candidates
            .into_iter()
            .filter(|e| wanted.contains(&PairKey::new(e.origin_client_id, e.dest_client_id)))
            .collect())
    }

    async fn put(&self, entry: &TravelCacheEntry) -> Result<()> {
        queries::travel::upsert_entry(&self.pool, entry).await
    }

    async fn delete_for_client(&self, client_id: Uuid) -> Result<i64> {
        queries::travel::delete_for_client(&self.pool, client_id).await
    }
}

/// Per-request travel resolver with tiered fallback:
/// cached value → coordinate estimate → postcode heuristic.
#[derive(Debug, Default)]
pub struct TravelPlanner {
    minutes: HashMap<PairKey, i64>,
    pending: Vec<TravelCacheEntry>,
}

impl TravelPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a planner pre-loaded with known entries (primed from the store,
    /// or constructed directly in tests).
    pub fn from_entries(entries: impl IntoIterator<Item = TravelCacheEntry>) -> Self {
        let mut planner = Self::new();
        for entry in entries {
            planner.minutes.insert(
                PairKey::new(entry.origin_client_id, entry.dest_client_id),
                entry.minutes,
            );
        }
        planner
    }

    /// One batched store read for all pairs the request will need.
    pub async fn primed(store: &dyn TravelStore, pairs: &[PairKey]) -> Result<Self> {
        if pairs.is_empty() {
            return Ok(Self::new());
        }
        let entries = store.get_many(pairs).await?;
        Ok(Self::from_entries(entries))
    }

    /// Resolve travel minutes between two clients. Never fails; a client
    /// with no coordinates and no postcode lands on the fixed default.
    pub fn resolve(&mut self, from: &TravelPoint, to: &TravelPoint) -> i64 {
        if from.client_id == to.client_id {
            return 0;
        }

        let key = PairKey::new(from.client_id, to.client_id);
        if let Some(&minutes) = self.minutes.get(&key) {
            return minutes;
        }

        if let Some(estimate) = geo::estimate_travel(from.coordinates, to.coordinates) {
            self.minutes.insert(key, estimate.minutes);
            self.pending.push(TravelCacheEntry {
                origin_client_id: from.client_id,
                dest_client_id: to.client_id,
                distance_km: estimate.distance_km,
                minutes: estimate.minutes,
            });
            return estimate.minutes;
        }

        // Heuristic estimates are memoized for this request so the detector
        // and optimizer agree, but never persisted.
        let minutes = geo::estimate_from_postcodes(
            from.postcode.as_deref().unwrap_or(""),
            to.postcode.as_deref().unwrap_or(""),
        );
        self.minutes.insert(key, minutes);
        minutes
    }

    /// Everything resolved so far, keyed by the stringified pair key.
    pub fn minutes_map(&self) -> HashMap<String, i64> {
        self.minutes
            .iter()
            .map(|(key, &minutes)| (key.to_string(), minutes))
            .collect()
    }

    /// Drain the queued coordinate-based estimates for persistence.
    pub fn take_pending(&mut self) -> Vec<TravelCacheEntry> {
        std::mem::take(&mut self.pending)
    }
}

/// Best-effort write-back of queued estimates. Failures are logged and
/// swallowed; the values are recomputable.
pub async fn flush_pending(store: Arc<dyn TravelStore>, pending: Vec<TravelCacheEntry>) {
    for entry in pending {
        if let Err(e) = store.put(&entry).await {
            warn!(
                "Travel cache write failed for {} -> {}: {}",
                entry.origin_client_id, entry.dest_client_id, e
            );
        }
    }
}
