//! Week rota handler

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use sqlx::PgPool;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::db::queries;
use crate::services::rota::build_week_rota;
use crate::services::travel_cache::{flush_pending, PgTravelStore, TravelStore};
use crate::types::{ErrorResponse, Request, SuccessResponse, WeekRotaRequest};

/// Handle rota.week messages. The reply is sent before the travel cache
/// write-back, which runs in a detached task.
pub async fn handle_week(client: Client, mut subscriber: Subscriber, pool: PgPool) -> Result<()> {
    let store: Arc<dyn TravelStore> = Arc::new(PgTravelStore::new(pool.clone()));

    while let Some(msg) = subscriber.next().await {
        debug!("Received rota.week message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<WeekRotaRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
                continue;
            }
        };

        let payload = request.payload;

        if payload.week_end <= payload.week_start {
            let error = ErrorResponse::new(
                request.id,
                "INVALID_REQUEST",
                "Week end must be after week start",
            );
            let _ = client
                .publish(reply, serde_json::to_vec(&error)?.into())
                .await;
            continue;
        }

        let visits = match queries::visit::week_rota_visits(
            &pool,
            payload.agency_id,
            payload.week_start,
            payload.week_end,
        )
        .await
        {
            Ok(visits) => visits,
            Err(e) => {
                error!("Failed to load week visits: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
                continue;
            }
        };

        // Inactive carers are included so joint-visit companion names still
        // resolve; the engine filters the reply down to active carers.
        let carers = match queries::carer::list_carers(&pool, payload.agency_id, true).await {
            Ok(carers) => carers,
            Err(e) => {
                error!("Failed to load carers: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
                continue;
            }
        };

        match build_week_rota(visits, carers, store.as_ref()).await {
            Ok(built) => {
                debug!(
                    "Built rota: {} carer-days, {} unassigned, {} suggestions",
                    built.response.days.len(),
                    built.response.unassigned.len(),
                    built.response.suggestions.len()
                );
                let response = SuccessResponse::new(request.id, built.response);
                let _ = client
                    .publish(reply, serde_json::to_vec(&response)?.into())
                    .await;

                if !built.pending_cache_writes.is_empty() {
                    let store = Arc::clone(&store);
                    tokio::spawn(flush_pending(store, built.pending_cache_writes));
                }
            }
            Err(e) => {
                error!("Failed to build week rota: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
            }
        }
    }

    Ok(())
}
