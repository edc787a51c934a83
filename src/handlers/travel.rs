//! Travel cache message handlers

use anyhow::Result;
use async_nats::{Client, Subscriber};
use chrono::Utc;
use futures::StreamExt;
use sqlx::PgPool;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::db::queries;
use crate::types::{
    ErrorResponse, InvalidateTravelRequest, InvalidateTravelResponse, Request, SuccessResponse,
};

/// Handle travel.invalidate messages. Dropping entries is always safe; the
/// next rota request recomputes and re-caches whatever it needs.
pub async fn handle_invalidate(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received travel.invalidate message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<InvalidateTravelRequest> = match serde_json::from_slice(&msg.payload)
        {
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

        let client_id = request.payload.client_id;

        match queries::travel::delete_for_client(&pool, client_id).await {
            Ok(entries_removed) => {
                info!(
                    "Invalidated {} travel cache entries for client {}",
                    entries_removed, client_id
                );
                let response = SuccessResponse::new(
                    request.id,
                    InvalidateTravelResponse {
                        entries_removed,
                        invalidated_at: Utc::now(),
                    },
                );
                let _ = client
                    .publish(reply, serde_json::to_vec(&response)?.into())
                    .await;
            }
            Err(e) => {
                error!("Failed to invalidate travel cache: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
            }
        }
    }

    Ok(())
}
