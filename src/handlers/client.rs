//! Client message handlers

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use sqlx::PgPool;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::db::queries;
use crate::types::{
    ArchiveClientRequest, ArchiveClientResponse, CreateClientRequest, ErrorResponse,
    ListClientsRequest, ListClientsResponse, Request, SuccessResponse, UpdateClientRequest,
};

/// Handle client.create messages
pub async fn handle_create(client: Client, mut subscriber: Subscriber, pool: PgPool) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received client.create message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<CreateClientRequest> = match serde_json::from_slice(&msg.payload) {
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
        if payload.lat.is_some() != payload.lng.is_some() {
            let error = ErrorResponse::new(
                request.id,
                "INVALID_REQUEST",
                "Coordinates require both lat and lng",
            );
            let _ = client
                .publish(reply, serde_json::to_vec(&error)?.into())
                .await;
            continue;
        }

        info!("Creating client '{}'", payload.name);

        match queries::client::create_client(&pool, &payload).await {
            Ok(created) => {
                let client_id = created.id;
                let response = SuccessResponse::new(request.id, created);
                let _ = client
                    .publish(reply, serde_json::to_vec(&response)?.into())
                    .await;
                debug!("Created client {}", client_id);
            }
            Err(e) => {
                error!("Failed to create client: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
            }
        }
    }

    Ok(())
}

/// Handle client.list messages
pub async fn handle_list(client: Client, mut subscriber: Subscriber, pool: PgPool) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received client.list message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<ListClientsRequest> = match serde_json::from_slice(&msg.payload) {
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

        match queries::client::list_clients(&pool, &request.payload).await {
            Ok((clients, total)) => {
                let response =
                    SuccessResponse::new(request.id, ListClientsResponse { clients, total });
                let _ = client
                    .publish(reply, serde_json::to_vec(&response)?.into())
                    .await;
                debug!("Listed {} clients", total);
            }
            Err(e) => {
                error!("Failed to list clients: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
            }
        }
    }

    Ok(())
}

/// Handle client.update messages. A coordinate change drops every cached
/// travel estimate touching this client so the next rota recomputes them.
pub async fn handle_update(client: Client, mut subscriber: Subscriber, pool: PgPool) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received client.update message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<UpdateClientRequest> = match serde_json::from_slice(&msg.payload) {
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

        let old = match queries::client::get_client(&pool, payload.id, payload.agency_id).await {
            Ok(Some(c)) => c,
            Ok(None) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Client not found");
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
                continue;
            }
            Err(e) => {
                error!("Failed to load client: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
                continue;
            }
        };

        match queries::client::update_client(&pool, &payload).await {
            Ok(Some(updated)) => {
                if updated.coordinates() != old.coordinates() {
                    match queries::travel::delete_for_client(&pool, updated.id).await {
                        Ok(removed) => info!(
                            "Client {} coordinates changed, invalidated {} travel cache entries",
                            updated.id, removed
                        ),
                        Err(e) => warn!(
                            "Failed to invalidate travel cache for client {}: {}",
                            updated.id, e
                        ),
                    }
                }

                let client_id = updated.id;
                let response = SuccessResponse::new(request.id, updated);
                let _ = client
                    .publish(reply, serde_json::to_vec(&response)?.into())
                    .await;
                debug!("Updated client {}", client_id);
            }
            Ok(None) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Client not found");
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
            }
            Err(e) => {
                error!("Failed to update client: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
            }
        }
    }

    Ok(())
}

/// Handle client.archive messages
pub async fn handle_archive(client: Client, mut subscriber: Subscriber, pool: PgPool) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received client.archive message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<ArchiveClientRequest> = match serde_json::from_slice(&msg.payload) {
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

        match queries::client::archive_client(&pool, payload.id, payload.agency_id).await {
            Ok(Some(visits_archived)) => {
                info!(
                    "Archived client {} and {} visits",
                    payload.id, visits_archived
                );
                let response = SuccessResponse::new(
                    request.id,
                    ArchiveClientResponse {
                        archived: true,
                        visits_archived,
                    },
                );
                let _ = client
                    .publish(reply, serde_json::to_vec(&response)?.into())
                    .await;
            }
            Ok(None) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Client not found");
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
            }
            Err(e) => {
                error!("Failed to archive client: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
            }
        }
    }

    Ok(())
}
