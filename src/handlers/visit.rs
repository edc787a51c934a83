//! Visit message handlers

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use sqlx::PgPool;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::db::queries;
use crate::db::queries::visit::SwapVisitsError;
use crate::services::optimizer::{introduced_overlaps, swap_time_slots};
use crate::types::{
    BookVisitRequest, ErrorResponse, ListVisitsRequest, ListVisitsResponse, Request,
    SuccessResponse, SwapVisitsRequest, SwapVisitsResponse, SwapWarning, UpdateVisitRequest,
    Visit, VisitCheckRequest, VisitStatus,
};

/// Handle visit.book messages
pub async fn handle_book(client: Client, mut subscriber: Subscriber, pool: PgPool) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received visit.book message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<BookVisitRequest> = match serde_json::from_slice(&msg.payload) {
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

        if payload.end_at <= payload.start_at {
            let error =
                ErrorResponse::new(request.id, "INVALID_REQUEST", "Visit must end after it starts");
            let _ = client
                .publish(reply, serde_json::to_vec(&error)?.into())
                .await;
            continue;
        }
        if payload.second_carer_id.is_some() && payload.second_carer_id == payload.carer_id {
            let error = ErrorResponse::new(
                request.id,
                "INVALID_REQUEST",
                "A joint visit needs two distinct carers",
            );
            let _ = client
                .publish(reply, serde_json::to_vec(&error)?.into())
                .await;
            continue;
        }

        info!(
            "Booking visit for client {} at {}",
            payload.client_id, payload.start_at
        );

        match queries::visit::book_visit(&pool, &payload).await {
            Ok(visit) => {
                let visit_id = visit.id;
                let response = SuccessResponse::new(request.id, visit);
                let _ = client
                    .publish(reply, serde_json::to_vec(&response)?.into())
                    .await;
                debug!("Booked visit {}", visit_id);
            }
            Err(e) => {
                error!("Failed to book visit: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
            }
        }
    }

    Ok(())
}

/// Handle visit.list messages
pub async fn handle_list(client: Client, mut subscriber: Subscriber, pool: PgPool) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received visit.list message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<ListVisitsRequest> = match serde_json::from_slice(&msg.payload) {
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

        match queries::visit::list_visits(&pool, &request.payload).await {
            Ok((visits, total)) => {
                let response =
                    SuccessResponse::new(request.id, ListVisitsResponse { visits, total });
                let _ = client
                    .publish(reply, serde_json::to_vec(&response)?.into())
                    .await;
                debug!("Listed {} visits", total);
            }
            Err(e) => {
                error!("Failed to list visits: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
            }
        }
    }

    Ok(())
}

/// Handle visit.update messages. A time change must carry a reason; it is
/// recorded as an immutable adjustment entry alongside the update.
pub async fn handle_update(client: Client, mut subscriber: Subscriber, pool: PgPool) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received visit.update message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<UpdateVisitRequest> = match serde_json::from_slice(&msg.payload) {
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

        if let Err(message) = validate_update(&payload) {
            let error = ErrorResponse::new(request.id, "INVALID_REQUEST", message);
            let _ = client
                .publish(reply, serde_json::to_vec(&error)?.into())
                .await;
            continue;
        }

        match queries::visit::update_visit(&pool, &payload).await {
            Ok(Some(visit)) => {
                let response = SuccessResponse::new(request.id, visit);
                let _ = client
                    .publish(reply, serde_json::to_vec(&response)?.into())
                    .await;
                debug!("Updated visit {}", payload.id);
            }
            Ok(None) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Visit not found");
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
            }
            Err(e) => {
                error!("Failed to update visit: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
            }
        }
    }

    Ok(())
}

/// Handle visit.check_in messages
pub async fn handle_check_in(client: Client, mut subscriber: Subscriber, pool: PgPool) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received visit.check_in message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<VisitCheckRequest> = match serde_json::from_slice(&msg.payload) {
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

        match queries::visit::check_in(&pool, payload.id, payload.agency_id, payload.at).await {
            Ok(Some(visit)) => {
                let response = SuccessResponse::new(request.id, visit);
                let _ = client
                    .publish(reply, serde_json::to_vec(&response)?.into())
                    .await;
                info!("Checked in visit {}", payload.id);
            }
            Ok(None) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Visit not found");
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
            }
            Err(e) => {
                error!("Failed to check in visit: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
            }
        }
    }

    Ok(())
}

/// Handle visit.check_out messages
pub async fn handle_check_out(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received visit.check_out message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<VisitCheckRequest> = match serde_json::from_slice(&msg.payload) {
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

        match queries::visit::check_out(&pool, payload.id, payload.agency_id, payload.at).await {
            Ok(Some(visit)) => {
                let response = SuccessResponse::new(request.id, visit);
                let _ = client
                    .publish(reply, serde_json::to_vec(&response)?.into())
                    .await;
                info!("Checked out visit {}", payload.id);
            }
            Ok(None) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Visit not found");
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
            }
            Err(e) => {
                error!("Failed to check out visit: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
            }
        }
    }

    Ok(())
}

/// Handle visit.swap messages. The swap is applied atomically; overlaps it
/// introduces are returned as warnings, not errors, because field crises
/// sometimes make an overlapping schedule the least bad option.
pub async fn handle_swap(client: Client, mut subscriber: Subscriber, pool: PgPool) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received visit.swap message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<SwapVisitsRequest> = match serde_json::from_slice(&msg.payload) {
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

        if payload.first_visit_id == payload.second_visit_id {
            let error = ErrorResponse::new(
                request.id,
                "INVALID_REQUEST",
                "Cannot swap a visit with itself",
            );
            let _ = client
                .publish(reply, serde_json::to_vec(&error)?.into())
                .await;
            continue;
        }

        match queries::visit::swap_visit_times(
            &pool,
            payload.agency_id,
            payload.first_visit_id,
            payload.second_visit_id,
        )
        .await
        {
            Ok((first, second)) => {
                let warnings =
                    match collect_swap_warnings(&pool, payload.agency_id, &first, &second).await {
                        Ok(warnings) => warnings,
                        Err(e) => {
                            warn!("Failed to compute swap warnings: {}", e);
                            vec![]
                        }
                    };

                info!(
                    "Swapped time slots of visits {} and {} ({} warnings)",
                    first.id,
                    second.id,
                    warnings.len()
                );
                let response = SuccessResponse::new(
                    request.id,
                    SwapVisitsResponse {
                        applied: true,
                        warnings,
                    },
                );
                let _ = client
                    .publish(reply, serde_json::to_vec(&response)?.into())
                    .await;
            }
            Err(SwapVisitsError::VisitNotFound(id)) => {
                let error = ErrorResponse::new(
                    request.id,
                    "NOT_FOUND",
                    format!("Visit {} not found", id),
                );
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
            }
            Err(e) => {
                error!("Failed to swap visits: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
            }
        }
    }

    Ok(())
}

/// Reject malformed update requests before they touch the record store.
fn validate_update(payload: &UpdateVisitRequest) -> Result<(), String> {
    if let Some(status) = payload.status.as_deref() {
        if VisitStatus::parse(status).is_none() {
            return Err(format!("Unknown visit status '{}'", status));
        }
    }

    let changes_times = payload.start_at.is_some() || payload.end_at.is_some();
    let has_reason = payload
        .adjustment_reason
        .as_deref()
        .is_some_and(|r| !r.trim().is_empty());
    if changes_times && !has_reason {
        return Err("A time change requires an adjustment reason".to_string());
    }

    if let (Some(start), Some(end)) = (payload.start_at, payload.end_at) {
        if end <= start {
            return Err("Visit must end after it starts".to_string());
        }
    }

    Ok(())
}

/// Warn about the overlaps a swap introduced. For every carer on either
/// swapped visit, fetch visits intersecting the new slot, then drop the
/// ones that already intersected the old slot. The two swapped visits are
/// excluded from each other's checks.
async fn collect_swap_warnings(
    pool: &PgPool,
    agency_id: Uuid,
    first: &Visit,
    second: &Visit,
) -> Result<Vec<SwapWarning>> {
    let exclude = [first.id, second.id];

    // Swapping the post-swap slots back recovers where each visit sat
    // before; the exchange is its own inverse.
    let mut first_previous = (first.start_at, first.end_at);
    let mut second_previous = (second.start_at, second.end_at);
    swap_time_slots(&mut first_previous, &mut second_previous);

    let mut warnings = Vec::new();
    for (visit, previous) in [(first, first_previous), (second, second_previous)] {
        let Some(assignment) = visit.assignment() else {
            continue;
        };
        let current = (visit.start_at, visit.end_at);
        for carer_id in assignment.carer_ids() {
            let candidates = queries::visit::overlapping_visits(
                pool,
                agency_id,
                carer_id,
                visit.start_at,
                visit.end_at,
                &exclude,
            )
            .await?;
            for overlapping_visit_id in introduced_overlaps(previous, current, &candidates) {
                warnings.push(SwapWarning {
                    carer_id,
                    swapped_visit_id: visit.id,
                    overlapping_visit_id,
                });
            }
        }
    }

    Ok(warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn update_request() -> UpdateVisitRequest {
        UpdateVisitRequest {
            id: Uuid::new_v4(),
            agency_id: Uuid::new_v4(),
            carer_id: None,
            second_carer_id: None,
            start_at: None,
            end_at: None,
            status: None,
            notes: None,
            adjustment_reason: None,
        }
    }

    #[test]
    fn test_update_rejects_unknown_status() {
        let mut req = update_request();
        req.status = Some("cancelled".to_string());

        let message = validate_update(&req).unwrap_err();
        assert!(message.contains("cancelled"), "got: {}", message);
    }

    #[test]
    fn test_update_accepts_known_status() {
        let mut req = update_request();
        req.status = Some("missed".to_string());
        assert!(validate_update(&req).is_ok());
    }

    #[test]
    fn test_update_time_change_requires_reason() {
        let mut req = update_request();
        req.start_at = Some(Utc.with_ymd_and_hms(2026, 8, 3, 9, 0, 0).unwrap());
        assert!(validate_update(&req).is_err());

        req.adjustment_reason = Some("Client hospital appointment".to_string());
        assert!(validate_update(&req).is_ok());

        // A blank reason does not count.
        req.adjustment_reason = Some("   ".to_string());
        assert!(validate_update(&req).is_err());
    }

    #[test]
    fn test_update_rejects_inverted_times() {
        let mut req = update_request();
        req.start_at = Some(Utc.with_ymd_and_hms(2026, 8, 3, 10, 0, 0).unwrap());
        req.end_at = Some(Utc.with_ymd_and_hms(2026, 8, 3, 9, 0, 0).unwrap());
        req.adjustment_reason = Some("Typo in booking".to_string());
        assert!(validate_update(&req).is_err());
    }
}
