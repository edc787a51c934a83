//! NATS message handlers

pub mod carer;
pub mod client;
pub mod ping;
pub mod rota;
pub mod travel;
pub mod visit;

use anyhow::Result;
use async_nats::Client;
use sqlx::PgPool;
use tokio::select;
use tracing::{error, info};

/// Start all message handlers
pub async fn start_handlers(nats: Client, pool: PgPool) -> Result<()> {
    info!("Starting message handlers...");

    // Subscribe to all subjects
    let ping_sub = nats.subscribe("careline.ping").await?;

    let client_create_sub = nats.subscribe("careline.client.create").await?;
    let client_list_sub = nats.subscribe("careline.client.list").await?;
    let client_update_sub = nats.subscribe("careline.client.update").await?;
    let client_archive_sub = nats.subscribe("careline.client.archive").await?;

    let carer_create_sub = nats.subscribe("careline.carer.create").await?;
    let carer_list_sub = nats.subscribe("careline.carer.list").await?;
    let carer_update_sub = nats.subscribe("careline.carer.update").await?;

    let visit_book_sub = nats.subscribe("careline.visit.book").await?;
    let visit_list_sub = nats.subscribe("careline.visit.list").await?;
    let visit_update_sub = nats.subscribe("careline.visit.update").await?;
    let visit_check_in_sub = nats.subscribe("careline.visit.check_in").await?;
    let visit_check_out_sub = nats.subscribe("careline.visit.check_out").await?;
    let visit_swap_sub = nats.subscribe("careline.visit.swap").await?;

    let rota_week_sub = nats.subscribe("careline.rota.week").await?;
    let travel_invalidate_sub = nats.subscribe("careline.travel.invalidate").await?;

    info!("Subscribed to NATS subjects");

    // Clone for each handler
    let nats_ping = nats.clone();

    let nats_client_create = nats.clone();
    let nats_client_list = nats.clone();
    let nats_client_update = nats.clone();
    let nats_client_archive = nats.clone();

    let nats_carer_create = nats.clone();
    let nats_carer_list = nats.clone();
    let nats_carer_update = nats.clone();

    let nats_visit_book = nats.clone();
    let nats_visit_list = nats.clone();
    let nats_visit_update = nats.clone();
    let nats_visit_check_in = nats.clone();
    let nats_visit_check_out = nats.clone();
    let nats_visit_swap = nats.clone();

    let nats_rota_week = nats.clone();
    let nats_travel_invalidate = nats.clone();

    let pool_client_create = pool.clone();
    let pool_client_list = pool.clone();
    let pool_client_update = pool.clone();
    let pool_client_archive = pool.clone();

    let pool_carer_create = pool.clone();
    let pool_carer_list = pool.clone();
    let pool_carer_update = pool.clone();

    let pool_visit_book = pool.clone();
    let pool_visit_list = pool.clone();
    let pool_visit_update = pool.clone();
    let pool_visit_check_in = pool.clone();
    let pool_visit_check_out = pool.clone();
    let pool_visit_swap = pool.clone();

    let pool_rota_week = pool.clone();
    let pool_travel_invalidate = pool.clone();

    // Spawn handlers
    let ping_handle = tokio::spawn(async move {
        ping::handle_ping(nats_ping, ping_sub).await
    });

    let client_create_handle = tokio::spawn(async move {
        client::handle_create(nats_client_create, client_create_sub, pool_client_create).await
    });

    let client_list_handle = tokio::spawn(async move {
        client::handle_list(nats_client_list, client_list_sub, pool_client_list).await
    });

    let client_update_handle = tokio::spawn(async move {
        client::handle_update(nats_client_update, client_update_sub, pool_client_update).await
    });

    let client_archive_handle = tokio::spawn(async move {
        client::handle_archive(nats_client_archive, client_archive_sub, pool_client_archive).await
    });

    let carer_create_handle = tokio::spawn(async move {
        carer::handle_create(nats_carer_create, carer_create_sub, pool_carer_create).await
    });

    let carer_list_handle = tokio::spawn(async move {
        carer::handle_list(nats_carer_list, carer_list_sub, pool_carer_list).await
    });

    let carer_update_handle = tokio::spawn(async move {
        carer::handle_update(nats_carer_update, carer_update_sub, pool_carer_update).await
    });

    let visit_book_handle = tokio::spawn(async move {
        visit::handle_book(nats_visit_book, visit_book_sub, pool_visit_book).await
    });

    let visit_list_handle = tokio::spawn(async move {
        visit::handle_list(nats_visit_list, visit_list_sub, pool_visit_list).await
    });

    let visit_update_handle = tokio::spawn(async move {
        visit::handle_update(nats_visit_update, visit_update_sub, pool_visit_update).await
    });

    let visit_check_in_handle = tokio::spawn(async move {
        visit::handle_check_in(nats_visit_check_in, visit_check_in_sub, pool_visit_check_in).await
    });

    let visit_check_out_handle = tokio::spawn(async move {
        visit::handle_check_out(nats_visit_check_out, visit_check_out_sub, pool_visit_check_out)
            .await
    });

    let visit_swap_handle = tokio::spawn(async move {
        visit::handle_swap(nats_visit_swap, visit_swap_sub, pool_visit_swap).await
    });

    let rota_week_handle = tokio::spawn(async move {
        rota::handle_week(nats_rota_week, rota_week_sub, pool_rota_week).await
    });

    let travel_invalidate_handle = tokio::spawn(async move {
        travel::handle_invalidate(
            nats_travel_invalidate,
            travel_invalidate_sub,
            pool_travel_invalidate,
        )
        .await
    });

    info!("All handlers started, waiting for messages...");

    // Wait for any handler to finish (which means an error occurred)
    select! {
        result = ping_handle => {
            error!("Ping handler finished: {:?}", result);
        }
        result = client_create_handle => {
            error!("Client create handler finished: {:?}", result);
        }
        result = client_list_handle => {
            error!("Client list handler finished: {:?}", result);
        }
        result = client_update_handle => {
            error!("Client update handler finished: {:?}", result);
        }
        result = client_archive_handle => {
            error!("Client archive handler finished: {:?}", result);
        }
        result = carer_create_handle => {
            error!("Carer create handler finished: {:?}", result);
        }
        result = carer_list_handle => {
            error!("Carer list handler finished: {:?}", result);
        }
        result = carer_update_handle => {
            error!("Carer update handler finished: {:?}", result);
        }
        result = visit_book_handle => {
            error!("Visit book handler finished: {:?}", result);
        }
        result = visit_list_handle => {
            error!("Visit list handler finished: {:?}", result);
        }
        result = visit_update_handle => {
            error!("Visit update handler finished: {:?}", result);
        }
        result = visit_check_in_handle => {
            error!("Visit check-in handler finished: {:?}", result);
        }
        result = visit_check_out_handle => {
            error!("Visit check-out handler finished: {:?}", result);
        }
        result = visit_swap_handle => {
            error!("Visit swap handler finished: {:?}", result);
        }
        result = rota_week_handle => {
            error!("Rota week handler finished: {:?}", result);
        }
        result = travel_invalidate_handle => {
            error!("Travel invalidate handler finished: {:?}", result);
        }
    }

    Ok(())
}
