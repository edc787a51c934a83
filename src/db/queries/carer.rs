//! Carer database queries

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::{Carer, CreateCarerRequest, UpdateCarerRequest};

/// Create a new carer
pub async fn create_carer(pool: &PgPool, req: &CreateCarerRequest) -> Result<Carer> {
    let carer = sqlx::query_as::<_, Carer>(
        r#"
        INSERT INTO carers (id, agency_id, name, active, created_at, updated_at)
        VALUES ($1, $2, $3, TRUE, NOW(), NOW())
        RETURNING id, agency_id, name, active, created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(req.agency_id)
    .bind(&req.name)
    .fetch_one(pool)
    .await?;

    Ok(carer)
}

/// Get a carer by ID
pub async fn get_carer(pool: &PgPool, id: Uuid, agency_id: Uuid) -> Result<Option<Carer>> {
    let carer = sqlx::query_as::<_, Carer>(
        r#"
        SELECT id, agency_id, name, active, created_at, updated_at
        FROM carers
        WHERE id = $1 AND agency_id = $2
        "#,
    )
    .bind(id)
    .bind(agency_id)
    .fetch_optional(pool)
    .await?;

    Ok(carer)
}

/// List carers for an agency
pub async fn list_carers(
    pool: &PgPool,
    agency_id: Uuid,
    include_inactive: bool,
) -> Result<Vec<Carer>> {
    let carers = sqlx::query_as::<_, Carer>(
        r#"
        SELECT id, agency_id, name, active, created_at, updated_at
        FROM carers
        WHERE agency_id = $1 AND (active OR $2)
        ORDER BY name
        "#,
    )
    .bind(agency_id)
    .bind(include_inactive)
    .fetch_all(pool)
    .await?;

    Ok(carers)
}

/// Update a carer (rename or activate/deactivate)
pub async fn update_carer(pool: &PgPool, req: &UpdateCarerRequest) -> Result<Option<Carer>> {
    let carer = sqlx::query_as::<_, Carer>(
        r#"
        UPDATE carers
        SET
            name = COALESCE($3, name),
            active = COALESCE($4, active),
            updated_at = NOW()
        WHERE id = $1 AND agency_id = $2
        RETURNING id, agency_id, name, active, created_at, updated_at
        "#,
    )
    .bind(req.id)
    .bind(req.agency_id)
    .bind(&req.name)
    .bind(req.active)
    .fetch_optional(pool)
    .await?;

    Ok(carer)
}
