//! Client database queries

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::{Client, CreateClientRequest, ListClientsRequest, UpdateClientRequest};

const CLIENT_COLUMNS: &str = r#"
    id, agency_id, name, address, postcode,
    lat, lng, geocode_status,
    requires_double_up, archived,
    created_at, updated_at
"#;

/// Create a new client
pub async fn create_client(pool: &PgPool, req: &CreateClientRequest) -> Result<Client> {
    let client = sqlx::query_as::<_, Client>(&format!(
        r#"
        INSERT INTO clients (
            id, agency_id, name, address, postcode,
            lat, lng, geocode_status,
            requires_double_up, archived,
            created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, FALSE, NOW(), NOW())
        RETURNING {CLIENT_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(req.agency_id)
    .bind(&req.name)
    .bind(req.address.as_deref().unwrap_or(""))
    .bind(&req.postcode)
    .bind(req.lat)
    .bind(req.lng)
    .bind(if req.lat.is_some() { "success" } else { "pending" })
    .bind(req.requires_double_up.unwrap_or(false))
    .fetch_one(pool)
    .await?;

    Ok(client)
}

/// Get a client by ID
pub async fn get_client(pool: &PgPool, id: Uuid, agency_id: Uuid) -> Result<Option<Client>> {
    let client = sqlx::query_as::<_, Client>(&format!(
        "SELECT {CLIENT_COLUMNS} FROM clients WHERE id = $1 AND agency_id = $2"
    ))
    .bind(id)
    .bind(agency_id)
    .fetch_optional(pool)
    .await?;

    Ok(client)
}

/// List clients with optional name/postcode search
pub async fn list_clients(pool: &PgPool, req: &ListClientsRequest) -> Result<(Vec<Client>, i64)> {
    let mut conditions = vec!["agency_id = $1".to_string()];
    let mut param_idx = 1;

    if !req.include_archived.unwrap_or(false) {
        conditions.push("archived = FALSE".to_string());
    }
    if req.search.is_some() {
        param_idx += 1;
        conditions.push(format!(
            "(name ILIKE ${param_idx} OR postcode ILIKE ${param_idx})"
        ));
    }

    let where_clause = conditions.join(" AND ");
    let query = format!(
        r#"
        SELECT {CLIENT_COLUMNS}
        FROM clients
        WHERE {where_clause}
        ORDER BY name
        LIMIT ${} OFFSET ${}
        "#,
        param_idx + 1,
        param_idx + 2
    );
    let count_query = format!("SELECT COUNT(*) FROM clients WHERE {where_clause}");

    let mut query_builder = sqlx::query_as::<_, Client>(&query).bind(req.agency_id);
    let mut count_builder = sqlx::query_scalar::<_, i64>(&count_query).bind(req.agency_id);

    if let Some(search) = &req.search {
        let pattern = format!("%{}%", search);
        query_builder = query_builder.bind(pattern.clone());
        count_builder = count_builder.bind(pattern);
    }

    query_builder = query_builder
        .bind(req.limit.unwrap_or(100))
        .bind(req.offset.unwrap_or(0));

    let clients = query_builder.fetch_all(pool).await?;
    let total = count_builder.fetch_one(pool).await?;

    Ok((clients, total))
}

/// Update a client
pub async fn update_client(pool: &PgPool, req: &UpdateClientRequest) -> Result<Option<Client>> {
    let client = sqlx::query_as::<_, Client>(&format!(
        r#"
        UPDATE clients
        SET
            name = COALESCE($3, name),
            address = COALESCE($4, address),
            postcode = COALESCE($5, postcode),
            lat = COALESCE($6, lat),
            lng = COALESCE($7, lng),
            geocode_status = COALESCE($8, geocode_status),
            requires_double_up = COALESCE($9, requires_double_up),
            updated_at = NOW()
        WHERE id = $1 AND agency_id = $2
        RETURNING {CLIENT_COLUMNS}
        "#
    ))
    .bind(req.id)
    .bind(req.agency_id)
    .bind(&req.name)
    .bind(&req.address)
    .bind(&req.postcode)
    .bind(req.lat)
    .bind(req.lng)
    .bind(&req.geocode_status)
    .bind(req.requires_double_up)
    .fetch_optional(pool)
    .await?;

    Ok(client)
}

/// Archive a client and all of its visits in one transaction. Returns the
/// number of visits archived, or `None` if the client does not exist.
pub async fn archive_client(pool: &PgPool, id: Uuid, agency_id: Uuid) -> Result<Option<i64>> {
    let mut tx = pool.begin().await?;

    let archived = sqlx::query(
        "UPDATE clients SET archived = TRUE, updated_at = NOW() WHERE id = $1 AND agency_id = $2",
    )
    .bind(id)
    .bind(agency_id)
    .execute(&mut *tx)
    .await?;

    if archived.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(None);
    }

    let visits = sqlx::query(
        r#"
        UPDATE visits
        SET archived = TRUE, updated_at = NOW()
        WHERE client_id = $1 AND agency_id = $2 AND archived = FALSE
        "#,
    )
    .bind(id)
    .bind(agency_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Some(visits.rows_affected() as i64))
}
