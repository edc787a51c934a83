//! Visit database queries

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use thiserror::Error;
use uuid::Uuid;

use crate::types::{BookVisitRequest, ListVisitsRequest, RotaVisit, UpdateVisitRequest, Visit};

/// Why a time-slot swap could not be applied.
#[derive(Debug, Error)]
pub enum SwapVisitsError {
    #[error("visit {0} not found")]
    VisitNotFound(Uuid),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

const VISIT_COLUMNS: &str = r#"
    id, agency_id, client_id, carer_id, second_carer_id,
    start_at, end_at, status, notes,
    actual_arrival, actual_departure,
    archived, created_at, updated_at
"#;

/// Book a new visit
pub async fn book_visit(pool: &PgPool, req: &BookVisitRequest) -> Result<Visit> {
    let visit = sqlx::query_as::<_, Visit>(&format!(
        r#"
        INSERT INTO visits (
            id, agency_id, client_id, carer_id, second_carer_id,
            start_at, end_at, status, notes,
            archived, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, 'scheduled', $8, FALSE, NOW(), NOW())
        RETURNING {VISIT_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(req.agency_id)
    .bind(req.client_id)
    .bind(req.carer_id)
    .bind(req.second_carer_id)
    .bind(req.start_at)
    .bind(req.end_at)
    .bind(&req.notes)
    .fetch_one(pool)
    .await?;

    Ok(visit)
}

/// Get a visit by ID
pub async fn get_visit(pool: &PgPool, id: Uuid, agency_id: Uuid) -> Result<Option<Visit>> {
    let visit = sqlx::query_as::<_, Visit>(&format!(
        "SELECT {VISIT_COLUMNS} FROM visits WHERE id = $1 AND agency_id = $2"
    ))
    .bind(id)
    .bind(agency_id)
    .fetch_optional(pool)
    .await?;

    Ok(visit)
}

/// List visits with filters
pub async fn list_visits(pool: &PgPool, req: &ListVisitsRequest) -> Result<(Vec<Visit>, i64)> {
    // Build WHERE conditions dynamically
    let mut conditions = vec![
        "agency_id = $1".to_string(),
        "archived = FALSE".to_string(),
    ];
    let mut param_idx = 1;

    if req.client_id.is_some() {
        param_idx += 1;
        conditions.push(format!("client_id = ${param_idx}"));
    }
    if req.carer_id.is_some() {
        param_idx += 1;
        conditions.push(format!(
            "(carer_id = ${param_idx} OR second_carer_id = ${param_idx})"
        ));
    }
    if req.from.is_some() {
        param_idx += 1;
        conditions.push(format!("start_at >= ${param_idx}"));
    }
    if req.to.is_some() {
        param_idx += 1;
        conditions.push(format!("start_at < ${param_idx}"));
    }
    if req.status.is_some() {
        param_idx += 1;
        conditions.push(format!("status = ${param_idx}"));
    }

    let where_clause = conditions.join(" AND ");
    let query = format!(
        r#"
        SELECT {VISIT_COLUMNS}
        FROM visits
        WHERE {where_clause}
        ORDER BY start_at
        LIMIT ${} OFFSET ${}
        "#,
        param_idx + 1,
        param_idx + 2
    );
    let count_query = format!("SELECT COUNT(*) FROM visits WHERE {where_clause}");

    let mut query_builder = sqlx::query_as::<_, Visit>(&query).bind(req.agency_id);
    let mut count_builder = sqlx::query_scalar::<_, i64>(&count_query).bind(req.agency_id);

    if let Some(client_id) = req.client_id {
        query_builder = query_builder.bind(client_id);
        count_builder = count_builder.bind(client_id);
    }
    if let Some(carer_id) = req.carer_id {
        query_builder = query_builder.bind(carer_id);
        count_builder = count_builder.bind(carer_id);
    }
    if let Some(from) = req.from {
        query_builder = query_builder.bind(from);
        count_builder = count_builder.bind(from);
    }
    if let Some(to) = req.to {
        query_builder = query_builder.bind(to);
        count_builder = count_builder.bind(to);
    }
    if let Some(status) = &req.status {
        query_builder = query_builder.bind(status.clone());
        count_builder = count_builder.bind(status.clone());
    }

    query_builder = query_builder
        .bind(req.limit.unwrap_or(500))
        .bind(req.offset.unwrap_or(0));

    let visits = query_builder.fetch_all(pool).await?;
    let total = count_builder.fetch_one(pool).await?;

    Ok((visits, total))
}

/// Update a visit. A time change writes an adjustment entry in the same
/// transaction; the handler has already validated that a reason is present.
pub async fn update_visit(pool: &PgPool, req: &UpdateVisitRequest) -> Result<Option<Visit>> {
    let mut tx = pool.begin().await?;

    let old = sqlx::query_as::<_, Visit>(&format!(
        "SELECT {VISIT_COLUMNS} FROM visits WHERE id = $1 AND agency_id = $2 FOR UPDATE"
    ))
    .bind(req.id)
    .bind(req.agency_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(old) = old else {
        tx.rollback().await?;
        return Ok(None);
    };

    let visit = sqlx::query_as::<_, Visit>(&format!(
        r#"
        UPDATE visits
        SET
            carer_id = COALESCE($3, carer_id),
            second_carer_id = COALESCE($4, second_carer_id),
            start_at = COALESCE($5, start_at),
            end_at = COALESCE($6, end_at),
            status = COALESCE($7, status),
            notes = COALESCE($8, notes),
            updated_at = NOW()
        WHERE id = $1 AND agency_id = $2
        RETURNING {VISIT_COLUMNS}
        "#
    ))
    .bind(req.id)
    .bind(req.agency_id)
    .bind(req.carer_id)
    .bind(req.second_carer_id)
    .bind(req.start_at)
    .bind(req.end_at)
    .bind(&req.status)
    .bind(&req.notes)
    .fetch_one(&mut *tx)
    .await?;

    if (visit.start_at, visit.end_at) != (old.start_at, old.end_at) {
        insert_adjustment(
            &mut tx,
            &old,
            visit.start_at,
            visit.end_at,
            req.adjustment_reason.as_deref().unwrap_or(""),
        )
        .await?;
    }

    tx.commit().await?;
    Ok(Some(visit))
}

/// Record a carer's arrival. Defaults to now when no timestamp is given.
pub async fn check_in(
    pool: &PgPool,
    id: Uuid,
    agency_id: Uuid,
    at: Option<DateTime<Utc>>,
) -> Result<Option<Visit>> {
    let visit = sqlx::query_as::<_, Visit>(&format!(
        r#"
        UPDATE visits
        SET
            status = 'in_progress',
            actual_arrival = COALESCE($3, NOW()),
            updated_at = NOW()
        WHERE id = $1 AND agency_id = $2 AND archived = FALSE
        RETURNING {VISIT_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(agency_id)
    .bind(at)
    .fetch_optional(pool)
    .await?;

    Ok(visit)
}

/// Record a carer's departure and complete the visit.
pub async fn check_out(
    pool: &PgPool,
    id: Uuid,
    agency_id: Uuid,
    at: Option<DateTime<Utc>>,
) -> Result<Option<Visit>> {
    let visit = sqlx::query_as::<_, Visit>(&format!(
        r#"
        UPDATE visits
        SET
            status = 'completed',
            actual_departure = COALESCE($3, NOW()),
            updated_at = NOW()
        WHERE id = $1 AND agency_id = $2 AND archived = FALSE
        RETURNING {VISIT_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(agency_id)
    .bind(at)
    .fetch_optional(pool)
    .await?;

    Ok(visit)
}

/// Fetch the week's visit rows joined with the client fields the rota
/// engine needs. A visit belongs to the week of its start time.
pub async fn week_rota_visits(
    pool: &PgPool,
    agency_id: Uuid,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<RotaVisit>> {
    let visits = sqlx::query_as::<_, RotaVisit>(
        r#"
        SELECT
            v.id, v.client_id,
            c.name AS client_name,
            c.postcode AS client_postcode,
            c.lat AS client_lat,
            c.lng AS client_lng,
            c.requires_double_up AS client_requires_double_up,
            v.carer_id, v.second_carer_id,
            v.start_at, v.end_at, v.status, v.notes
        FROM visits v
        INNER JOIN clients c ON v.client_id = c.id
        WHERE v.agency_id = $1 AND v.archived = FALSE
          AND v.start_at >= $2 AND v.start_at < $3
        ORDER BY v.start_at
        "#,
    )
    .bind(agency_id)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await?;

    Ok(visits)
}

/// Exchange the time slots of two visits in one transaction. Both visits
/// get an adjustment entry.
pub async fn swap_visit_times(
    pool: &PgPool,
    agency_id: Uuid,
    first_id: Uuid,
    second_id: Uuid,
) -> Result<(Visit, Visit), SwapVisitsError> {
    let mut tx = pool.begin().await?;

    // Lock both rows in id order so concurrent swaps cannot deadlock.
    let rows = sqlx::query_as::<_, Visit>(&format!(
        r#"
        SELECT {VISIT_COLUMNS} FROM visits
        WHERE agency_id = $1 AND id = ANY($2) AND archived = FALSE
        ORDER BY id
        FOR UPDATE
        "#
    ))
    .bind(agency_id)
    .bind(vec![first_id, second_id])
    .fetch_all(&mut *tx)
    .await?;

    let Some(old_first) = rows.iter().find(|v| v.id == first_id).cloned() else {
        tx.rollback().await?;
        return Err(SwapVisitsError::VisitNotFound(first_id));
    };
    let Some(old_second) = rows.iter().find(|v| v.id == second_id).cloned() else {
        tx.rollback().await?;
        return Err(SwapVisitsError::VisitNotFound(second_id));
    };

    let new_first =
        set_visit_times(&mut tx, first_id, old_second.start_at, old_second.end_at).await?;
    let new_second =
        set_visit_times(&mut tx, second_id, old_first.start_at, old_first.end_at).await?;

    insert_adjustment(
        &mut tx,
        &old_first,
        new_first.start_at,
        new_first.end_at,
        &format!("Time-slot swap with visit {}", second_id),
    )
    .await?;
    insert_adjustment(
        &mut tx,
        &old_second,
        new_second.start_at,
        new_second.end_at,
        &format!("Time-slot swap with visit {}", first_id),
    )
    .await?;

    tx.commit().await?;
    Ok((new_first, new_second))
}

/// Non-archived visits of a carer that intersect the given interval,
/// excluding the listed visit ids. Times come back with the ids so the
/// caller can tell introduced overlaps from pre-existing ones.
pub async fn overlapping_visits(
    pool: &PgPool,
    agency_id: Uuid,
    carer_id: Uuid,
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
    exclude: &[Uuid],
) -> Result<Vec<(Uuid, DateTime<Utc>, DateTime<Utc>)>> {
    let rows = sqlx::query_as::<_, (Uuid, DateTime<Utc>, DateTime<Utc>)>(
        r#"
        SELECT id, start_at, end_at FROM visits
        WHERE agency_id = $1
          AND (carer_id = $2 OR second_carer_id = $2)
          AND archived = FALSE
          AND start_at < $4 AND end_at > $3
          AND id <> ALL($5)
        ORDER BY start_at
        "#,
    )
    .bind(agency_id)
    .bind(carer_id)
    .bind(start_at)
    .bind(end_at)
    .bind(exclude)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

async fn set_visit_times(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
) -> Result<Visit, sqlx::Error> {
    let visit = sqlx::query_as::<_, Visit>(&format!(
        r#"
        UPDATE visits
        SET start_at = $2, end_at = $3, updated_at = NOW()
        WHERE id = $1
        RETURNING {VISIT_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(start_at)
    .bind(end_at)
    .fetch_one(&mut **tx)
    .await?;

    Ok(visit)
}

async fn insert_adjustment(
    tx: &mut Transaction<'_, Postgres>,
    old: &Visit,
    new_start_at: DateTime<Utc>,
    new_end_at: DateTime<Utc>,
    reason: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO visit_adjustments (
            id, visit_id,
            old_start_at, old_end_at,
            new_start_at, new_end_at,
            reason, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(old.id)
    .bind(old.start_at)
    .bind(old.end_at)
    .bind(new_start_at)
    .bind(new_end_at)
    .bind(reason)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_error_names_the_missing_visit() {
        let id = Uuid::new_v4();
        let err = SwapVisitsError::VisitNotFound(id);
        assert_eq!(err.to_string(), format!("visit {} not found", id));
    }
}
