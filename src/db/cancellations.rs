// src/db/cancellations.rs

use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::models::{Cancellation, PageParams};

/// Inserts the cancellation unless the beneficiary already has one.
/// Returns `None` when a row already existed.
pub async fn insert_once(
    executor: impl PgExecutor<'_>,
    beneficiary_id: Uuid,
    reason: &str,
    cancelled_by: Option<Uuid>,
) -> Result<Option<Cancellation>, sqlx::Error> {
    sqlx::query_as::<_, Cancellation>(
        r#"INSERT INTO cancellations (beneficiary_id, reason, cancelled_by)
           VALUES ($1, $2, $3)
           ON CONFLICT (beneficiary_id) DO NOTHING
           RETURNING *"#,
    )
    .bind(beneficiary_id)
    .bind(reason)
    .bind(cancelled_by)
    .fetch_optional(executor)
    .await
}

pub async fn for_beneficiary(
    executor: impl PgExecutor<'_>,
    beneficiary_id: Uuid,
) -> Result<Option<Cancellation>, sqlx::Error> {
    sqlx::query_as::<_, Cancellation>("SELECT * FROM cancellations WHERE beneficiary_id = $1")
        .bind(beneficiary_id)
        .fetch_optional(executor)
        .await
}

pub async fn list(
    pool: &PgPool,
    unit_scope: Option<Uuid>,
    page: &PageParams,
) -> Result<Vec<Cancellation>, sqlx::Error> {
    sqlx::query_as::<_, Cancellation>(
        r#"SELECT c.* FROM cancellations c
           JOIN beneficiaries b ON b.id = c.beneficiary_id
           WHERE ($1::uuid IS NULL OR b.unit_id = $1)
           ORDER BY c.created_at DESC
           LIMIT $2 OFFSET $3"#,
    )
    .bind(unit_scope)
    .bind(page.per_page())
    .bind(page.offset())
    .fetch_all(pool)
    .await
}
