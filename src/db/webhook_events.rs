// src/db/webhook_events.rs

use serde_json::Value;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::models::WebhookEvent;

/// Seconds after which a claim on an unfinished event may be taken over.
pub const CLAIM_TIMEOUT_SECS: i64 = 300;

/// Stores the event unless its `event_id` was already seen.
/// Returns `true` when a new row was inserted.
pub async fn insert_if_absent(
    pool: &PgPool,
    event_id: &str,
    event_type: &str,
    payload: &Value,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"INSERT INTO webhook_events (event_id, event_type, payload)
           VALUES ($1, $2, $3)
           ON CONFLICT (event_id) DO NOTHING"#,
    )
    .bind(event_id)
    .bind(event_type)
    .bind(payload)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Atomically takes ownership of an unprocessed event. Only one concurrent
/// caller gets `Some`; a stale claim expires after [`CLAIM_TIMEOUT_SECS`].
pub async fn claim(pool: &PgPool, event_id: &str) -> Result<Option<WebhookEvent>, sqlx::Error> {
    sqlx::query_as::<_, WebhookEvent>(
        r#"UPDATE webhook_events
           SET processing_started_at = NOW(), attempts = attempts + 1
           WHERE event_id = $1
             AND processed = false
             AND (processing_started_at IS NULL
                  OR processing_started_at < NOW() - make_interval(secs => $2))
           RETURNING *"#,
    )
    .bind(event_id)
    .bind(CLAIM_TIMEOUT_SECS as f64)
    .fetch_optional(pool)
    .await
}

/// Run on the transaction that applied the effects, so both commit together.
pub async fn mark_processed(executor: impl PgExecutor<'_>, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"UPDATE webhook_events
           SET processed = true, processed_at = NOW(), error_message = NULL
           WHERE id = $1"#,
    )
    .bind(id)
    .execute(executor)
    .await?;
    Ok(())
}

/// Releases the claim and keeps the error so the event can be reprocessed.
pub async fn mark_failed(pool: &PgPool, id: Uuid, error: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"UPDATE webhook_events
           SET processing_started_at = NULL, error_message = $2
           WHERE id = $1"#,
    )
    .bind(id)
    .bind(error)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_by_event_id(pool: &PgPool, event_id: &str) -> Result<Option<WebhookEvent>, sqlx::Error> {
    sqlx::query_as::<_, WebhookEvent>("SELECT * FROM webhook_events WHERE event_id = $1")
        .bind(event_id)
        .fetch_optional(pool)
        .await
}

/// Unprocessed events that are not currently claimed, oldest first.
pub async fn list_unprocessed(
    pool: &PgPool,
    max_attempts: i32,
    limit: i64,
) -> Result<Vec<WebhookEvent>, sqlx::Error> {
    sqlx::query_as::<_, WebhookEvent>(
        r#"SELECT * FROM webhook_events
           WHERE processed = false
             AND attempts < $1
             AND (processing_started_at IS NULL
                  OR processing_started_at < NOW() - make_interval(secs => $2))
           ORDER BY created_at ASC
           LIMIT $3"#,
    )
    .bind(max_attempts)
    .bind(CLAIM_TIMEOUT_SECS as f64)
    .bind(limit)
    .fetch_all(pool)
    .await
}
