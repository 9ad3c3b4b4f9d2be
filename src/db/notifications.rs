// src/db/notifications.rs

use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::models::{Notification, PageParams};

pub async fn list_for_user(
    pool: &PgPool,
    user_id: Uuid,
    unread_only: bool,
    page: &PageParams,
) -> Result<Vec<Notification>, sqlx::Error> {
    sqlx::query_as::<_, Notification>(
        r#"SELECT * FROM notifications
           WHERE user_id = $1 AND (read = false OR NOT $2)
           ORDER BY created_at DESC
           LIMIT $3 OFFSET $4"#,
    )
    .bind(user_id)
    .bind(unread_only)
    .bind(page.per_page())
    .bind(page.offset())
    .fetch_all(pool)
    .await
}

pub async fn unread_count(pool: &PgPool, user_id: Uuid) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND read = false")
        .bind(user_id)
        .fetch_one(pool)
        .await
}

pub async fn insert(
    executor: impl PgExecutor<'_>,
    user_id: Uuid,
    title: &str,
    message: &str,
    link: Option<&str>,
) -> Result<Notification, sqlx::Error> {
    sqlx::query_as::<_, Notification>(
        r#"INSERT INTO notifications (user_id, title, message, link)
           VALUES ($1, $2, $3, $4)
           RETURNING *"#,
    )
    .bind(user_id)
    .bind(title)
    .bind(message)
    .bind(link)
    .fetch_one(executor)
    .await
}

/// One notification per recipient in a single statement.
pub async fn insert_many(
    executor: impl PgExecutor<'_>,
    user_ids: &[Uuid],
    title: &str,
    message: &str,
    link: Option<&str>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"INSERT INTO notifications (user_id, title, message, link)
           SELECT UNNEST($1::uuid[]), $2, $3, $4"#,
    )
    .bind(user_ids)
    .bind(title)
    .bind(message)
    .bind(link)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

pub async fn mark_read(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE notifications SET read = true WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn mark_all_read(pool: &PgPool, user_id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE notifications SET read = true WHERE user_id = $1 AND read = false")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
