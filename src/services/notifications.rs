// src/services/notifications.rs

use sqlx::PgPool;
use uuid::Uuid;

use crate::db;

/// In-app notification for everyone operating `unit_id`.
pub async fn notify_unit(
    pool: &PgPool,
    unit_id: Uuid,
    title: &str,
    message: &str,
    link: Option<&str>,
) -> Result<u64, sqlx::Error> {
    let recipients = db::users::unit_recipients(pool, unit_id).await?;
    if recipients.is_empty() {
        log::debug!("no recipients for unit_id={unit_id}, notification dropped: {title}");
        return Ok(0);
    }
    db::notifications::insert_many(pool, &recipients, title, message, link).await
}

pub async fn notify_headquarters(
    pool: &PgPool,
    title: &str,
    message: &str,
    link: Option<&str>,
) -> Result<u64, sqlx::Error> {
    let recipients = db::users::headquarters_recipients(pool).await?;
    if recipients.is_empty() {
        return Ok(0);
    }
    db::notifications::insert_many(pool, &recipients, title, message, link).await
}

/// Notification failures never fail the operation that triggered them.
pub async fn notify_unit_quietly(pool: &PgPool, unit_id: Uuid, title: &str, message: &str, link: Option<&str>) {
    if let Err(e) = notify_unit(pool, unit_id, title, message, link).await {
        log::warn!("notify unit_id={unit_id} failed: {e}");
    }
}

pub async fn notify_headquarters_quietly(pool: &PgPool, title: &str, message: &str, link: Option<&str>) {
    if let Err(e) = notify_headquarters(pool, title, message, link).await {
        log::warn!("notify headquarters failed: {e}");
    }
}

pub fn beneficiary_link(beneficiary_id: Uuid) -> String {
    format!("/beneficiaries/{beneficiary_id}")
}
