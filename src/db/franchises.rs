// src/db/franchises.rs

use serde::Deserialize;
use sqlx::PgPool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Franchise, PageParams};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewFranchise {
    pub name: String,
    pub cnpj: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct FranchiseUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub active: Option<bool>,
}

pub async fn list(
    pool: &PgPool,
    include_inactive: bool,
    page: &PageParams,
) -> Result<(Vec<Franchise>, i64), sqlx::Error> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM franchises WHERE active = true OR $1")
        .bind(include_inactive)
        .fetch_one(pool)
        .await?;

    let rows = sqlx::query_as::<_, Franchise>(
        r#"SELECT * FROM franchises
           WHERE active = true OR $1
           ORDER BY name ASC
           LIMIT $2 OFFSET $3"#,
    )
    .bind(include_inactive)
    .bind(page.per_page())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    Ok((rows, total))
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<Option<Franchise>, sqlx::Error> {
    sqlx::query_as::<_, Franchise>("SELECT * FROM franchises WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn insert(pool: &PgPool, new: &NewFranchise) -> Result<Franchise, sqlx::Error> {
    sqlx::query_as::<_, Franchise>(
        r#"INSERT INTO franchises (name, cnpj, email, phone)
           VALUES ($1, $2, $3, $4)
           RETURNING *"#,
    )
    .bind(new.name.trim())
    .bind(crate::validation::only_digits(&new.cnpj))
    .bind(new.email.as_deref().map(|e| e.trim().to_lowercase()))
    .bind(new.phone.as_deref().map(crate::validation::only_digits))
    .fetch_one(pool)
    .await
}

pub async fn update(
    pool: &PgPool,
    id: Uuid,
    changes: &FranchiseUpdate,
) -> Result<Option<Franchise>, sqlx::Error> {
    sqlx::query_as::<_, Franchise>(
        r#"UPDATE franchises SET
               name = COALESCE($2, name),
               email = COALESCE($3, email),
               phone = COALESCE($4, phone),
               active = COALESCE($5, active),
               updated_at = NOW()
           WHERE id = $1
           RETURNING *"#,
    )
    .bind(id)
    .bind(changes.name.as_deref().map(str::trim))
    .bind(changes.email.as_deref().map(|e| e.trim().to_lowercase()))
    .bind(changes.phone.as_deref().map(crate::validation::only_digits))
    .bind(changes.active)
    .fetch_optional(pool)
    .await
}

/// Deactivates the franchise together with its units.
pub async fn deactivate(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let result = sqlx::query("UPDATE franchises SET active = false, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE units SET active = false, updated_at = NOW() WHERE franchise_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(result.rows_affected() == 1)
}
