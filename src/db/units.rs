// src/db/units.rs

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgExecutor, PgPool};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Unit;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewUnit {
    pub franchise_id: Uuid,
    pub name: String,
    pub cnpj: Option<String>,
    pub operator_user_id: Option<Uuid>,
    pub commission_rate: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UnitUpdate {
    pub name: Option<String>,
    pub operator_user_id: Option<Uuid>,
    pub commission_rate: Option<Decimal>,
    pub active: Option<bool>,
}

pub async fn list(
    pool: &PgPool,
    unit_scope: Option<Uuid>,
    franchise_id: Option<Uuid>,
    include_inactive: bool,
) -> Result<Vec<Unit>, sqlx::Error> {
    sqlx::query_as::<_, Unit>(
        r#"SELECT * FROM units
           WHERE ($1::uuid IS NULL OR id = $1)
             AND ($2::uuid IS NULL OR franchise_id = $2)
             AND (active = true OR $3)
           ORDER BY name ASC"#,
    )
    .bind(unit_scope)
    .bind(franchise_id)
    .bind(include_inactive)
    .fetch_all(pool)
    .await
}

pub async fn get(executor: impl PgExecutor<'_>, id: Uuid) -> Result<Option<Unit>, sqlx::Error> {
    sqlx::query_as::<_, Unit>("SELECT * FROM units WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub async fn insert(pool: &PgPool, new: &NewUnit) -> Result<Unit, sqlx::Error> {
    sqlx::query_as::<_, Unit>(
        r#"INSERT INTO units (franchise_id, name, cnpj, operator_user_id, commission_rate)
           VALUES ($1, $2, $3, $4, COALESCE($5, 0))
           RETURNING *"#,
    )
    .bind(new.franchise_id)
    .bind(new.name.trim())
    .bind(new.cnpj.as_deref().map(crate::validation::only_digits))
    .bind(new.operator_user_id)
    .bind(new.commission_rate)
    .fetch_one(pool)
    .await
}

pub async fn update(pool: &PgPool, id: Uuid, changes: &UnitUpdate) -> Result<Option<Unit>, sqlx::Error> {
    sqlx::query_as::<_, Unit>(
        r#"UPDATE units SET
               name = COALESCE($2, name),
               operator_user_id = COALESCE($3, operator_user_id),
               commission_rate = COALESCE($4, commission_rate),
               active = COALESCE($5, active),
               updated_at = NOW()
           WHERE id = $1
           RETURNING *"#,
    )
    .bind(id)
    .bind(changes.name.as_deref().map(str::trim))
    .bind(changes.operator_user_id)
    .bind(changes.commission_rate)
    .bind(changes.active)
    .fetch_optional(pool)
    .await
}

pub async fn deactivate(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE units SET active = false, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() == 1)
}
