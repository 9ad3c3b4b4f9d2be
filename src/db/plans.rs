// src/db/plans.rs

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgExecutor, PgPool};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Plan;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewPlan {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub gateway_plan_id: Option<String>,
    pub gateway_product_id: Option<String>,
    pub franchise_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct PlanUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub gateway_plan_id: Option<String>,
    pub gateway_product_id: Option<String>,
    pub active: Option<bool>,
}

pub async fn list(pool: &PgPool, include_inactive: bool) -> Result<Vec<Plan>, sqlx::Error> {
    sqlx::query_as::<_, Plan>(
        r#"SELECT * FROM plans
           WHERE active = true OR $1
           ORDER BY price ASC, name ASC"#,
    )
    .bind(include_inactive)
    .fetch_all(pool)
    .await
}

/// Active plans a unit may sell: global plans plus the ones of its franchise.
pub async fn list_for_unit(pool: &PgPool, unit_id: Uuid) -> Result<Vec<Plan>, sqlx::Error> {
    sqlx::query_as::<_, Plan>(
        r#"SELECT p.* FROM plans p
           WHERE p.active = true
             AND (p.franchise_id IS NULL
                  OR p.franchise_id = (SELECT franchise_id FROM units WHERE id = $1))
           ORDER BY p.price ASC, p.name ASC"#,
    )
    .bind(unit_id)
    .fetch_all(pool)
    .await
}

pub async fn get(executor: impl PgExecutor<'_>, id: Uuid) -> Result<Option<Plan>, sqlx::Error> {
    sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub async fn insert(pool: &PgPool, new: &NewPlan) -> Result<Plan, sqlx::Error> {
    sqlx::query_as::<_, Plan>(
        r#"INSERT INTO plans (name, description, price, gateway_plan_id, gateway_product_id, franchise_id)
           VALUES ($1, $2, $3, $4, $5, $6)
           RETURNING *"#,
    )
    .bind(new.name.trim())
    .bind(new.description.as_deref())
    .bind(new.price)
    .bind(new.gateway_plan_id.as_deref())
    .bind(new.gateway_product_id.as_deref())
    .bind(new.franchise_id)
    .fetch_one(pool)
    .await
}

pub async fn update(pool: &PgPool, id: Uuid, changes: &PlanUpdate) -> Result<Option<Plan>, sqlx::Error> {
    sqlx::query_as::<_, Plan>(
        r#"UPDATE plans SET
               name = COALESCE($2, name),
               description = COALESCE($3, description),
               price = COALESCE($4, price),
               gateway_plan_id = COALESCE($5, gateway_plan_id),
               gateway_product_id = COALESCE($6, gateway_product_id),
               active = COALESCE($7, active),
               updated_at = NOW()
           WHERE id = $1
           RETURNING *"#,
    )
    .bind(id)
    .bind(changes.name.as_deref().map(str::trim))
    .bind(changes.description.as_deref())
    .bind(changes.price)
    .bind(changes.gateway_plan_id.as_deref())
    .bind(changes.gateway_product_id.as_deref())
    .bind(changes.active)
    .fetch_optional(pool)
    .await
}

pub async fn deactivate(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE plans SET active = false, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() == 1)
}
