// src/db/commissions.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::models::{Commission, PageParams};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommissionFilter {
    pub unit_id: Option<Uuid>,
    pub reference_month: Option<NaiveDate>,
    pub paid: Option<bool>,
}

/// One paid beneficiary with what is needed to price its commission.
#[derive(Debug, Clone, FromRow)]
pub struct CommissionBasis {
    pub beneficiary_id: Uuid,
    pub unit_id: Uuid,
    pub plan_price: Decimal,
    pub commission_rate: Decimal,
}

pub async fn list(
    pool: &PgPool,
    unit_scope: Option<Uuid>,
    filter: &CommissionFilter,
    page: &PageParams,
) -> Result<Vec<Commission>, sqlx::Error> {
    sqlx::query_as::<_, Commission>(
        r#"SELECT * FROM commissions
           WHERE ($1::uuid IS NULL OR unit_id = $1)
             AND ($2::date IS NULL OR reference_month = $2)
             AND ($3::bool IS NULL OR paid = $3)
           ORDER BY reference_month DESC, created_at DESC
           LIMIT $4 OFFSET $5"#,
    )
    .bind(unit_scope.or(filter.unit_id))
    .bind(filter.reference_month)
    .bind(filter.paid)
    .bind(page.per_page())
    .bind(page.offset())
    .fetch_all(pool)
    .await
}

/// Paid, not cancelled beneficiaries enrolled before the end of `month_end`.
pub async fn basis_for_month(
    pool: &PgPool,
    month_end: NaiveDate,
) -> Result<Vec<CommissionBasis>, sqlx::Error> {
    sqlx::query_as::<_, CommissionBasis>(
        r#"SELECT b.id AS beneficiary_id, b.unit_id, p.price AS plan_price, u.commission_rate
           FROM beneficiaries b
           JOIN plans p ON p.id = b.plan_id
           JOIN units u ON u.id = b.unit_id
           WHERE b.payment_status = 'paid'
             AND b.status <> 'inactive'
             AND b.created_at::date <= $1"#,
    )
    .bind(month_end)
    .fetch_all(pool)
    .await
}

/// Returns `false` when the commission for that month already existed.
pub async fn insert_once(
    pool: &PgPool,
    beneficiary_id: Uuid,
    unit_id: Uuid,
    reference_month: NaiveDate,
    amount: Decimal,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"INSERT INTO commissions (beneficiary_id, unit_id, reference_month, amount)
           VALUES ($1, $2, $3, $4)
           ON CONFLICT (beneficiary_id, reference_month) DO NOTHING"#,
    )
    .bind(beneficiary_id)
    .bind(unit_id)
    .bind(reference_month)
    .bind(amount)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn mark_paid(pool: &PgPool, id: Uuid) -> Result<Option<Commission>, sqlx::Error> {
    sqlx::query_as::<_, Commission>(
        r#"UPDATE commissions SET paid = true, paid_at = COALESCE(paid_at, NOW())
           WHERE id = $1
           RETURNING *"#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}
