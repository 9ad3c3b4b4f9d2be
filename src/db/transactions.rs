// src/db/transactions.rs

use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::models::{PaymentMethod, Transaction, TransactionStatus};

/// First transaction of a bill, written by the checkout. A bill the gateway
/// already reports as paid is stored as `succeeded`.
pub async fn insert(
    executor: impl PgExecutor<'_>,
    beneficiary_id: Uuid,
    gateway_bill_id: &str,
    amount: Decimal,
    status: TransactionStatus,
    payment_method: PaymentMethod,
    gateway_response: Value,
) -> Result<Transaction, sqlx::Error> {
    sqlx::query_as::<_, Transaction>(
        r#"INSERT INTO transactions
               (beneficiary_id, gateway_bill_id, amount, status, payment_method, gateway_response, paid_at)
           VALUES ($1, $2, $3, $4, $5, $6, CASE WHEN $4 = 'succeeded' THEN NOW() END)
           RETURNING *"#,
    )
    .bind(beneficiary_id)
    .bind(gateway_bill_id)
    .bind(amount)
    .bind(status)
    .bind(payment_method)
    .bind(gateway_response)
    .fetch_one(executor)
    .await
}

/// Records the webhook outcome on the transaction of `gateway_bill_id`, creating it
/// for bills the checkout never saw (renewals). The snapshot is merged, not replaced.
pub async fn upsert_status(
    executor: impl PgExecutor<'_>,
    beneficiary_id: Uuid,
    gateway_bill_id: &str,
    amount: Decimal,
    payment_method: PaymentMethod,
    status: TransactionStatus,
    snapshot: Value,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO transactions
               (beneficiary_id, gateway_bill_id, amount, status, payment_method, gateway_response, paid_at)
           VALUES ($1, $2, $3, $4, $5, $6, CASE WHEN $4 = 'succeeded' THEN NOW() END)
           ON CONFLICT (gateway_bill_id) DO UPDATE SET
               status = EXCLUDED.status,
               gateway_response = transactions.gateway_response || EXCLUDED.gateway_response,
               paid_at = COALESCE(transactions.paid_at, EXCLUDED.paid_at)"#,
    )
    .bind(beneficiary_id)
    .bind(gateway_bill_id)
    .bind(amount)
    .bind(status)
    .bind(payment_method)
    .bind(snapshot)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn for_beneficiary(pool: &PgPool, beneficiary_id: Uuid) -> Result<Vec<Transaction>, sqlx::Error> {
    sqlx::query_as::<_, Transaction>(
        r#"SELECT * FROM transactions
           WHERE beneficiary_id = $1
           ORDER BY created_at DESC"#,
    )
    .bind(beneficiary_id)
    .fetch_all(pool)
    .await
}
