// src/db/beneficiaries.rs

use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::{PgConnection, PgExecutor, PgPool, Postgres, QueryBuilder};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{
    Beneficiary, BeneficiaryStatus, ContractStatus, PageParams, PaymentMethod, PaymentStatus,
};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewBeneficiary {
    pub name: String,
    pub cpf: String,
    pub email: String,
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub plan_id: Uuid,
    /// Ignored for unit operators, who always enroll into their own unit.
    pub unit_id: Option<Uuid>,
    pub zip_code: Option<String>,
    pub street: Option<String>,
    pub number: Option<String>,
    pub complement: Option<String>,
    pub neighborhood: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct BeneficiaryUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub plan_id: Option<Uuid>,
    pub zip_code: Option<String>,
    pub street: Option<String>,
    pub number: Option<String>,
    pub complement: Option<String>,
    pub neighborhood: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BeneficiaryFilter {
    pub status: Option<BeneficiaryStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub unit_id: Option<Uuid>,
    pub search: Option<String>,
}

/// Gateway references and initial state written by the checkout.
#[derive(Debug, Clone)]
pub struct EnrollmentState {
    pub status: BeneficiaryStatus,
    pub payment_method: Option<PaymentMethod>,
    pub gateway_customer_id: Option<String>,
    pub gateway_subscription_id: Option<String>,
    pub gateway_bill_id: Option<String>,
    pub checkout_url: Option<String>,
}

impl Default for EnrollmentState {
    fn default() -> Self {
        Self {
            status: BeneficiaryStatus::Pending,
            payment_method: None,
            gateway_customer_id: None,
            gateway_subscription_id: None,
            gateway_bill_id: None,
            checkout_url: None,
        }
    }
}

fn push_filters(
    qb: &mut QueryBuilder<'_, Postgres>,
    unit_scope: Option<Uuid>,
    filter: &BeneficiaryFilter,
) {
    qb.push(" WHERE 1 = 1");
    if let Some(unit_id) = unit_scope.or(filter.unit_id) {
        qb.push(" AND unit_id = ").push_bind(unit_id);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
    if let Some(payment_status) = filter.payment_status {
        qb.push(" AND payment_status = ").push_bind(payment_status);
    }
    if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = super::like_pattern(search);
        let digits = crate::validation::only_digits(search);
        qb.push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR email ILIKE ")
            .push_bind(pattern);
        if !digits.is_empty() {
            qb.push(" OR cpf LIKE ").push_bind(format!("%{digits}%"));
        }
        qb.push(")");
    }
}

pub async fn list(
    pool: &PgPool,
    unit_scope: Option<Uuid>,
    filter: &BeneficiaryFilter,
    page: &PageParams,
) -> Result<(Vec<Beneficiary>, i64), sqlx::Error> {
    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM beneficiaries");
    push_filters(&mut count, unit_scope, filter);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    let mut select = QueryBuilder::<Postgres>::new("SELECT * FROM beneficiaries");
    push_filters(&mut select, unit_scope, filter);
    select
        .push(" ORDER BY created_at DESC LIMIT ")
        .push_bind(page.per_page())
        .push(" OFFSET ")
        .push_bind(page.offset());
    let rows = select.build_query_as::<Beneficiary>().fetch_all(pool).await?;

    Ok((rows, total))
}

pub async fn get(
    executor: impl PgExecutor<'_>,
    id: Uuid,
    unit_scope: Option<Uuid>,
) -> Result<Option<Beneficiary>, sqlx::Error> {
    sqlx::query_as::<_, Beneficiary>(
        r#"SELECT * FROM beneficiaries
           WHERE id = $1 AND ($2::uuid IS NULL OR unit_id = $2)"#,
    )
    .bind(id)
    .bind(unit_scope)
    .fetch_optional(executor)
    .await
}

pub async fn get_by_cpf(
    executor: impl PgExecutor<'_>,
    cpf: &str,
) -> Result<Option<Beneficiary>, sqlx::Error> {
    sqlx::query_as::<_, Beneficiary>("SELECT * FROM beneficiaries WHERE cpf = $1")
        .bind(crate::validation::only_digits(cpf))
        .fetch_optional(executor)
        .await
}

/// Row lock for status transitions; must run inside a transaction.
pub async fn lock(conn: &mut PgConnection, id: Uuid) -> Result<Option<Beneficiary>, sqlx::Error> {
    sqlx::query_as::<_, Beneficiary>("SELECT * FROM beneficiaries WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(conn)
        .await
}

/// Resolves the beneficiary a gateway event refers to: subscription id first,
/// then the bill id recorded at checkout, then the customer id.
pub async fn lock_by_gateway_refs(
    conn: &mut PgConnection,
    subscription_id: Option<&str>,
    bill_id: Option<&str>,
    customer_id: Option<&str>,
) -> Result<Option<Beneficiary>, sqlx::Error> {
    let by_sub = match subscription_id {
        Some(sub) => {
            sqlx::query_as::<_, Beneficiary>(
                "SELECT * FROM beneficiaries WHERE gateway_subscription_id = $1 FOR UPDATE",
            )
            .bind(sub)
            .fetch_optional(&mut *conn)
            .await?
        }
        None => None,
    };
    if by_sub.is_some() {
        return Ok(by_sub);
    }

    if let Some(bill) = bill_id {
        let found = sqlx::query_as::<_, Beneficiary>(
            r#"SELECT b.* FROM beneficiaries b
               LEFT JOIN transactions t ON t.beneficiary_id = b.id
               WHERE b.gateway_bill_id = $1 OR t.gateway_bill_id = $1
               LIMIT 1
               FOR UPDATE OF b"#,
        )
        .bind(bill)
        .fetch_optional(&mut *conn)
        .await?;
        if found.is_some() {
            return Ok(found);
        }
    }

    match customer_id {
        Some(customer) => {
            sqlx::query_as::<_, Beneficiary>(
                r#"SELECT * FROM beneficiaries
                   WHERE gateway_customer_id = $1
                   ORDER BY created_at DESC
                   LIMIT 1
                   FOR UPDATE"#,
            )
            .bind(customer)
            .fetch_optional(&mut *conn)
            .await
        }
        None => Ok(None),
    }
}

pub async fn insert(
    executor: impl PgExecutor<'_>,
    new: &NewBeneficiary,
    unit_id: Uuid,
    state: &EnrollmentState,
) -> Result<Beneficiary, sqlx::Error> {
    sqlx::query_as::<_, Beneficiary>(
        r#"INSERT INTO beneficiaries
               (unit_id, plan_id, name, cpf, email, phone, birth_date,
                zip_code, street, number, complement, neighborhood, city, state,
                status, payment_method, gateway_customer_id, gateway_subscription_id,
                gateway_bill_id, checkout_url)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                   $15, $16, $17, $18, $19, $20)
           RETURNING *"#,
    )
    .bind(unit_id)
    .bind(new.plan_id)
    .bind(new.name.trim())
    .bind(crate::validation::only_digits(&new.cpf))
    .bind(new.email.trim().to_lowercase())
    .bind(new.phone.as_deref().map(crate::validation::only_digits))
    .bind(new.birth_date)
    .bind(new.zip_code.as_deref().map(crate::validation::only_digits))
    .bind(new.street.as_deref())
    .bind(new.number.as_deref())
    .bind(new.complement.as_deref())
    .bind(new.neighborhood.as_deref())
    .bind(new.city.as_deref())
    .bind(new.state.as_deref())
    .bind(state.status)
    .bind(state.payment_method)
    .bind(state.gateway_customer_id.as_deref())
    .bind(state.gateway_subscription_id.as_deref())
    .bind(state.gateway_bill_id.as_deref())
    .bind(state.checkout_url.as_deref())
    .fetch_one(executor)
    .await
}

pub async fn update(
    pool: &PgPool,
    id: Uuid,
    unit_scope: Option<Uuid>,
    changes: &BeneficiaryUpdate,
) -> Result<Option<Beneficiary>, sqlx::Error> {
    sqlx::query_as::<_, Beneficiary>(
        r#"UPDATE beneficiaries SET
               name = COALESCE($3, name),
               email = COALESCE($4, email),
               phone = COALESCE($5, phone),
               birth_date = COALESCE($6, birth_date),
               plan_id = COALESCE($7, plan_id),
               zip_code = COALESCE($8, zip_code),
               street = COALESCE($9, street),
               number = COALESCE($10, number),
               complement = COALESCE($11, complement),
               neighborhood = COALESCE($12, neighborhood),
               city = COALESCE($13, city),
               state = COALESCE($14, state),
               updated_at = NOW()
           WHERE id = $1 AND ($2::uuid IS NULL OR unit_id = $2)
           RETURNING *"#,
    )
    .bind(id)
    .bind(unit_scope)
    .bind(changes.name.as_deref().map(str::trim))
    .bind(changes.email.as_deref().map(|e| e.trim().to_lowercase()))
    .bind(changes.phone.as_deref().map(crate::validation::only_digits))
    .bind(changes.birth_date)
    .bind(changes.plan_id)
    .bind(changes.zip_code.as_deref().map(crate::validation::only_digits))
    .bind(changes.street.as_deref())
    .bind(changes.number.as_deref())
    .bind(changes.complement.as_deref())
    .bind(changes.neighborhood.as_deref())
    .bind(changes.city.as_deref())
    .bind(changes.state.as_deref())
    .fetch_optional(pool)
    .await
}

pub async fn set_status(
    executor: impl PgExecutor<'_>,
    id: Uuid,
    status: BeneficiaryStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE beneficiaries SET status = $1, updated_at = NOW() WHERE id = $2")
        .bind(status)
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn set_payment_state(
    executor: impl PgExecutor<'_>,
    id: Uuid,
    payment_status: PaymentStatus,
    status: Option<BeneficiaryStatus>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"UPDATE beneficiaries
           SET payment_status = $1, status = COALESCE($2, status), updated_at = NOW()
           WHERE id = $3"#,
    )
    .bind(payment_status)
    .bind(status)
    .bind(id)
    .execute(executor)
    .await?;
    Ok(())
}

/// Moves an unpaid beneficiary to paid/`payment_confirmed`. Returns `false`
/// when it was already paid, so the caller applies follow-up effects once.
pub async fn mark_paid(executor: impl PgExecutor<'_>, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"UPDATE beneficiaries
           SET payment_status = 'paid',
               status = CASE WHEN status IN ('pending', 'pending_payment', 'active')
                             THEN 'payment_confirmed' ELSE status END,
               updated_at = NOW()
           WHERE id = $1 AND payment_status <> 'paid' AND status <> 'inactive'"#,
    )
    .bind(id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Seconds after which an unfinished registry send may be claimed again.
pub const REGISTRY_CLAIM_TIMEOUT_SECS: i64 = 300;

/// Takes the right to send the enrollment notice. Only one concurrent caller
/// gets the row back; the claim is cleared when the result is recorded.
pub async fn claim_registry_send(
    executor: impl PgExecutor<'_>,
    id: Uuid,
) -> Result<Option<Beneficiary>, sqlx::Error> {
    sqlx::query_as::<_, Beneficiary>(
        r#"UPDATE beneficiaries
           SET registry_sending_at = NOW()
           WHERE id = $1
             AND payment_status = 'paid'
             AND status IN ('payment_confirmed', 'registry_failed')
             AND (registry_sending_at IS NULL
                  OR registry_sending_at < NOW() - make_interval(secs => $2))
           RETURNING *"#,
    )
    .bind(id)
    .bind(REGISTRY_CLAIM_TIMEOUT_SECS as f64)
    .fetch_optional(executor)
    .await
}

pub async fn record_registry_success(
    executor: impl PgExecutor<'_>,
    id: Uuid,
    protocol: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"UPDATE beneficiaries
           SET status = 'sent_to_registry', registry_protocol = COALESCE($2, registry_protocol),
               registry_sent_at = NOW(), registry_last_error = NULL, registry_sending_at = NULL,
               registry_attempts = registry_attempts + 1, updated_at = NOW()
           WHERE id = $1 AND status <> 'inactive'"#,
    )
    .bind(id)
    .bind(protocol)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn record_registry_failure(
    executor: impl PgExecutor<'_>,
    id: Uuid,
    error: &str,
) -> Result<i32, sqlx::Error> {
    let attempts: Option<i32> = sqlx::query_scalar(
        r#"UPDATE beneficiaries
           SET status = CASE WHEN status = 'inactive' THEN status ELSE 'registry_failed' END,
               registry_last_error = $2, registry_sending_at = NULL,
               registry_attempts = registry_attempts + 1, updated_at = NOW()
           WHERE id = $1
           RETURNING registry_attempts"#,
    )
    .bind(id)
    .bind(error)
    .fetch_optional(executor)
    .await?;
    Ok(attempts.unwrap_or(0))
}

/// Beneficiaries whose enrollment still has to reach the registry.
pub async fn pending_registry(
    pool: &PgPool,
    max_attempts: i32,
    limit: i64,
) -> Result<Vec<Beneficiary>, sqlx::Error> {
    sqlx::query_as::<_, Beneficiary>(
        r#"SELECT * FROM beneficiaries
           WHERE payment_status = 'paid'
             AND (status = 'registry_failed'
                  OR (status = 'payment_confirmed' AND updated_at < NOW() - INTERVAL '10 minutes'))
             AND registry_attempts < $1
             AND (registry_sending_at IS NULL
                  OR registry_sending_at < NOW() - make_interval(secs => $3))
           ORDER BY updated_at ASC
           LIMIT $2"#,
    )
    .bind(max_attempts)
    .bind(limit)
    .bind(REGISTRY_CLAIM_TIMEOUT_SECS as f64)
    .fetch_all(pool)
    .await
}

pub async fn set_contract(
    executor: impl PgExecutor<'_>,
    id: Uuid,
    status: ContractStatus,
    document_id: Option<&str>,
    signing_url: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"UPDATE beneficiaries
           SET contract_status = $2,
               contract_document_id = COALESCE($3, contract_document_id),
               contract_signing_url = COALESCE($4, contract_signing_url),
               updated_at = NOW()
           WHERE id = $1"#,
    )
    .bind(id)
    .bind(status)
    .bind(document_id)
    .bind(signing_url)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn set_contract_by_document(
    executor: impl PgExecutor<'_>,
    document_id: &str,
    status: ContractStatus,
) -> Result<Option<Uuid>, sqlx::Error> {
    sqlx::query_scalar(
        r#"UPDATE beneficiaries SET contract_status = $2, updated_at = NOW()
           WHERE contract_document_id = $1
           RETURNING id"#,
    )
    .bind(document_id)
    .bind(status)
    .fetch_optional(executor)
    .await
}
