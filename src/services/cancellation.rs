// src/services/cancellation.rs

use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Beneficiary, BeneficiaryStatus, Cancellation};
use crate::services::{notifications, registry_sync};
use crate::{AppState, db};

pub const GATEWAY_CANCEL_REASON: &str = "gateway: subscription canceled";

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CancelRequest {
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CancellationOutcome {
    pub cancellation: Cancellation,
    pub beneficiary: Beneficiary,
    /// Secondary steps that failed after the local cancellation was committed.
    pub warnings: Vec<String>,
}

/// Inserts the cancellation row and moves the (already locked) beneficiary to
/// `inactive`. Returns `None` when it was cancelled before.
pub(crate) async fn cancel_locked(
    conn: &mut PgConnection,
    beneficiary: &Beneficiary,
    reason: &str,
    cancelled_by: Option<Uuid>,
) -> Result<Option<Cancellation>, sqlx::Error> {
    if beneficiary.status == BeneficiaryStatus::Inactive {
        return Ok(None);
    }
    let Some(row) = db::cancellations::insert_once(&mut *conn, beneficiary.id, reason, cancelled_by).await? else {
        return Ok(None);
    };
    db::beneficiaries::set_status(&mut *conn, beneficiary.id, BeneficiaryStatus::Inactive).await?;
    Ok(Some(row))
}

/// Operator cancellation. The local state is authoritative: once committed,
/// gateway and registry follow-ups are best effort and reported as warnings.
pub async fn cancel(
    state: &AppState,
    beneficiary_id: Uuid,
    unit_scope: Option<Uuid>,
    reason: &str,
    cancelled_by: Option<Uuid>,
) -> AppResult<CancellationOutcome> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(AppError::Validation("Motivo do cancelamento é obrigatório".to_string()));
    }

    let mut tx = state.pool.begin().await?;
    let beneficiary = db::beneficiaries::lock(&mut tx, beneficiary_id)
        .await?
        .filter(|b| unit_scope.is_none_or(|unit| b.unit_id == unit))
        .ok_or_else(|| AppError::NotFound("beneficiary not found".to_string()))?;

    let cancellation = cancel_locked(&mut tx, &beneficiary, reason, cancelled_by)
        .await?
        .ok_or_else(|| AppError::Conflict("beneficiary is already cancelled".to_string()))?;
    tx.commit().await?;
    log::info!("beneficiary cancelled id={} by={:?}", beneficiary.id, cancelled_by);

    let mut warnings = Vec::new();

    if let Some(subscription_id) = beneficiary.gateway_subscription_id.as_deref() {
        if let Err(e) = state.gateway.cancel_subscription(subscription_id).await {
            log::warn!("gateway cancel failed subscription_id={subscription_id}: {e}");
            warnings.push(format!("gateway subscription {subscription_id} was not cancelled: {e}"));
        }
    }

    if let Err(e) = registry_sync::send_cancellation(state, &beneficiary, reason).await {
        log::warn!("registry cancellation failed beneficiary_id={}: {e}", beneficiary.id);
        warnings.push(format!("registry was not notified: {e}"));
    }

    notifications::notify_unit_quietly(
        &state.pool,
        beneficiary.unit_id,
        "Beneficiário cancelado",
        &format!("{}: {reason}", beneficiary.name),
        Some(&notifications::beneficiary_link(beneficiary.id)),
    )
    .await;

    let beneficiary = db::beneficiaries::get(&state.pool, beneficiary.id, None)
        .await?
        .ok_or_else(|| AppError::NotFound("beneficiary not found".to_string()))?;

    Ok(CancellationOutcome {
        cancellation,
        beneficiary,
        warnings,
    })
}
