// src/services/registry_sync.rs

use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Beneficiary, BeneficiaryStatus, PaymentStatus};
use crate::registry::{CancellationNotice, EnrollmentNotice};
use crate::services::notifications;
use crate::{AppState, db};

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SyncOutcome {
    Sent { protocol: Option<String> },
    Failed { error: String, attempts: i32 },
    Skipped { reason: String },
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct RetrySummary {
    pub attempted: usize,
    pub sent: usize,
    pub failed: usize,
}

/// Reports the enrollment of a paid beneficiary to the registry and records
/// the result on the row. A failure is stored, never returned as an error.
/// At most one notice is in flight per beneficiary.
pub async fn send_enrollment(state: &AppState, beneficiary_id: Uuid) -> AppResult<SyncOutcome> {
    let pool = &state.pool;
    let beneficiary = db::beneficiaries::get(pool, beneficiary_id, None)
        .await?
        .ok_or_else(|| AppError::NotFound("beneficiary not found".to_string()))?;

    match beneficiary.status {
        BeneficiaryStatus::Inactive => {
            return Ok(SyncOutcome::Skipped { reason: "beneficiary is inactive".to_string() });
        }
        BeneficiaryStatus::SentToRegistry => {
            return Ok(SyncOutcome::Skipped { reason: "already sent".to_string() });
        }
        _ => {}
    }
    if beneficiary.payment_status != PaymentStatus::Paid {
        return Err(AppError::Validation("payment is not confirmed yet".to_string()));
    }

    let notice = enrollment_notice(state, &beneficiary).await?;
    // Only the caller that wins the claim talks to the registry.
    let Some(beneficiary) = db::beneficiaries::claim_registry_send(pool, beneficiary.id).await? else {
        log::info!("registry enrollment beneficiary_id={beneficiary_id} already sent or in flight");
        return Ok(SyncOutcome::Skipped { reason: "already sent or in progress".to_string() });
    };

    match state.registry.notify_enrollment(&notice).await {
        Ok(protocol) => {
            db::beneficiaries::record_registry_success(pool, beneficiary.id, protocol.as_deref()).await?;
            log::info!(
                "registry enrollment sent beneficiary_id={} protocol={:?}",
                beneficiary.id,
                protocol
            );
            Ok(SyncOutcome::Sent { protocol })
        }
        Err(e) => {
            let error = e.to_string();
            let attempts = db::beneficiaries::record_registry_failure(pool, beneficiary.id, &error).await?;
            log::warn!(
                "registry enrollment failed beneficiary_id={} attempts={attempts}: {error}",
                beneficiary.id
            );
            notifications::notify_headquarters_quietly(
                pool,
                "Falha no envio ao RMS",
                &format!("Adesão de {} não foi registrada: {error}", beneficiary.name),
                Some(&notifications::beneficiary_link(beneficiary.id)),
            )
            .await;
            Ok(SyncOutcome::Failed { error, attempts })
        }
    }
}

async fn enrollment_notice(state: &AppState, beneficiary: &Beneficiary) -> AppResult<EnrollmentNotice> {
    let plan = db::plans::get(&state.pool, beneficiary.plan_id)
        .await?
        .ok_or_else(|| AppError::NotFound("plan not found".to_string()))?;
    let unit = db::units::get(&state.pool, beneficiary.unit_id)
        .await?
        .ok_or_else(|| AppError::NotFound("unit not found".to_string()))?;

    Ok(EnrollmentNotice {
        codigo_externo: beneficiary.id.to_string(),
        cpf: beneficiary.cpf.clone(),
        nome: beneficiary.name.clone(),
        email: beneficiary.email.clone(),
        telefone: beneficiary.phone.clone(),
        data_nascimento: beneficiary.birth_date,
        plano: plan.name,
        unidade: unit.name,
        data_adesao: beneficiary.created_at.date_naive(),
    })
}

/// Cancellation notice for a beneficiary the registry already knows about.
/// Returns `false` when the enrollment was never reported, so nothing was sent.
pub async fn send_cancellation(
    state: &AppState,
    beneficiary: &Beneficiary,
    reason: &str,
) -> AppResult<bool> {
    if beneficiary.registry_sent_at.is_none() {
        return Ok(false);
    }
    let notice = CancellationNotice {
        codigo_externo: beneficiary.id.to_string(),
        cpf: beneficiary.cpf.clone(),
        motivo: reason.to_string(),
        data_cancelamento: Utc::now().date_naive(),
    };
    let protocol = state.registry.notify_cancellation(&notice).await?;
    log::info!(
        "registry cancellation sent beneficiary_id={} protocol={:?}",
        beneficiary.id,
        protocol
    );
    Ok(true)
}

/// Re-sends failed or stuck enrollments, oldest first.
pub async fn retry_failed(state: &AppState, limit: i64) -> AppResult<RetrySummary> {
    let pending = db::beneficiaries::pending_registry(
        &state.pool,
        state.config.registry.max_attempts,
        limit,
    )
    .await?;

    let mut summary = RetrySummary::default();
    for beneficiary in pending {
        summary.attempted += 1;
        match send_enrollment(state, beneficiary.id).await {
            Ok(SyncOutcome::Sent { .. }) => summary.sent += 1,
            Ok(SyncOutcome::Failed { .. }) => summary.failed += 1,
            Ok(SyncOutcome::Skipped { .. }) => {}
            Err(e) => {
                summary.failed += 1;
                log::error!("registry retry beneficiary_id={} error: {e}", beneficiary.id);
            }
        }
    }
    Ok(summary)
}
