// src/services/contracts.rs

use serde_json::{Value, json};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::esign::Signer;
use crate::models::{Beneficiary, ContractStatus};
use crate::services::notifications;
use crate::validation::format_cpf;
use crate::{AppState, db};

/// Creates the e-signature document for a beneficiary and stores the signing link.
/// An existing pending or signed contract is returned untouched.
pub async fn generate(state: &AppState, beneficiary_id: Uuid) -> AppResult<Beneficiary> {
    let pool = &state.pool;
    let beneficiary = db::beneficiaries::get(pool, beneficiary_id, None)
        .await?
        .ok_or_else(|| AppError::NotFound("beneficiary not found".to_string()))?;

    if beneficiary.contract_document_id.is_some()
        && matches!(
            beneficiary.contract_status,
            ContractStatus::PendingSignature | ContractStatus::Signed
        )
    {
        return Ok(beneficiary);
    }

    let plan = db::plans::get(pool, beneficiary.plan_id)
        .await?
        .ok_or_else(|| AppError::NotFound("plan not found".to_string()))?;

    let signer = Signer {
        name: beneficiary.name.clone(),
        email: beneficiary.email.clone(),
        cpf: beneficiary.cpf.clone(),
    };
    let data = json!({
        "nome": beneficiary.name,
        "cpf": format_cpf(&beneficiary.cpf),
        "email": beneficiary.email,
        "plano": plan.name,
        "valor": plan.price,
        "data_adesao": beneficiary.created_at.date_naive(),
    });

    match state.esign.create_document(&beneficiary.id.to_string(), signer, data).await {
        Ok(document) => {
            let link = document.link();
            db::beneficiaries::set_contract(
                pool,
                beneficiary.id,
                ContractStatus::PendingSignature,
                Some(&document.id),
                link.as_deref(),
            )
            .await?;
            log::info!(
                "contract created beneficiary_id={} document_id={}",
                beneficiary.id,
                document.id
            );
            db::beneficiaries::get(pool, beneficiary.id, None)
                .await?
                .ok_or_else(|| AppError::NotFound("beneficiary not found".to_string()))
        }
        Err(e) => {
            db::beneficiaries::set_contract(pool, beneficiary.id, ContractStatus::Failed, None, None).await?;
            notifications::notify_unit_quietly(
                pool,
                beneficiary.unit_id,
                "Falha ao gerar contrato",
                &format!("O contrato de {} não pôde ser gerado: {e}", beneficiary.name),
                Some(&notifications::beneficiary_link(beneficiary.id)),
            )
            .await;
            Err(e.into())
        }
    }
}

/// Contract generation after checkout. Runs detached; errors are only logged.
pub fn spawn_generation(state: AppState, beneficiary_id: Uuid) {
    tokio::spawn(async move {
        if let Err(e) = generate(&state, beneficiary_id).await {
            log::warn!("contract generation failed beneficiary_id={beneficiary_id}: {e}");
        }
    });
}

/// Maps a provider status to the contract status it implies, if any.
pub fn contract_status_for(provider_status: &str) -> Option<ContractStatus> {
    match provider_status.trim().to_ascii_lowercase().as_str() {
        "signed" | "completed" | "closed" | "document_signed" | "document_completed" => {
            Some(ContractStatus::Signed)
        }
        "refused" | "rejected" | "canceled" | "cancelled" | "expired" | "document_refused" => {
            Some(ContractStatus::Failed)
        }
        _ => None,
    }
}

/// Pulls `(document_id, status)` out of an e-signature callback.
/// Accepts `{ "document": { "id", "status" } }` or flat `document_id`/`event` keys.
pub fn parse_callback(payload: &Value) -> Option<(String, String)> {
    let document = payload.get("document").unwrap_or(payload);
    let id = document
        .get("id")
        .or_else(|| payload.get("document_id"))
        .and_then(|v| match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })?;
    let status = document
        .get("status")
        .or_else(|| payload.get("status"))
        .or_else(|| payload.get("event"))
        .and_then(Value::as_str)?
        .to_string();
    Some((id, status))
}

/// Applies a callback; returns the beneficiary whose contract changed.
pub async fn apply_callback(state: &AppState, document_id: &str, provider_status: &str) -> AppResult<Option<Uuid>> {
    let Some(status) = contract_status_for(provider_status) else {
        log::info!("esign callback ignored document_id={document_id} status={provider_status}");
        return Ok(None);
    };

    let updated = db::beneficiaries::set_contract_by_document(&state.pool, document_id, status).await?;
    match updated {
        Some(beneficiary_id) => {
            log::info!("contract {status} beneficiary_id={beneficiary_id} document_id={document_id}");
            if status == ContractStatus::Failed {
                if let Some(b) = db::beneficiaries::get(&state.pool, beneficiary_id, None).await? {
                    notifications::notify_unit_quietly(
                        &state.pool,
                        b.unit_id,
                        "Contrato recusado",
                        &format!("O contrato de {} foi recusado ou expirou", b.name),
                        Some(&notifications::beneficiary_link(b.id)),
                    )
                    .await;
                }
            }
        }
        None => log::warn!("esign callback for unknown document_id={document_id}"),
    }
    Ok(updated)
}

/// Re-reads the document from the provider and stores its current status.
pub async fn refresh(state: &AppState, beneficiary_id: Uuid) -> AppResult<Beneficiary> {
    let beneficiary = db::beneficiaries::get(&state.pool, beneficiary_id, None)
        .await?
        .ok_or_else(|| AppError::NotFound("beneficiary not found".to_string()))?;
    let Some(document_id) = beneficiary.contract_document_id.clone() else {
        return Ok(beneficiary);
    };

    let document = state.esign.get_document(&document_id).await?;
    let status = if document.is_signed() {
        ContractStatus::Signed
    } else if document.is_refused() {
        ContractStatus::Failed
    } else {
        ContractStatus::PendingSignature
    };
    let link = document.link();
    db::beneficiaries::set_contract(&state.pool, beneficiary.id, status, Some(&document.id), link.as_deref())
        .await?;

    db::beneficiaries::get(&state.pool, beneficiary.id, None)
        .await?
        .ok_or_else(|| AppError::NotFound("beneficiary not found".to_string()))
}
