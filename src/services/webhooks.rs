// src/services/webhooks.rs
//
// Gateway webhook processing. Every delivery is stored first; effects are
// applied only by the caller that wins the claim on the stored event, inside
// one DB transaction with the beneficiary row locked. Calls to other
// services (registry, notifications) run after that transaction commits.

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::gateway::webhook::{NormalizedEvent, WebhookKind, normalize_payload, parse_webhook_body};
use crate::models::{Beneficiary, BeneficiaryStatus, PaymentMethod, PaymentStatus, TransactionStatus};
use crate::services::cancellation::{GATEWAY_CANCEL_REASON, cancel_locked};
use crate::services::{notifications, registry_sync};
use crate::{AppState, db};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    /// Effects applied (or the event type has none).
    Processed,
    /// Already processed earlier; nothing done.
    Duplicate,
    /// Another delivery holds the claim right now.
    InProgress,
    /// Stored, but it refers to no beneficiary yet. The event stays pending
    /// so a later delivery or the worker can apply it.
    Ignored,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WebhookAck {
    pub event_id: String,
    pub event_type: String,
    pub outcome: WebhookOutcome,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct ReprocessSummary {
    pub attempted: usize,
    pub processed: usize,
    /// Still matching no beneficiary.
    pub unmatched: usize,
    pub failed: usize,
}

/// Recorded on events left pending because no beneficiary matched.
const UNMATCHED_ERROR: &str = "no beneficiary matches the gateway references";

/// What has to happen once the transaction is committed.
enum FollowUp {
    None,
    Paid(Beneficiary),
    PaymentFailed(Beneficiary),
    Refunded(Beneficiary),
    Cancelled(Beneficiary),
}

enum Resolution {
    /// Effects and the processed flag were committed together.
    Applied(FollowUp),
    Unmatched,
}

/// Entry point for a raw delivery: parse, store, then process.
pub async fn ingest(state: &AppState, body: &[u8]) -> AppResult<WebhookAck> {
    let raw = parse_webhook_body(body).map_err(AppError::Validation)?;
    let event = normalize_payload(raw, body);

    let inserted =
        db::webhook_events::insert_if_absent(&state.pool, &event.event_id, &event.event_type, &event.raw).await?;
    log::info!(
        "gateway webhook event_id={} type={} new={inserted}",
        event.event_id,
        event.event_type
    );

    let outcome = process_event(state, &event).await?;
    Ok(WebhookAck {
        event_id: event.event_id,
        event_type: event.event_type,
        outcome,
    })
}

/// Claims the stored event and applies it. Safe to call concurrently and repeatedly.
pub async fn process_event(state: &AppState, event: &NormalizedEvent) -> AppResult<WebhookOutcome> {
    let pool = &state.pool;
    let Some(claimed) = db::webhook_events::claim(pool, &event.event_id).await? else {
        let processed = db::webhook_events::get_by_event_id(pool, &event.event_id)
            .await?
            .is_some_and(|e| e.processed);
        return Ok(if processed {
            WebhookOutcome::Duplicate
        } else {
            WebhookOutcome::InProgress
        });
    };

    let resolution = match apply(state, event, claimed.id).await {
        Ok(resolution) => resolution,
        Err(e) => {
            log::error!("webhook event_id={} failed: {e}", event.event_id);
            db::webhook_events::mark_failed(pool, claimed.id, &e.to_string()).await?;
            return Err(e);
        }
    };

    match resolution {
        Resolution::Applied(follow_up) => {
            run_follow_up(state, follow_up).await;
            Ok(WebhookOutcome::Processed)
        }
        Resolution::Unmatched => {
            db::webhook_events::mark_failed(pool, claimed.id, UNMATCHED_ERROR).await?;
            Ok(WebhookOutcome::Ignored)
        }
    }
}

fn event_amount(event: &NormalizedEvent) -> Option<Decimal> {
    event.amount.as_deref().and_then(|a| Decimal::from_str(a.trim()).ok())
}

fn snapshot(event: &NormalizedEvent) -> serde_json::Value {
    json!({
        "last_event_id": event.event_id,
        "last_event_type": event.event_type,
        "bill_status": event.bill_status,
        "gateway_message": event.gateway_message,
    })
}

async fn apply(state: &AppState, event: &NormalizedEvent, stored_id: Uuid) -> AppResult<Resolution> {
    if matches!(event.kind, WebhookKind::Test | WebhookKind::Other(_)) {
        log::info!("webhook type={} has no effect", event.event_type);
        db::webhook_events::mark_processed(&state.pool, stored_id).await?;
        return Ok(Resolution::Applied(FollowUp::None));
    }

    let mut tx = state.pool.begin().await?;
    let Some(beneficiary) = db::beneficiaries::lock_by_gateway_refs(
        &mut tx,
        event.subscription_id.as_deref(),
        event.bill_id.as_deref(),
        event.customer_id.as_deref(),
    )
    .await?
    else {
        log::warn!(
            "webhook event_id={} refers to no beneficiary yet (subscription={:?} bill={:?})",
            event.event_id,
            event.subscription_id,
            event.bill_id
        );
        return Ok(Resolution::Unmatched);
    };

    let transaction_status = match event.kind {
        WebhookKind::BillPaid => Some(TransactionStatus::Succeeded),
        WebhookKind::PaymentFailed => Some(TransactionStatus::Failed),
        WebhookKind::ChargeRefunded => Some(TransactionStatus::Refunded),
        _ => None,
    };
    if let (Some(status), Some(bill_id)) = (transaction_status, event.bill_id.as_deref()) {
        let amount = match event_amount(event) {
            Some(amount) => amount,
            None => db::plans::get(&mut *tx, beneficiary.plan_id)
                .await?
                .map(|p| p.price)
                .unwrap_or(Decimal::ZERO),
        };
        db::transactions::upsert_status(
            &mut *tx,
            beneficiary.id,
            bill_id,
            amount,
            beneficiary.payment_method.unwrap_or(PaymentMethod::CreditCard),
            status,
            snapshot(event),
        )
        .await?;
    }

    let follow_up = match event.kind {
        WebhookKind::BillPaid => {
            if db::beneficiaries::mark_paid(&mut *tx, beneficiary.id).await? {
                FollowUp::Paid(beneficiary)
            } else {
                log::info!("beneficiary_id={} already paid or inactive", beneficiary.id);
                FollowUp::None
            }
        }
        WebhookKind::PaymentFailed => {
            if beneficiary.payment_status == PaymentStatus::Paid {
                FollowUp::None
            } else {
                db::beneficiaries::set_payment_state(&mut *tx, beneficiary.id, PaymentStatus::Failed, None)
                    .await?;
                FollowUp::PaymentFailed(beneficiary)
            }
        }
        WebhookKind::ChargeRefunded => {
            db::beneficiaries::set_payment_state(&mut *tx, beneficiary.id, PaymentStatus::Refunded, None)
                .await?;
            FollowUp::Refunded(beneficiary)
        }
        WebhookKind::SubscriptionCanceled => {
            let cancelled = cancel_locked(&mut tx, &beneficiary, GATEWAY_CANCEL_REASON, None).await?;
            let status = cancelled.as_ref().map(|_| BeneficiaryStatus::Inactive);
            db::beneficiaries::set_payment_state(&mut *tx, beneficiary.id, PaymentStatus::Canceled, status)
                .await?;
            match cancelled {
                Some(_) => FollowUp::Cancelled(beneficiary),
                None => FollowUp::None,
            }
        }
        WebhookKind::Test | WebhookKind::Other(_) => FollowUp::None,
    };

    db::webhook_events::mark_processed(&mut *tx, stored_id).await?;
    tx.commit().await?;
    Ok(Resolution::Applied(follow_up))
}

async fn run_follow_up(state: &AppState, follow_up: FollowUp) {
    let pool = &state.pool;
    match follow_up {
        FollowUp::None => {}
        FollowUp::Paid(b) => after_payment_confirmed(state, &b).await,
        FollowUp::PaymentFailed(b) => {
            notifications::notify_unit_quietly(
                pool,
                b.unit_id,
                "Falha no pagamento",
                &format!("O pagamento de {} não foi aprovado", b.name),
                Some(&notifications::beneficiary_link(b.id)),
            )
            .await;
        }
        FollowUp::Refunded(b) => {
            notifications::notify_unit_quietly(
                pool,
                b.unit_id,
                "Pagamento estornado",
                &format!("O pagamento de {} foi estornado", b.name),
                Some(&notifications::beneficiary_link(b.id)),
            )
            .await;
        }
        FollowUp::Cancelled(b) => {
            if let Err(e) = registry_sync::send_cancellation(state, &b, GATEWAY_CANCEL_REASON).await {
                log::warn!("registry cancellation failed beneficiary_id={}: {e}", b.id);
            }
            notifications::notify_unit_quietly(
                pool,
                b.unit_id,
                "Assinatura cancelada",
                &format!("A assinatura de {} foi cancelada no gateway", b.name),
                Some(&notifications::beneficiary_link(b.id)),
            )
            .await;
        }
    }
}

/// Tells the unit and reports the enrollment to the registry once a
/// beneficiary has just moved to paid.
pub async fn after_payment_confirmed(state: &AppState, b: &Beneficiary) {
    log::info!("payment confirmed beneficiary_id={}", b.id);
    notifications::notify_unit_quietly(
        &state.pool,
        b.unit_id,
        "Pagamento confirmado",
        &format!("O pagamento de {} foi confirmado", b.name),
        Some(&notifications::beneficiary_link(b.id)),
    )
    .await;
    match registry_sync::send_enrollment(state, b.id).await {
        Ok(outcome) => log::info!("registry enrollment beneficiary_id={}: {outcome:?}", b.id),
        Err(e) => log::error!("registry enrollment beneficiary_id={} error: {e}", b.id),
    }
}

/// Re-applies stored events that were never processed: failed, abandoned, or
/// received before their beneficiary existed.
pub async fn reprocess_pending(state: &AppState, limit: i64) -> AppResult<ReprocessSummary> {
    let events =
        db::webhook_events::list_unprocessed(&state.pool, state.config.registry.max_attempts, limit).await?;

    let mut summary = ReprocessSummary::default();
    for stored in events {
        summary.attempted += 1;
        let body = serde_json::to_vec(&stored.payload).unwrap_or_default();
        let mut event = normalize_payload(stored.payload.clone(), &body);
        event.event_id = stored.event_id.clone();

        match process_event(state, &event).await {
            Ok(WebhookOutcome::Processed | WebhookOutcome::Duplicate) => summary.processed += 1,
            Ok(WebhookOutcome::Ignored) => summary.unmatched += 1,
            Ok(WebhookOutcome::InProgress) => {}
            Err(e) => {
                summary.failed += 1;
                log::warn!("reprocess event_id={} failed: {e}", stored.event_id);
            }
        }
    }
    Ok(summary)
}

/// Applies an e-signature callback body.
pub async fn ingest_esign(state: &AppState, body: &[u8]) -> AppResult<Option<Uuid>> {
    let payload = parse_webhook_body(body).map_err(AppError::Validation)?;
    let (document_id, status) = crate::services::contracts::parse_callback(&payload)
        .ok_or_else(|| AppError::Validation("missing document id or status".to_string()))?;
    crate::services::contracts::apply_callback(state, &document_id, &status).await
}
