// src/api/webhooks.rs
//
// Public callbacks. Both endpoints take the raw body so the HMAC signature is
// checked over exactly the bytes that were sent.

use actix_web::{HttpRequest, HttpResponse, post, web};
use serde::Deserialize;

use crate::api::auth::AuthUser;
use crate::api::registry::BatchQuery;
use crate::api::response::ApiResponse;
use crate::error::{AppError, AppResult};
use crate::gateway::webhook::{token_matches, verify_signature};
use crate::services::webhooks::{self, WebhookAck};
use crate::AppState;

pub const TOKEN_HEADER: &str = "X-Webhook-Token";
pub const SIGNATURE_HEADER: &str = "X-Signature";

#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

fn header<'a>(req: &'a HttpRequest, name: &str) -> Option<&'a str> {
    req.headers().get(name).and_then(|v| v.to_str().ok()).map(str::trim)
}

/// Accepts the shared secret as a header or `?token=`, or an HMAC-SHA256 of the body.
pub fn authorize(req: &HttpRequest, query_token: Option<&str>, body: &[u8], secret: Option<&str>) -> AppResult<()> {
    let secret = secret.ok_or_else(|| AppError::Configuration("webhook secret is not set".to_string()))?;

    let token = header(req, TOKEN_HEADER).or(query_token);
    if token.is_some_and(|t| token_matches(secret, t)) {
        return Ok(());
    }
    if let Some(signature) = header(req, SIGNATURE_HEADER) {
        if verify_signature(secret, body, signature) {
            return Ok(());
        }
    }
    Err(AppError::Unauthorized("invalid webhook credentials".to_string()))
}

#[utoipa::path(
    post,
    path = "/webhooks/gateway",
    request_body(content = String, description = "Gateway event, JSON or form-encoded"),
    params(("token" = Option<String>, Query, description = "Shared secret, if not sent as a header")),
    responses(
        (status = 200, description = "Stored; outcome is processed, duplicate, in_progress or ignored", body = WebhookAck),
        (status = 401, description = "Bad token or signature")
    ),
    tag = "webhooks"
)]
#[post("/webhooks/gateway")]
pub async fn gateway_webhook(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<TokenQuery>,
    body: web::Bytes,
) -> AppResult<HttpResponse> {
    authorize(
        &req,
        query.token.as_deref(),
        &body,
        state.config.gateway.webhook_secret.as_deref(),
    )?;
    let ack = webhooks::ingest(&state, &body).await?;
    Ok(ApiResponse::ok(ack))
}

#[post("/webhooks/esign")]
pub async fn esign_webhook(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<TokenQuery>,
    body: web::Bytes,
) -> AppResult<HttpResponse> {
    authorize(
        &req,
        query.token.as_deref(),
        &body,
        state.config.esign.webhook_secret.as_deref(),
    )?;
    let beneficiary_id = webhooks::ingest_esign(&state, &body).await?;
    Ok(ApiResponse::ok(serde_json::json!({
        "updated": beneficiary_id.is_some(),
        "beneficiary_id": beneficiary_id,
    })))
}

/// Re-applies stored gateway events that never finished processing.
#[post("/webhooks/reprocess")]
pub async fn reprocess(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    query: web::Query<BatchQuery>,
) -> AppResult<HttpResponse> {
    user.require_headquarters()?;
    let limit = query.limit.unwrap_or(state.config.reconcile_batch_size).clamp(1, 500);
    let summary = webhooks::reprocess_pending(&state, limit).await?;
    Ok(ApiResponse::ok(summary))
}
