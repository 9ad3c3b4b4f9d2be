// src/api/registry.rs

use actix_web::{HttpResponse, get, post, web};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::AppState;
use crate::api::auth::AuthUser;
use crate::api::response::ApiResponse;
use crate::error::{AppError, AppResult};
use crate::registry::{RegistryPage, RegistryQuery};
use crate::services::registry_sync;
use crate::validation;

#[derive(Debug, Deserialize)]
pub struct RegistryLookup {
    pub cpf: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    #[serde(default)]
    pub offset: i64,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct BatchQuery {
    pub limit: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/api/registry/beneficiaries",
    params(
        ("cpf" = Option<String>, Query),
        ("from" = Option<String>, Query, description = "YYYY-MM-DD"),
        ("to" = Option<String>, Query, description = "YYYY-MM-DD"),
        ("offset" = Option<i64>, Query),
        ("limit" = Option<i64>, Query)
    ),
    responses(
        (status = 200, description = "Registry page", body = RegistryPage),
        (status = 502, description = "Registry unavailable or timed out")
    ),
    security(("bearer" = [])),
    tag = "registry"
)]
#[get("/registry/beneficiaries")]
pub async fn query_registry(
    state: web::Data<AppState>,
    query: web::Query<RegistryLookup>,
) -> AppResult<HttpResponse> {
    let lookup = query.into_inner();
    if let Some(cpf) = lookup.cpf.as_deref() {
        validation::validate_cpf(cpf).map_err(AppError::Validation)?;
    }
    if let (Some(from), Some(to)) = (lookup.from, lookup.to) {
        if from > to {
            return Err(AppError::Validation("from must not be after to".to_string()));
        }
    }

    let page = state
        .registry
        .query_beneficiaries(&RegistryQuery {
            cpf: lookup.cpf,
            from: lookup.from,
            to: lookup.to,
            offset: lookup.offset,
            limit: lookup.limit.unwrap_or(20),
        })
        .await?;
    Ok(ApiResponse::ok(page))
}

/// Re-sends failed enrollments now instead of waiting for the worker.
#[post("/registry/retry")]
pub async fn retry_failed(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    query: web::Query<BatchQuery>,
) -> AppResult<HttpResponse> {
    user.require_headquarters()?;
    let limit = query.limit.unwrap_or(state.config.reconcile_batch_size).clamp(1, 500);
    let summary = registry_sync::retry_failed(&state, limit).await?;
    Ok(ApiResponse::ok(summary))
}
