// src/api/beneficiaries.rs

use actix_web::{HttpResponse, get, post, put, web};
use chrono::Utc;
use uuid::Uuid;

use crate::api::auth::AuthUser;
use crate::api::response::ApiResponse;
use crate::db::beneficiaries::{BeneficiaryFilter, BeneficiaryUpdate, EnrollmentState, NewBeneficiary};
use crate::error::{AppError, AppResult};
use crate::models::{Beneficiary, PageParams, Paginated};
use crate::services::cancellation::{self, CancelRequest, CancellationOutcome};
use crate::services::{checkout, contracts, registry_sync};
use crate::{AppState, db, validation};

async fn load_scoped(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<Beneficiary> {
    db::beneficiaries::get(&state.pool, id, user.scope())
        .await?
        .ok_or_else(|| AppError::NotFound("beneficiary not found".to_string()))
}

#[utoipa::path(
    get,
    path = "/api/beneficiaries",
    params(
        ("status" = Option<String>, Query, description = "Beneficiary status"),
        ("payment_status" = Option<String>, Query, description = "Payment status"),
        ("unit_id" = Option<Uuid>, Query, description = "Unit filter (headquarters only)"),
        ("search" = Option<String>, Query, description = "Name, e-mail or CPF fragment"),
        ("page" = Option<i64>, Query),
        ("per_page" = Option<i64>, Query)
    ),
    responses((status = 200, description = "Page of beneficiaries")),
    security(("bearer" = [])),
    tag = "beneficiaries"
)]
#[get("/beneficiaries")]
pub async fn list_beneficiaries(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    filter: web::Query<BeneficiaryFilter>,
    page: web::Query<PageParams>,
) -> AppResult<HttpResponse> {
    let (items, total) = db::beneficiaries::list(&state.pool, user.scope(), &filter, &page).await?;
    Ok(ApiResponse::ok(Paginated::new(items, total, &page)))
}

#[utoipa::path(
    get,
    path = "/api/beneficiaries/{id}",
    params(("id" = Uuid, Path)),
    responses(
        (status = 200, description = "Beneficiary", body = Beneficiary),
        (status = 404, description = "Not found or outside the caller's unit")
    ),
    security(("bearer" = [])),
    tag = "beneficiaries"
)]
#[get("/beneficiaries/{id}")]
pub async fn get_beneficiary(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let beneficiary = load_scoped(&state, &user, path.into_inner()).await?;
    Ok(ApiResponse::ok(beneficiary))
}

/// Enrollment without a gateway subscription (status `pending`).
#[utoipa::path(
    post,
    path = "/api/beneficiaries",
    request_body = NewBeneficiary,
    responses((status = 201, description = "Created", body = Beneficiary)),
    security(("bearer" = [])),
    tag = "beneficiaries"
)]
#[post("/beneficiaries")]
pub async fn create_beneficiary(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<NewBeneficiary>,
) -> AppResult<HttpResponse> {
    let new = payload.into_inner();
    checkout::validate_beneficiary(&new, Utc::now().date_naive())?;
    let unit_id = checkout::resolve_unit(&user, new.unit_id)?;

    let plans = db::plans::list_for_unit(&state.pool, unit_id).await?;
    checkout::find_plan(&plans, new.plan_id)?;

    let beneficiary =
        db::beneficiaries::insert(&state.pool, &new, unit_id, &EnrollmentState::default()).await?;
    log::info!("beneficiary created id={} unit_id={unit_id}", beneficiary.id);
    Ok(ApiResponse::created(beneficiary))
}

#[utoipa::path(
    put,
    path = "/api/beneficiaries/{id}",
    params(("id" = Uuid, Path)),
    request_body = BeneficiaryUpdate,
    responses((status = 200, description = "Updated", body = Beneficiary)),
    security(("bearer" = [])),
    tag = "beneficiaries"
)]
#[put("/beneficiaries/{id}")]
pub async fn update_beneficiary(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<Uuid>,
    payload: web::Json<BeneficiaryUpdate>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let changes = payload.into_inner();

    if let Some(email) = &changes.email {
        validation::validate_email(email).map_err(AppError::Validation)?;
    }
    if let Some(phone) = changes.phone.as_deref().filter(|p| !p.trim().is_empty()) {
        validation::validate_phone(phone).map_err(AppError::Validation)?;
    }
    if let Some(zip) = changes.zip_code.as_deref().filter(|z| !z.trim().is_empty()) {
        validation::validate_cep(zip).map_err(AppError::Validation)?;
    }
    if let Some(plan_id) = changes.plan_id {
        let current = load_scoped(&state, &user, id).await?;
        let plans = db::plans::list_for_unit(&state.pool, current.unit_id).await?;
        checkout::find_plan(&plans, plan_id)?;
    }

    let updated = db::beneficiaries::update(&state.pool, id, user.scope(), &changes)
        .await?
        .ok_or_else(|| AppError::NotFound("beneficiary not found".to_string()))?;
    Ok(ApiResponse::ok(updated))
}

#[utoipa::path(
    post,
    path = "/api/beneficiaries/{id}/cancel",
    params(("id" = Uuid, Path)),
    request_body = CancelRequest,
    responses(
        (status = 200, description = "Cancelled", body = CancellationOutcome),
        (status = 409, description = "Already cancelled")
    ),
    security(("bearer" = [])),
    tag = "beneficiaries"
)]
#[post("/beneficiaries/{id}/cancel")]
pub async fn cancel_beneficiary(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<Uuid>,
    payload: web::Json<CancelRequest>,
) -> AppResult<HttpResponse> {
    let outcome = cancellation::cancel(
        &state,
        path.into_inner(),
        user.scope(),
        &payload.reason,
        Some(user.id),
    )
    .await?;
    Ok(ApiResponse::ok(outcome))
}

#[get("/beneficiaries/{id}/transactions")]
pub async fn list_transactions(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let beneficiary = load_scoped(&state, &user, path.into_inner()).await?;
    let transactions = db::transactions::for_beneficiary(&state.pool, beneficiary.id).await?;
    Ok(ApiResponse::ok(transactions))
}

#[get("/beneficiaries/{id}/cancellation")]
pub async fn get_cancellation(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let beneficiary = load_scoped(&state, &user, path.into_inner()).await?;
    let cancellation = db::cancellations::for_beneficiary(&state.pool, beneficiary.id)
        .await?
        .ok_or_else(|| AppError::NotFound("beneficiary is not cancelled".to_string()))?;
    Ok(ApiResponse::ok(cancellation))
}

#[get("/cancellations")]
pub async fn list_cancellations(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    page: web::Query<PageParams>,
) -> AppResult<HttpResponse> {
    let rows = db::cancellations::list(&state.pool, user.scope(), &page).await?;
    Ok(ApiResponse::ok(rows))
}

/// Generates the contract, or re-reads its status when one already exists.
#[post("/beneficiaries/{id}/contract")]
pub async fn generate_contract(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let beneficiary = load_scoped(&state, &user, path.into_inner()).await?;
    let updated = if beneficiary.contract_document_id.is_some() {
        contracts::refresh(&state, beneficiary.id).await?
    } else {
        contracts::generate(&state, beneficiary.id).await?
    };
    Ok(ApiResponse::ok(updated))
}

#[post("/beneficiaries/{id}/registry/retry")]
pub async fn retry_registry(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let beneficiary = load_scoped(&state, &user, path.into_inner()).await?;
    let outcome = registry_sync::send_enrollment(&state, beneficiary.id).await?;
    Ok(ApiResponse::ok(outcome))
}
