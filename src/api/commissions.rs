// src/api/commissions.rs

use actix_web::{HttpResponse, get, post, web};
use chrono::Utc;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::auth::AuthUser;
use crate::api::response::ApiResponse;
use crate::db::commissions::CommissionFilter;
use crate::error::{AppError, AppResult};
use crate::models::PageParams;
use crate::services::commissions::{self, ComputeSummary};
use crate::{AppState, db};

#[derive(Debug, Default, Deserialize)]
pub struct CommissionQuery {
    /// `YYYY-MM`
    pub month: Option<String>,
    pub unit_id: Option<Uuid>,
    pub paid: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ComputeRequest {
    /// `YYYY-MM`; defaults to the current month.
    pub month: Option<String>,
}

#[get("/commissions")]
pub async fn list_commissions(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    query: web::Query<CommissionQuery>,
    page: web::Query<PageParams>,
) -> AppResult<HttpResponse> {
    let filter = CommissionFilter {
        unit_id: query.unit_id,
        reference_month: query
            .month
            .as_deref()
            .map(commissions::parse_reference_month)
            .transpose()?,
        paid: query.paid,
    };
    let rows = db::commissions::list(&state.pool, user.scope(), &filter, &page).await?;
    Ok(ApiResponse::ok(rows))
}

#[utoipa::path(
    post,
    path = "/api/commissions/compute",
    request_body = ComputeRequest,
    responses((status = 200, description = "Commissions created for the month", body = ComputeSummary)),
    security(("bearer" = [])),
    tag = "commissions"
)]
#[post("/commissions/compute")]
pub async fn compute_commissions(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<ComputeRequest>,
) -> AppResult<HttpResponse> {
    user.require_headquarters()?;
    let month = match payload.month.as_deref() {
        Some(raw) => commissions::parse_reference_month(raw)?,
        None => commissions::month_start(Utc::now().date_naive()),
    };
    let summary = commissions::compute_for_month(&state.pool, month).await?;
    Ok(ApiResponse::ok(summary))
}

#[post("/commissions/{id}/pay")]
pub async fn pay_commission(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    user.require_headquarters()?;
    let commission = db::commissions::mark_paid(&state.pool, path.into_inner())
        .await?
        .ok_or_else(|| AppError::NotFound("commission not found".to_string()))?;
    log::info!("commission paid id={} amount={}", commission.id, commission.amount);
    Ok(ApiResponse::ok(commission))
}
