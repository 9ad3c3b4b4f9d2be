// src/api/plans.rs

use actix_web::{HttpResponse, delete, get, post, put, web};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::auth::AuthUser;
use crate::api::response::ApiResponse;
use crate::db::plans::{NewPlan, PlanUpdate};
use crate::error::{AppError, AppResult};
use crate::models::Plan;
use crate::{AppState, db};

#[derive(Debug, Default, Deserialize)]
pub struct PlanQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

fn check_price(price: Decimal) -> AppResult<()> {
    if price.is_sign_negative() {
        return Err(AppError::Validation("price must not be negative".to_string()));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/plans",
    params(("include_inactive" = Option<bool>, Query, description = "Headquarters only")),
    responses((status = 200, description = "Plans the caller can sell", body = [Plan])),
    security(("bearer" = [])),
    tag = "plans"
)]
#[get("/plans")]
pub async fn list_plans(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    query: web::Query<PlanQuery>,
) -> AppResult<HttpResponse> {
    let plans = match user.scope() {
        Some(unit_id) => db::plans::list_for_unit(&state.pool, unit_id).await?,
        None => db::plans::list(&state.pool, query.include_inactive).await?,
    };
    Ok(ApiResponse::ok(plans))
}

#[get("/plans/{id}")]
pub async fn get_plan(state: web::Data<AppState>, path: web::Path<Uuid>) -> AppResult<HttpResponse> {
    let plan = db::plans::get(&state.pool, path.into_inner())
        .await?
        .ok_or_else(|| AppError::NotFound("plan not found".to_string()))?;
    Ok(ApiResponse::ok(plan))
}

#[utoipa::path(
    post,
    path = "/api/plans",
    request_body = NewPlan,
    responses((status = 201, description = "Created", body = Plan)),
    security(("bearer" = [])),
    tag = "plans"
)]
#[post("/plans")]
pub async fn create_plan(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<NewPlan>,
) -> AppResult<HttpResponse> {
    user.require_headquarters()?;
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("name is required".to_string()));
    }
    check_price(payload.price)?;
    let plan = db::plans::insert(&state.pool, &payload).await?;
    log::info!("plan created id={} name={}", plan.id, plan.name);
    Ok(ApiResponse::created(plan))
}

#[put("/plans/{id}")]
pub async fn update_plan(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<Uuid>,
    payload: web::Json<PlanUpdate>,
) -> AppResult<HttpResponse> {
    user.require_headquarters()?;
    if let Some(price) = payload.price {
        check_price(price)?;
    }
    let plan = db::plans::update(&state.pool, path.into_inner(), &payload)
        .await?
        .ok_or_else(|| AppError::NotFound("plan not found".to_string()))?;
    Ok(ApiResponse::ok(plan))
}

#[delete("/plans/{id}")]
pub async fn delete_plan(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    user.require_headquarters()?;
    let id = path.into_inner();
    if !db::plans::deactivate(&state.pool, id).await? {
        return Err(AppError::NotFound("plan not found".to_string()));
    }
    log::info!("plan deactivated id={id}");
    Ok(ApiResponse::ok(serde_json::json!({ "id": id, "active": false })))
}
