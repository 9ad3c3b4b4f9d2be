// src/api/units.rs

use actix_web::{HttpResponse, delete, get, post, put, web};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::auth::AuthUser;
use crate::api::response::ApiResponse;
use crate::db::units::{NewUnit, UnitUpdate};
use crate::error::{AppError, AppResult};
use crate::{AppState, db, validation};

#[derive(Debug, Default, Deserialize)]
pub struct UnitQuery {
    pub franchise_id: Option<Uuid>,
    #[serde(default)]
    pub include_inactive: bool,
}

fn check_rate(rate: Decimal) -> AppResult<()> {
    if rate.is_sign_negative() || rate > Decimal::ONE_HUNDRED {
        return Err(AppError::Validation("commission_rate must be between 0 and 100".to_string()));
    }
    Ok(())
}

#[get("/units")]
pub async fn list_units(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    query: web::Query<UnitQuery>,
) -> AppResult<HttpResponse> {
    let units = db::units::list(
        &state.pool,
        user.scope(),
        query.franchise_id,
        query.include_inactive && user.is_headquarters(),
    )
    .await?;
    Ok(ApiResponse::ok(units))
}

#[get("/units/{id}")]
pub async fn get_unit(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let unit = db::units::get(&state.pool, id)
        .await?
        .filter(|u| user.scope().is_none_or(|own| own == u.id))
        .ok_or_else(|| AppError::NotFound("unit not found".to_string()))?;
    Ok(ApiResponse::ok(unit))
}

#[post("/units")]
pub async fn create_unit(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<NewUnit>,
) -> AppResult<HttpResponse> {
    user.require_headquarters()?;
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("name is required".to_string()));
    }
    if let Some(cnpj) = payload.cnpj.as_deref() {
        validation::validate_cnpj(cnpj).map_err(AppError::Validation)?;
    }
    if let Some(rate) = payload.commission_rate {
        check_rate(rate)?;
    }
    let unit = db::units::insert(&state.pool, &payload).await?;
    log::info!("unit created id={} franchise_id={}", unit.id, unit.franchise_id);
    Ok(ApiResponse::created(unit))
}

#[put("/units/{id}")]
pub async fn update_unit(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<Uuid>,
    payload: web::Json<UnitUpdate>,
) -> AppResult<HttpResponse> {
    user.require_headquarters()?;
    if let Some(rate) = payload.commission_rate {
        check_rate(rate)?;
    }
    let unit = db::units::update(&state.pool, path.into_inner(), &payload)
        .await?
        .ok_or_else(|| AppError::NotFound("unit not found".to_string()))?;
    Ok(ApiResponse::ok(unit))
}

#[delete("/units/{id}")]
pub async fn delete_unit(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    user.require_headquarters()?;
    let id = path.into_inner();
    if !db::units::deactivate(&state.pool, id).await? {
        return Err(AppError::NotFound("unit not found".to_string()));
    }
    log::info!("unit deactivated id={id}");
    Ok(ApiResponse::ok(serde_json::json!({ "id": id, "active": false })))
}
