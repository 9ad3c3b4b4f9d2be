// src/api/franchises.rs

use actix_web::{HttpResponse, delete, get, post, put, web};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::auth::AuthUser;
use crate::api::response::ApiResponse;
use crate::db::franchises::{FranchiseUpdate, NewFranchise};
use crate::error::{AppError, AppResult};
use crate::models::{PageParams, Paginated};
use crate::{AppState, db, validation};

#[derive(Debug, Default, Deserialize)]
pub struct FranchiseQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

/// Franchise of the caller's unit, for unit operators.
async fn own_franchise_id(state: &AppState, unit_id: Uuid) -> AppResult<Uuid> {
    db::units::get(&state.pool, unit_id)
        .await?
        .map(|u| u.franchise_id)
        .ok_or_else(|| AppError::NotFound("unit not found".to_string()))
}

#[get("/franchises")]
pub async fn list_franchises(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    query: web::Query<FranchiseQuery>,
    page: web::Query<PageParams>,
) -> AppResult<HttpResponse> {
    if let Some(unit_id) = user.scope() {
        let franchise_id = own_franchise_id(&state, unit_id).await?;
        let items: Vec<_> = db::franchises::get(&state.pool, franchise_id).await?.into_iter().collect();
        let total = items.len() as i64;
        return Ok(ApiResponse::ok(Paginated::new(items, total, &page)));
    }
    let (items, total) = db::franchises::list(&state.pool, query.include_inactive, &page).await?;
    Ok(ApiResponse::ok(Paginated::new(items, total, &page)))
}

#[get("/franchises/{id}")]
pub async fn get_franchise(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    if let Some(unit_id) = user.scope() {
        if own_franchise_id(&state, unit_id).await? != id {
            return Err(AppError::NotFound("franchise not found".to_string()));
        }
    }
    let franchise = db::franchises::get(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("franchise not found".to_string()))?;
    Ok(ApiResponse::ok(franchise))
}

#[post("/franchises")]
pub async fn create_franchise(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<NewFranchise>,
) -> AppResult<HttpResponse> {
    user.require_headquarters()?;
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("name is required".to_string()));
    }
    validation::validate_cnpj(&payload.cnpj).map_err(AppError::Validation)?;
    if let Some(email) = payload.email.as_deref() {
        validation::validate_email(email).map_err(AppError::Validation)?;
    }
    let franchise = db::franchises::insert(&state.pool, &payload).await?;
    log::info!("franchise created id={}", franchise.id);
    Ok(ApiResponse::created(franchise))
}

#[put("/franchises/{id}")]
pub async fn update_franchise(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<Uuid>,
    payload: web::Json<FranchiseUpdate>,
) -> AppResult<HttpResponse> {
    user.require_headquarters()?;
    if let Some(email) = payload.email.as_deref() {
        validation::validate_email(email).map_err(AppError::Validation)?;
    }
    let franchise = db::franchises::update(&state.pool, path.into_inner(), &payload)
        .await?
        .ok_or_else(|| AppError::NotFound("franchise not found".to_string()))?;
    Ok(ApiResponse::ok(franchise))
}

/// Soft delete; the franchise's units are deactivated with it.
#[delete("/franchises/{id}")]
pub async fn delete_franchise(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    user.require_headquarters()?;
    let id = path.into_inner();
    if !db::franchises::deactivate(&state.pool, id).await? {
        return Err(AppError::NotFound("franchise not found".to_string()));
    }
    log::info!("franchise deactivated id={id}");
    Ok(ApiResponse::ok(serde_json::json!({ "id": id, "active": false })))
}
