// src/api/notifications.rs

use actix_web::{HttpResponse, get, post, web};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::auth::AuthUser;
use crate::api::response::ApiResponse;
use crate::error::{AppError, AppResult};
use crate::models::PageParams;
use crate::services::notifications;
use crate::{AppState, db};

#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread: bool,
}

/// Exactly one target: a user, every operator of a unit, or all of headquarters.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SendNotificationRequest {
    pub user_id: Option<Uuid>,
    pub unit_id: Option<Uuid>,
    #[serde(default)]
    pub headquarters: bool,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
}

#[get("/notifications")]
pub async fn list_notifications(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    query: web::Query<NotificationQuery>,
    page: web::Query<PageParams>,
) -> AppResult<HttpResponse> {
    let items = db::notifications::list_for_user(&state.pool, user.id, query.unread, &page).await?;
    let unread = db::notifications::unread_count(&state.pool, user.id).await?;
    Ok(ApiResponse::ok(json!({ "items": items, "unread": unread })))
}

#[post("/notifications")]
pub async fn send_notification(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<SendNotificationRequest>,
) -> AppResult<HttpResponse> {
    user.require_headquarters()?;
    let req = payload.into_inner();
    if req.title.trim().is_empty() || req.message.trim().is_empty() {
        return Err(AppError::Validation("title and message are required".to_string()));
    }
    let link = req.link.as_deref();

    let sent = match (req.user_id, req.unit_id, req.headquarters) {
        (Some(user_id), None, false) => {
            db::notifications::insert(&state.pool, user_id, &req.title, &req.message, link).await?;
            1
        }
        (None, Some(unit_id), false) => {
            notifications::notify_unit(&state.pool, unit_id, &req.title, &req.message, link).await?
        }
        (None, None, true) => {
            notifications::notify_headquarters(&state.pool, &req.title, &req.message, link).await?
        }
        _ => {
            return Err(AppError::Validation(
                "choose exactly one of user_id, unit_id or headquarters".to_string(),
            ));
        }
    };
    Ok(ApiResponse::created(json!({ "sent": sent })))
}

#[post("/notifications/{id}/read")]
pub async fn mark_read(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    if !db::notifications::mark_read(&state.pool, path.into_inner(), user.id).await? {
        return Err(AppError::NotFound("notification not found".to_string()));
    }
    Ok(ApiResponse::ok(json!({ "read": true })))
}

#[post("/notifications/read-all")]
pub async fn mark_all_read(state: web::Data<AppState>, user: web::ReqData<AuthUser>) -> AppResult<HttpResponse> {
    let updated = db::notifications::mark_all_read(&state.pool, user.id).await?;
    Ok(ApiResponse::ok(json!({ "updated": updated })))
}
