// src/api/checkout.rs

use actix_web::{HttpResponse, post, web};

use crate::AppState;
use crate::api::auth::AuthUser;
use crate::api::response::ApiResponse;
use crate::error::AppResult;
use crate::services::checkout::{self, CheckoutOutcome, CheckoutRequest};

#[utoipa::path(
    post,
    path = "/api/checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 201, description = "Beneficiary enrolled, first bill issued", body = CheckoutOutcome),
        (status = 400, description = "Invalid personal or card data"),
        (status = 402, description = "Card declined; body carries category, action and retryable"),
        (status = 404, description = "Plan not found"),
        (status = 409, description = "CPF already enrolled"),
        (status = 502, description = "Gateway unavailable")
    ),
    security(("bearer" = [])),
    tag = "checkout"
)]
#[post("/checkout")]
pub async fn create_checkout(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<CheckoutRequest>,
) -> AppResult<HttpResponse> {
    let outcome = checkout::checkout(&state, &user, payload.into_inner()).await?;
    Ok(ApiResponse::created(outcome))
}
