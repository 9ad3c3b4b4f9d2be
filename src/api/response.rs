// src/api/response.rs

use actix_web::HttpResponse;
use serde::Serialize;

/// Success envelope. Errors use the same shape, rendered by `AppError`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> HttpResponse {
        HttpResponse::Ok().json(ApiResponse { success: true, data })
    }

    pub fn created(data: T) -> HttpResponse {
        HttpResponse::Created().json(ApiResponse { success: true, data })
    }
}
