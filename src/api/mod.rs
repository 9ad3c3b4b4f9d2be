// src/api/mod.rs

pub mod auth;
pub mod beneficiaries;
pub mod checkout;
pub mod commissions;
pub mod franchises;
pub mod notifications;
pub mod plans;
pub mod registry;
pub mod response;
pub mod units;
pub mod webhooks;

use actix_web::{HttpResponse, get, web};
use serde_json::json;

use crate::AppState;
use crate::error::AppError;

#[get("/health")]
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => HttpResponse::Ok().json(json!({ "success": true, "data": { "status": "ok" } })),
        Err(e) => {
            log::error!("health check database error: {e}");
            HttpResponse::ServiceUnavailable()
                .json(json!({ "success": false, "data": { "status": "database unavailable" } }))
        }
    }
}

/// Every route of the service. Shared by the server binary and the integration tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| AppError::Validation(format!("invalid JSON body: {err}")).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| AppError::Validation(format!("invalid query: {err}")).into()),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|err, _req| AppError::NotFound(format!("invalid path: {err}")).into()),
    )
    // public
    .service(health)
    .service(auth::login)
    .service(webhooks::gateway_webhook)
    .service(webhooks::esign_webhook)
    // authenticated
    .service(
        web::scope("/api")
            .wrap(auth::JwtMiddleware)
            .service(auth::create_user_handler)
            .service(checkout::create_checkout)
            .service(beneficiaries::list_beneficiaries)
            .service(beneficiaries::create_beneficiary)
            .service(beneficiaries::get_beneficiary)
            .service(beneficiaries::update_beneficiary)
            .service(beneficiaries::cancel_beneficiary)
            .service(beneficiaries::list_transactions)
            .service(beneficiaries::get_cancellation)
            .service(beneficiaries::generate_contract)
            .service(beneficiaries::retry_registry)
            .service(beneficiaries::list_cancellations)
            .service(plans::list_plans)
            .service(plans::create_plan)
            .service(plans::get_plan)
            .service(plans::update_plan)
            .service(plans::delete_plan)
            .service(franchises::list_franchises)
            .service(franchises::create_franchise)
            .service(franchises::get_franchise)
            .service(franchises::update_franchise)
            .service(franchises::delete_franchise)
            .service(units::list_units)
            .service(units::create_unit)
            .service(units::get_unit)
            .service(units::update_unit)
            .service(units::delete_unit)
            .service(commissions::list_commissions)
            .service(commissions::compute_commissions)
            .service(commissions::pay_commission)
            .service(notifications::list_notifications)
            .service(notifications::send_notification)
            .service(notifications::mark_all_read)
            .service(notifications::mark_read)
            .service(registry::query_registry)
            .service(registry::retry_failed)
            .service(webhooks::reprocess),
    );
}
