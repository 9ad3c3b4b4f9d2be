// src/docs.rs

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::auth::login,
        crate::api::auth::create_user_handler,
        crate::api::checkout::create_checkout,
        crate::api::beneficiaries::list_beneficiaries,
        crate::api::beneficiaries::get_beneficiary,
        crate::api::beneficiaries::create_beneficiary,
        crate::api::beneficiaries::update_beneficiary,
        crate::api::beneficiaries::cancel_beneficiary,
        crate::api::plans::list_plans,
        crate::api::plans::create_plan,
        crate::api::commissions::compute_commissions,
        crate::api::registry::query_registry,
        crate::api::webhooks::gateway_webhook
    ),
    components(
        schemas(
            crate::api::auth::LoginRequest,
            crate::api::auth::AuthResponse,
            crate::api::auth::CreateUserRequest,
            crate::api::commissions::ComputeRequest,
            crate::api::notifications::SendNotificationRequest,
            crate::models::User,
            crate::models::Role,
            crate::models::Franchise,
            crate::models::Unit,
            crate::models::Plan,
            crate::models::Beneficiary,
            crate::models::BeneficiaryStatus,
            crate::models::PaymentStatus,
            crate::models::PaymentMethod,
            crate::models::ContractStatus,
            crate::models::Cancellation,
            crate::models::Commission,
            crate::models::Transaction,
            crate::models::TransactionStatus,
            crate::models::Notification,
            crate::db::beneficiaries::NewBeneficiary,
            crate::db::beneficiaries::BeneficiaryUpdate,
            crate::db::plans::NewPlan,
            crate::db::plans::PlanUpdate,
            crate::db::franchises::NewFranchise,
            crate::db::franchises::FranchiseUpdate,
            crate::db::units::NewUnit,
            crate::db::units::UnitUpdate,
            crate::gateway::CardData,
            crate::gateway::errors::CategorizedError,
            crate::gateway::errors::ErrorCategory,
            crate::gateway::errors::SuggestedAction,
            crate::services::checkout::CheckoutRequest,
            crate::services::checkout::CheckoutOutcome,
            crate::services::cancellation::CancelRequest,
            crate::services::cancellation::CancellationOutcome,
            crate::services::commissions::ComputeSummary,
            crate::services::registry_sync::SyncOutcome,
            crate::services::webhooks::WebhookAck,
            crate::services::webhooks::WebhookOutcome,
            crate::registry::RegistryPage
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Login and user accounts"),
        (name = "checkout", description = "Enrollment with payment"),
        (name = "beneficiaries", description = "Beneficiary lifecycle"),
        (name = "plans", description = "Plan catalogue"),
        (name = "commissions", description = "Unit commissions"),
        (name = "registry", description = "Health registry lookups"),
        (name = "webhooks", description = "Callbacks from the payment gateway")
    )
)]
pub struct ApiDoc;
