use actix_web::ResponseError;
use actix_web::http::StatusCode;

use benefits_admin::error::AppError;
use benefits_admin::gateway::errors::categorize_response;
use benefits_admin::gateway::{ErrorCategory, GatewayError, SuggestedAction, categorize};

#[test]
fn categorization_table() {
    let cases: &[(Option<u16>, &str, ErrorCategory)] = &[
        (None, "Transação recusada: saldo insuficiente", ErrorCategory::InsufficientFunds),
        (None, "Cartão vencido", ErrorCategory::Expired),
        (None, "suspeita de fraude", ErrorCategory::FraudSuspected),
        (None, "Do Not Honor", ErrorCategory::Declined),
        (None, "Transação não autorizada", ErrorCategory::Declined),
        (Some(422), r#"{"errors":[{"id":"invalid_parameter"}]}"#, ErrorCategory::InvalidData),
        (Some(401), "unauthorized", ErrorCategory::ConfigurationMissing),
        (Some(504), "", ErrorCategory::Timeout),
        (None, "request timed out", ErrorCategory::Timeout),
        (Some(503), "service unavailable", ErrorCategory::Network),
        (Some(500), "boom", ErrorCategory::Unknown),
    ];
    for (status, text, expected) in cases {
        assert_eq!(categorize_response(*status, text), *expected, "status={status:?} text={text}");
    }
}

#[test]
fn actions_and_retryability_follow_category() {
    assert_eq!(ErrorCategory::Declined.suggested_action(), SuggestedAction::UseAnotherCard);
    assert_eq!(ErrorCategory::FraudSuspected.suggested_action(), SuggestedAction::ContactBank);
    assert_eq!(ErrorCategory::InvalidData.suggested_action(), SuggestedAction::ReviewData);
    assert_eq!(ErrorCategory::Timeout.suggested_action(), SuggestedAction::Retry);

    assert!(ErrorCategory::Timeout.is_retryable());
    assert!(ErrorCategory::Network.is_retryable());
    assert!(!ErrorCategory::Declined.is_retryable());
    assert!(!ErrorCategory::ConfigurationMissing.is_retryable());
}

#[test]
fn rejected_charge_without_known_reason_is_declined() {
    let err = GatewayError::Rejected {
        code: Some("05".to_string()),
        message: "Erro genérico".to_string(),
    };
    let categorized = categorize(&err);
    assert_eq!(categorized.category, ErrorCategory::Declined);
    assert!(!categorized.retryable);
}

#[test]
fn missing_key_is_configuration() {
    let categorized = categorize(&GatewayError::NotConfigured("GATEWAY_API_KEY"));
    assert_eq!(categorized.category, ErrorCategory::ConfigurationMissing);
    assert_eq!(categorized.action, SuggestedAction::ContactSupport);
}

#[test]
fn gateway_errors_map_to_http_statuses() {
    let declined: AppError = GatewayError::Rejected {
        code: None,
        message: "saldo insuficiente".to_string(),
    }
    .into();
    assert_eq!(declined.status_code(), StatusCode::PAYMENT_REQUIRED);

    let invalid: AppError = GatewayError::Api {
        status: 422,
        body: "invalid".to_string(),
    }
    .into();
    assert_eq!(invalid.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

    assert_eq!(AppError::NotFound("plan not found".into()).status_code(), StatusCode::NOT_FOUND);
    assert_eq!(AppError::Conflict("dup".into()).status_code(), StatusCode::CONFLICT);
}
