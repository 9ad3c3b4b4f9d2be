// src/error.rs

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

use crate::esign::EsignError;
use crate::gateway::{CategorizedError, ErrorCategory, GatewayError, categorize};
use crate::registry::RegistryError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Payment gateway error: {0}")]
    Gateway(CategorizedError),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::NotFound("resource not found".to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                let what = db.constraint().unwrap_or("unique constraint");
                AppError::Conflict(format!("already exists ({what})"))
            }
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                AppError::Validation("referenced record does not exist".to_string())
            }
            _ => AppError::Database(err),
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        AppError::Gateway(categorize(&err))
    }
}

impl From<EsignError> for AppError {
    fn from(err: EsignError) -> Self {
        match err {
            EsignError::NotConfigured(what) => AppError::Configuration(format!("{what} is not set")),
            other => AppError::Upstream(other.to_string()),
        }
    }
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotConfigured(what) => {
                AppError::Configuration(format!("{what} is not set"))
            }
            other => AppError::Upstream(other.to_string()),
        }
    }
}

impl AppError {
    fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::Configuration(_) => "configuration_error",
            AppError::Gateway(_) => "payment_error",
            AppError::Upstream(_) => "upstream_error",
            AppError::Database(_) => "database_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    /// Message shown to the caller. Server-side details stay in the log.
    fn public_message(&self) -> String {
        match self {
            AppError::Validation(m)
            | AppError::NotFound(m)
            | AppError::Conflict(m)
            | AppError::Unauthorized(m)
            | AppError::Forbidden(m)
            | AppError::Configuration(m) => m.clone(),
            AppError::Gateway(e) => e.message.clone(),
            AppError::Upstream(_) => "external service unavailable".to_string(),
            AppError::Database(_) | AppError::Internal(_) => {
                "an internal server error occurred".to_string()
            }
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Gateway(e) => match e.category {
                ErrorCategory::Declined
                | ErrorCategory::Expired
                | ErrorCategory::InsufficientFunds
                | ErrorCategory::FraudSuspected => StatusCode::PAYMENT_REQUIRED,
                ErrorCategory::InvalidData => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorCategory::ConfigurationMissing => StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCategory::Timeout => StatusCode::GATEWAY_TIMEOUT,
                ErrorCategory::Network | ErrorCategory::Unknown => StatusCode::BAD_GATEWAY,
            },
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("{self}");
        } else {
            log::warn!("{self}");
        }

        let mut error = json!({
            "code": self.code(),
            "message": self.public_message(),
        });
        if let AppError::Gateway(e) = self {
            error["category"] = json!(e.category);
            error["action"] = json!(e.action);
            error["retryable"] = json!(e.retryable);
        }

        HttpResponse::build(status).json(json!({
            "success": false,
            "error": error,
        }))
    }
}
