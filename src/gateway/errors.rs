// src/gateway/errors.rs
//
// Gateway failures are mapped to a small set of categories so the checkout
// can tell the customer what to do next instead of echoing gateway text.

use serde::Serialize;
use std::fmt;
use utoipa::ToSchema;

#[derive(Debug)]
pub enum GatewayError {
    Http(reqwest::Error),
    Api { status: u16, body: String },
    /// The charge was created but the acquirer refused it.
    Rejected { code: Option<String>, message: String },
    InvalidResponse(String),
    NotConfigured(&'static str),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Http(e) => write!(f, "http error: {e}"),
            GatewayError::Api { status, body } => {
                write!(f, "gateway api error status={status} body={body}")
            }
            GatewayError::Rejected { code, message } => {
                write!(f, "charge rejected code={} message={message}", code.as_deref().unwrap_or("-"))
            }
            GatewayError::InvalidResponse(e) => write!(f, "invalid response: {e}"),
            GatewayError::NotConfigured(what) => write!(f, "gateway not configured: {what} missing"),
        }
    }
}

impl std::error::Error for GatewayError {}

impl From<reqwest::Error> for GatewayError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Declined,
    Expired,
    InsufficientFunds,
    FraudSuspected,
    ConfigurationMissing,
    Timeout,
    Network,
    InvalidData,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    Retry,
    UseAnotherCard,
    ContactBank,
    ReviewData,
    ContactSupport,
}

impl ErrorCategory {
    pub fn suggested_action(self) -> SuggestedAction {
        match self {
            ErrorCategory::Declined | ErrorCategory::Expired | ErrorCategory::InsufficientFunds => {
                SuggestedAction::UseAnotherCard
            }
            ErrorCategory::FraudSuspected => SuggestedAction::ContactBank,
            ErrorCategory::Timeout | ErrorCategory::Network => SuggestedAction::Retry,
            ErrorCategory::InvalidData => SuggestedAction::ReviewData,
            ErrorCategory::ConfigurationMissing | ErrorCategory::Unknown => {
                SuggestedAction::ContactSupport
            }
        }
    }

    /// Whether resending the same request may succeed.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorCategory::Timeout | ErrorCategory::Network)
    }

    pub fn user_message(self) -> &'static str {
        match self {
            ErrorCategory::Declined => "Pagamento recusado pela operadora do cartão. Tente outro cartão.",
            ErrorCategory::Expired => "Cartão vencido. Utilize outro cartão.",
            ErrorCategory::InsufficientFunds => "Saldo ou limite insuficiente. Utilize outro cartão.",
            ErrorCategory::FraudSuspected => {
                "Pagamento bloqueado por segurança. Entre em contato com o seu banco."
            }
            ErrorCategory::ConfigurationMissing => {
                "Pagamentos indisponíveis no momento. Contate o suporte."
            }
            ErrorCategory::Timeout => "O processamento do pagamento demorou demais. Tente novamente.",
            ErrorCategory::Network => "Falha de comunicação com o meio de pagamento. Tente novamente.",
            ErrorCategory::InvalidData => "Dados de pagamento inválidos. Revise as informações.",
            ErrorCategory::Unknown => "Não foi possível processar o pagamento. Contate o suporte.",
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CategorizedError {
    pub category: ErrorCategory,
    pub action: SuggestedAction,
    pub retryable: bool,
    pub message: String,
    #[serde(skip_serializing)]
    pub detail: String,
}

impl CategorizedError {
    pub fn new(category: ErrorCategory, detail: impl Into<String>) -> Self {
        Self {
            category,
            action: category.suggested_action(),
            retryable: category.is_retryable(),
            message: category.user_message().to_string(),
            detail: detail.into(),
        }
    }
}

impl fmt::Display for CategorizedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.category, self.detail)
    }
}

const INSUFFICIENT: &[&str] = &["insufficient", "insuficiente", "sem saldo", "limite excedido", "exceeds limit"];
const EXPIRED: &[&str] = &["expired", "expirad", "vencid", "validade"];
const FRAUD: &[&str] = &["fraud", "fraude", "suspeit", "suspect", "restrit", "restricted", "bloquead", "blocked", "stolen", "roubad", "perdid"];
const DECLINED: &[&str] = &["declined", "recusad", "negad", "not authorized", "não autorizad", "nao autorizad", "rejected", "rejeitad", "do not honor", "não aprovad", "nao aprovad"];
const INVALID: &[&str] = &["invalid", "inválid", "invalid_parameter", "obrigatório", "obrigatorio", "must be", "não pode", "nao pode"];
const TIMEOUT: &[&str] = &["timeout", "timed out", "tempo esgotado", "tempo limite"];

fn contains_any(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| text.contains(n))
}

/// Categorizes a gateway answer from its HTTP status (if any) and the codes and
/// messages it carried. Text rules are checked from most to least specific since
/// one message often matches several ("recusada: saldo insuficiente").
pub fn categorize_response(status: Option<u16>, text: &str) -> ErrorCategory {
    let text = text.to_lowercase();

    if matches!(status, Some(401) | Some(403)) {
        return ErrorCategory::ConfigurationMissing;
    }
    if matches!(status, Some(408) | Some(504)) || contains_any(&text, TIMEOUT) {
        return ErrorCategory::Timeout;
    }
    if contains_any(&text, INSUFFICIENT) {
        return ErrorCategory::InsufficientFunds;
    }
    if contains_any(&text, FRAUD) {
        return ErrorCategory::FraudSuspected;
    }
    if contains_any(&text, EXPIRED) {
        return ErrorCategory::Expired;
    }
    if contains_any(&text, DECLINED) {
        return ErrorCategory::Declined;
    }
    if matches!(status, Some(400) | Some(422)) || contains_any(&text, INVALID) {
        return ErrorCategory::InvalidData;
    }
    if matches!(status, Some(429) | Some(502) | Some(503)) {
        return ErrorCategory::Network;
    }
    ErrorCategory::Unknown
}

pub fn categorize(err: &GatewayError) -> CategorizedError {
    let category = match err {
        GatewayError::Http(e) if e.is_timeout() => ErrorCategory::Timeout,
        GatewayError::Http(_) => ErrorCategory::Network,
        GatewayError::Api { status, body } => categorize_response(Some(*status), body),
        GatewayError::Rejected { code, message } => {
            let text = format!("{} {message}", code.as_deref().unwrap_or_default());
            match categorize_response(None, &text) {
                ErrorCategory::Unknown | ErrorCategory::InvalidData => ErrorCategory::Declined,
                other => other,
            }
        }
        GatewayError::InvalidResponse(_) => ErrorCategory::Unknown,
        GatewayError::NotConfigured(_) => ErrorCategory::ConfigurationMissing,
    };
    CategorizedError::new(category, err.to_string())
}
