// src/registry.rs
//
// Client for the external registry (RMS) consultation API.
// Auth: static `x-api-key` header. Lookups are capped at 5 seconds; the
// notification calls use the shared client timeout.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use utoipa::ToSchema;

use crate::config::RegistryConfig;

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub enum RegistryError {
    Http(reqwest::Error),
    Api { status: u16, body: String },
    InvalidResponse(String),
    NotConfigured(&'static str),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::Http(e) if e.is_timeout() => write!(f, "registry timeout: {e}"),
            RegistryError::Http(e) => write!(f, "http error: {e}"),
            RegistryError::Api { status, body } => {
                write!(f, "registry api error status={status} body={body}")
            }
            RegistryError::InvalidResponse(e) => write!(f, "invalid response: {e}"),
            RegistryError::NotConfigured(what) => {
                write!(f, "registry not configured: {what} missing")
            }
        }
    }
}

impl std::error::Error for RegistryError {}

impl From<reqwest::Error> for RegistryError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentNotice {
    pub codigo_externo: String,
    pub cpf: String,
    pub nome: String,
    pub email: String,
    pub telefone: Option<String>,
    pub data_nascimento: Option<NaiveDate>,
    pub plano: String,
    pub unidade: String,
    pub data_adesao: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancellationNotice {
    pub codigo_externo: String,
    pub cpf: String,
    pub motivo: String,
    pub data_cancelamento: NaiveDate,
}

/// `offset/limit/count` envelope returned by consultation queries.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegistryPage {
    pub offset: i64,
    pub limit: i64,
    pub count: i64,
    #[serde(default, alias = "data", alias = "results")]
    #[schema(value_type = Vec<Object>)]
    pub items: Vec<Value>,
}

#[derive(Debug, Clone)]
pub struct RegistryQuery {
    pub cpf: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub offset: i64,
    pub limit: i64,
}

#[derive(Clone)]
pub struct RegistryClient {
    http: reqwest::Client,
    base_url: Option<String>,
    api_key: Option<String>,
}

impl RegistryClient {
    pub fn new(config: &RegistryConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some() && self.api_key.is_some()
    }

    fn endpoint(&self, path: &str) -> Result<(String, &str), RegistryError> {
        let base = self
            .base_url
            .as_deref()
            .ok_or(RegistryError::NotConfigured("REGISTRY_BASE_URL"))?;
        let key = self
            .api_key
            .as_deref()
            .ok_or(RegistryError::NotConfigured("REGISTRY_API_KEY"))?;
        Ok((format!("{base}{path}"), key))
    }

    async fn read_body(resp: reqwest::Response) -> Result<String, RegistryError> {
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(RegistryError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    fn protocol_of(body: &str) -> Option<String> {
        let value: Value = serde_json::from_str(body).ok()?;
        let protocol = value
            .get("protocolo")
            .or_else(|| value.get("protocol"))
            .or_else(|| value.get("id"))?;
        match protocol {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Reports an enrollment (adesão). Returns the registry protocol when one is given.
    pub async fn notify_enrollment(
        &self,
        notice: &EnrollmentNotice,
    ) -> Result<Option<String>, RegistryError> {
        let (url, key) = self.endpoint("/beneficiarios")?;
        let resp = self
            .http
            .post(url)
            .header("x-api-key", key)
            .json(notice)
            .send()
            .await?;
        let body = Self::read_body(resp).await?;
        Ok(Self::protocol_of(&body))
    }

    pub async fn notify_cancellation(
        &self,
        notice: &CancellationNotice,
    ) -> Result<Option<String>, RegistryError> {
        let (url, key) = self.endpoint("/cancelamentos")?;
        let resp = self
            .http
            .post(url)
            .header("x-api-key", key)
            .json(notice)
            .send()
            .await?;
        let body = Self::read_body(resp).await?;
        Ok(Self::protocol_of(&body))
    }

    pub async fn query_beneficiaries(&self, query: &RegistryQuery) -> Result<RegistryPage, RegistryError> {
        let (url, key) = self.endpoint("/beneficiarios")?;

        let mut params: Vec<(&str, String)> = vec![
            ("offset", query.offset.max(0).to_string()),
            ("limit", query.limit.clamp(1, 100).to_string()),
        ];
        if let Some(cpf) = &query.cpf {
            params.push(("cpf", crate::validation::only_digits(cpf)));
        }
        if let Some(from) = query.from {
            params.push(("data_inicio", from.format("%Y-%m-%d").to_string()));
        }
        if let Some(to) = query.to {
            params.push(("data_fim", to.format("%Y-%m-%d").to_string()));
        }

        let resp = self
            .http
            .get(url)
            .header("x-api-key", key)
            .query(&params)
            .timeout(LOOKUP_TIMEOUT)
            .send()
            .await?;
        let body = Self::read_body(resp).await?;

        serde_json::from_str::<RegistryPage>(&body)
            .map_err(|e| RegistryError::InvalidResponse(format!("{e}; body={body}")))
    }
}
