// src/esign.rs
//
// E-signature provider client. Documents are keyed by our beneficiary id
// (`external_id`) so a repeated request returns the existing document.
// Auth: `Authorization: Bearer <ESIGN_API_KEY>`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::config::EsignConfig;

#[derive(Debug)]
pub enum EsignError {
    Http(reqwest::Error),
    Api { status: u16, body: String },
    InvalidResponse(String),
    NotConfigured(&'static str),
}

impl fmt::Display for EsignError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EsignError::Http(e) => write!(f, "http error: {e}"),
            EsignError::Api { status, body } => {
                write!(f, "esign api error status={status} body={body}")
            }
            EsignError::InvalidResponse(e) => write!(f, "invalid response: {e}"),
            EsignError::NotConfigured(what) => write!(f, "esign not configured: {what} missing"),
        }
    }
}

impl std::error::Error for EsignError {}

impl From<reqwest::Error> for EsignError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Signer {
    pub name: String,
    pub email: String,
    pub cpf: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateDocumentRequest {
    pub external_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    pub signers: Vec<Signer>,
    /// Values merged into the contract template.
    pub data: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignerLink {
    #[serde(alias = "sign_url")]
    pub signing_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    pub id: String,
    pub status: String,
    #[serde(alias = "sign_url")]
    pub signing_url: Option<String>,
    #[serde(default)]
    pub signers: Vec<SignerLink>,
}

impl Document {
    pub fn link(&self) -> Option<String> {
        self.signing_url
            .clone()
            .or_else(|| self.signers.iter().find_map(|s| s.signing_url.clone()))
    }

    pub fn is_signed(&self) -> bool {
        matches!(self.status.as_str(), "signed" | "completed" | "closed")
    }

    pub fn is_refused(&self) -> bool {
        matches!(self.status.as_str(), "refused" | "rejected" | "canceled" | "expired")
    }
}

#[derive(Clone)]
pub struct EsignClient {
    http: reqwest::Client,
    base_url: Option<String>,
    api_key: Option<String>,
    template_id: Option<String>,
}

impl EsignClient {
    pub fn new(config: &EsignConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            template_id: config.template_id.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some() && self.api_key.is_some()
    }

    fn endpoint(&self, path: &str) -> Result<(String, &str), EsignError> {
        let base = self.base_url.as_deref().ok_or(EsignError::NotConfigured("ESIGN_BASE_URL"))?;
        let key = self.api_key.as_deref().ok_or(EsignError::NotConfigured("ESIGN_API_KEY"))?;
        Ok((format!("{base}{path}"), key))
    }

    async fn read_document(resp: reqwest::Response) -> Result<Document, EsignError> {
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(EsignError::Api {
                status: status.as_u16(),
                body,
            });
        }

        // Some accounts wrap the document in { "document": {...} }.
        let value: Value = serde_json::from_str(&body)
            .map_err(|e| EsignError::InvalidResponse(format!("{e}; body={body}")))?;
        let doc = value.get("document").cloned().unwrap_or(value);
        serde_json::from_value::<Document>(doc)
            .map_err(|e| EsignError::InvalidResponse(format!("{e}; body={body}")))
    }

    pub async fn create_document(
        &self,
        beneficiary_id: &str,
        signer: Signer,
        data: Value,
    ) -> Result<Document, EsignError> {
        let (url, key) = self.endpoint("/documents")?;
        let req = CreateDocumentRequest {
            external_id: beneficiary_id.to_string(),
            template_id: self.template_id.clone(),
            signers: vec![signer],
            data,
        };

        let resp = self.http.post(url).bearer_auth(key).json(&req).send().await?;
        Self::read_document(resp).await
    }

    pub async fn get_document(&self, document_id: &str) -> Result<Document, EsignError> {
        let (url, key) = self.endpoint(&format!("/documents/{document_id}"))?;
        let resp = self.http.get(url).bearer_auth(key).send().await?;
        Self::read_document(resp).await
    }
}
