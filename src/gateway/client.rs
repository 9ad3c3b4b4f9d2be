// src/gateway/client.rs
//
// Minimal client for the payment gateway public API (Vindi v1).
// Auth: HTTP Basic with the private API key as user and an empty password.
// Card tokenization goes to /public/payment_profiles with the public key, so
// card numbers are only ever held in memory for the length of one request.

use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};
use std::fmt;
use utoipa::ToSchema;

use super::errors::GatewayError;
use crate::config::GatewayConfig;
use crate::validation::{card_brand, only_digits};

/// Gateway ids arrive as JSON numbers; they are kept as strings locally.
fn string_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("unexpected id: {other}"))),
    }
}

/// Sends numeric ids as numbers, anything else verbatim.
fn id_value(id: &str) -> Value {
    match id.parse::<i64>() {
        Ok(n) => json!(n),
        Err(_) => json!(id),
    }
}

#[derive(Clone, Deserialize, ToSchema)]
pub struct CardData {
    pub holder_name: String,
    pub number: String,
    pub expiry_month: u32,
    pub expiry_year: u32,
    pub cvv: String,
}

impl fmt::Debug for CardData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = only_digits(&self.number);
        let last4 = digits.get(digits.len().saturating_sub(4)..).unwrap_or("");
        f.debug_struct("CardData")
            .field("holder_name", &self.holder_name)
            .field("number", &format!("****{last4}"))
            .field("expiry_month", &self.expiry_month)
            .field("expiry_year", &self.expiry_year)
            .finish_non_exhaustive()
    }
}

impl CardData {
    fn expiration(&self) -> String {
        let year = if self.expiry_year < 100 { 2000 + self.expiry_year } else { self.expiry_year };
        format!("{:02}/{year}", self.expiry_month)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayCustomer {
    #[serde(deserialize_with = "string_id")]
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub registry_code: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewCustomer {
    pub name: String,
    pub email: String,
    pub registry_code: String,
    /// Our beneficiary id or CPF, echoed back in webhooks as `customer.code`.
    pub code: Option<String>,
    pub phone: Option<String>,
    pub address: Option<CustomerAddress>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerAddress {
    pub street: String,
    pub number: String,
    pub additional_details: Option<String>,
    pub zipcode: String,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub country: String,
}

#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub plan_id: String,
    pub customer_id: String,
    pub payment_method_code: String,
    pub gateway_token: Option<String>,
    pub code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySubscription {
    #[serde(deserialize_with = "string_id")]
    pub id: String,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LastTransaction {
    pub status: Option<String>,
    pub gateway_message: Option<String>,
    pub gateway_response_code: Option<String>,
    #[serde(default)]
    pub gateway_response_fields: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayCharge {
    #[serde(deserialize_with = "string_id")]
    pub id: String,
    pub status: Option<String>,
    pub print_url: Option<String>,
    #[serde(default)]
    pub last_transaction: Option<LastTransaction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayBill {
    #[serde(deserialize_with = "string_id")]
    pub id: String,
    pub status: Option<String>,
    pub url: Option<String>,
    pub amount: Option<Value>,
    #[serde(default)]
    pub charges: Vec<GatewayCharge>,
}

impl GatewayBill {
    fn last_transaction(&self) -> Option<&LastTransaction> {
        self.charges.first().and_then(|c| c.last_transaction.as_ref())
    }

    /// The PIX "copia e cola" code, when the charge is a PIX charge.
    pub fn pix_code(&self) -> Option<String> {
        let fields = self.last_transaction()?.gateway_response_fields.as_ref()?;
        fields
            .get("qrcode_original_path")
            .or_else(|| fields.get("qr_code"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }

    pub fn pix_qr_code_url(&self) -> Option<String> {
        let fields = self.last_transaction()?.gateway_response_fields.as_ref()?;
        fields.get("qrcode_path").and_then(|v| v.as_str()).map(str::to_string)
    }

    /// Link the customer uses to pay: hosted bill page, or the bank slip print url.
    pub fn checkout_url(&self) -> Option<String> {
        self.url
            .clone()
            .or_else(|| self.charges.first().and_then(|c| c.print_url.clone()))
    }

    /// `Some` when the first charge was refused by the acquirer.
    pub fn rejection(&self) -> Option<GatewayError> {
        let charge = self.charges.first()?;
        let tx = charge.last_transaction.clone().unwrap_or_default();
        let rejected = charge.status.as_deref() == Some("rejected")
            || matches!(tx.status.as_deref(), Some("rejected") | Some("failure"));
        if !rejected {
            return None;
        }
        Some(GatewayError::Rejected {
            code: tx.gateway_response_code,
            message: tx.gateway_message.unwrap_or_else(|| "charge rejected".to_string()),
        })
    }

    pub fn is_paid(&self) -> bool {
        self.status.as_deref() == Some("paid")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedSubscription {
    pub subscription: GatewaySubscription,
    pub bill: Option<GatewayBill>,
}

#[derive(Debug, Deserialize)]
struct CustomersEnvelope {
    #[serde(default)]
    customers: Vec<GatewayCustomer>,
}

#[derive(Debug, Deserialize)]
struct CustomerEnvelope {
    customer: GatewayCustomer,
}

#[derive(Debug, Deserialize)]
struct PaymentProfileEnvelope {
    payment_profile: PaymentProfileToken,
}

#[derive(Debug, Deserialize)]
struct PaymentProfileToken {
    gateway_token: String,
}

#[derive(Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    public_key: Option<String>,
}

impl GatewayClient {
    pub fn new(config: &GatewayConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            public_key: config.public_key.clone(),
        }
    }

    fn api_key(&self) -> Result<&str, GatewayError> {
        self.api_key.as_deref().ok_or(GatewayError::NotConfigured("GATEWAY_API_KEY"))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, GatewayError> {
        let resp = req.send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(GatewayError::Api {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str::<T>(&body)
            .map_err(|e| GatewayError::InvalidResponse(format!("{e}; body={body}")))
    }

    async fn search_customers(&self, query: &str) -> Result<Vec<GatewayCustomer>, GatewayError> {
        let req = self
            .http
            .get(self.url("/customers"))
            .basic_auth(self.api_key()?, Some(""))
            .query(&[("query", query), ("per_page", "1")]);
        let envelope: CustomersEnvelope = self.send(req).await?;
        Ok(envelope.customers)
    }

    /// Looks the customer up by CPF first, then by e-mail. Archived customers are skipped.
    pub async fn find_customer(
        &self,
        cpf: &str,
        email: &str,
    ) -> Result<Option<GatewayCustomer>, GatewayError> {
        let by_cpf = self.search_customers(&format!("registry_code:{}", only_digits(cpf))).await?;
        let active = |c: &GatewayCustomer| c.status.as_deref() != Some("archived");
        if let Some(found) = by_cpf.into_iter().find(active) {
            return Ok(Some(found));
        }

        let by_email = self.search_customers(&format!("email:\"{}\"", email.trim())).await?;
        Ok(by_email.into_iter().find(active))
    }

    pub async fn create_customer(&self, customer: &NewCustomer) -> Result<GatewayCustomer, GatewayError> {
        let mut body = json!({
            "name": customer.name,
            "email": customer.email,
            "registry_code": only_digits(&customer.registry_code),
        });
        if let Some(code) = &customer.code {
            body["code"] = json!(code);
        }
        if let Some(phone) = &customer.phone {
            body["phones"] = json!([{ "phone_type": "mobile", "number": format!("55{}", only_digits(phone)) }]);
        }
        if let Some(address) = &customer.address {
            body["address"] = json!(address);
        }

        let req = self
            .http
            .post(self.url("/customers"))
            .basic_auth(self.api_key()?, Some(""))
            .json(&body);
        let envelope: CustomerEnvelope = self.send(req).await?;
        Ok(envelope.customer)
    }

    pub async fn find_or_create_customer(
        &self,
        customer: &NewCustomer,
    ) -> Result<GatewayCustomer, GatewayError> {
        if let Some(existing) = self.find_customer(&customer.registry_code, &customer.email).await? {
            log::info!("gateway customer reused id={}", existing.id);
            return Ok(existing);
        }
        let created = self.create_customer(customer).await?;
        log::info!("gateway customer created id={}", created.id);
        Ok(created)
    }

    /// Hosted tokenization: returns the opaque `gateway_token` for the card.
    pub async fn tokenize_card(&self, card: &CardData) -> Result<String, GatewayError> {
        let public_key = self
            .public_key
            .as_deref()
            .ok_or(GatewayError::NotConfigured("GATEWAY_PUBLIC_KEY"))?;

        let body = json!({
            "holder_name": card.holder_name.trim(),
            "card_expiration": card.expiration(),
            "card_number": only_digits(&card.number),
            "card_cvv": card.cvv,
            "payment_method_code": "credit_card",
            "payment_company_code": card_brand(&card.number),
        });

        let req = self
            .http
            .post(self.url("/public/payment_profiles"))
            .basic_auth(public_key, Some(""))
            .json(&body);
        let envelope: PaymentProfileEnvelope = self.send(req).await?;
        Ok(envelope.payment_profile.gateway_token)
    }

    pub async fn create_subscription(
        &self,
        sub: &NewSubscription,
    ) -> Result<CreatedSubscription, GatewayError> {
        let mut body = json!({
            "plan_id": id_value(&sub.plan_id),
            "customer_id": id_value(&sub.customer_id),
            "payment_method_code": sub.payment_method_code,
        });
        if let Some(token) = &sub.gateway_token {
            body["payment_profile"] = json!({ "gateway_token": token });
        }
        if let Some(code) = &sub.code {
            body["code"] = json!(code);
        }

        let req = self
            .http
            .post(self.url("/subscriptions"))
            .basic_auth(self.api_key()?, Some(""))
            .json(&body);
        self.send(req).await
    }

    pub async fn cancel_subscription(&self, subscription_id: &str) -> Result<(), GatewayError> {
        let req = self
            .http
            .delete(self.url(&format!("/subscriptions/{subscription_id}")))
            .basic_auth(self.api_key()?, Some(""))
            .query(&[("cancel_bills", "true")]);
        let _: Value = self.send(req).await?;
        Ok(())
    }
}
