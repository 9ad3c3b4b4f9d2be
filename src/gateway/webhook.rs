// src/gateway/webhook.rs
//
// Parsing of gateway webhook deliveries. Payload shape:
// { "event": { "id"?, "type": "bill_paid", "created_at": "...", "data": { "bill": {...} } } }
// Some proxies re-post it form-encoded, so both bodies are accepted.

use hmac::{Hmac, Mac};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookKind {
    BillPaid,
    /// `bill_canceled`, `bill_failed`, `charge_rejected`.
    PaymentFailed,
    ChargeRefunded,
    SubscriptionCanceled,
    Test,
    Other(String),
}

impl WebhookKind {
    pub fn from_type(event_type: &str) -> Self {
        match event_type {
            "bill_paid" => WebhookKind::BillPaid,
            "bill_canceled" | "bill_failed" | "charge_rejected" => WebhookKind::PaymentFailed,
            "charge_refunded" => WebhookKind::ChargeRefunded,
            "subscription_canceled" => WebhookKind::SubscriptionCanceled,
            "test" => WebhookKind::Test,
            other => WebhookKind::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NormalizedEvent {
    pub event_id: String,
    pub event_type: String,
    pub kind: WebhookKind,
    pub created_at: Option<String>,
    pub bill_id: Option<String>,
    pub bill_status: Option<String>,
    pub subscription_id: Option<String>,
    pub customer_id: Option<String>,
    pub customer_code: Option<String>,
    pub amount: Option<String>,
    pub gateway_message: Option<String>,
    pub raw: Value,
}

/// Gateway ids may be numbers or strings.
fn id_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Accepts a JSON body, or a form body whose fields are flat keys or a single
/// `payload`/`event` field holding the JSON document.
pub fn parse_webhook_body(body: &[u8]) -> Result<Value, String> {
    if let Ok(value) = serde_json::from_slice::<Value>(body) {
        if value.is_object() {
            return Ok(value);
        }
    }

    let pairs: Vec<(String, String)> =
        serde_urlencoded::from_bytes(body).map_err(|e| format!("invalid webhook body: {e}"))?;
    if pairs.is_empty() {
        return Err("empty webhook body".to_string());
    }

    for (key, val) in &pairs {
        if key == "payload" || key == "event" {
            if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(val) {
                return Ok(Value::Object(obj));
            }
        }
    }

    let mut map = Map::new();
    for (key, val) in pairs {
        map.insert(key, Value::String(val));
    }
    Ok(Value::Object(map))
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

pub fn sign_hmac_sha256_hex(secret: &str, data: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check of a hex HMAC-SHA256 signature over the raw body.
pub fn verify_signature(secret: &str, body: &[u8], signature_hex: &str) -> bool {
    let signature_hex = signature_hex.trim();
    let signature_hex = signature_hex.strip_prefix("sha256=").unwrap_or(signature_hex);
    let Ok(expected) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Constant-time check of a shared-secret token: both values are MACed under
/// the secret and the digests compared with `verify_slice`.
pub fn token_matches(secret: &str, token: &str) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(token.as_bytes());
    let provided = mac.finalize().into_bytes();
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(secret.as_bytes());
    mac.verify_slice(&provided).is_ok()
}

/// Flattens the nested gateway payload and derives the idempotency key.
///
/// `event.id` wins when the gateway sends one. Otherwise the key is
/// `type:object-id:created_at`, and as a last resort the SHA-256 of the body.
pub fn normalize_payload(raw: Value, body: &[u8]) -> NormalizedEvent {
    let event = raw.get("event").unwrap_or(&raw);
    let event_type = text(event.get("type"))
        .or_else(|| text(event.get("event_type")))
        .unwrap_or_else(|| "unknown".to_string());
    let created_at = text(event.get("created_at"));
    let data = event.get("data").unwrap_or(event);

    let charge = data.get("charge");
    let bill = data
        .get("bill")
        .or_else(|| charge.and_then(|c| c.get("bill")));
    let subscription = data
        .get("subscription")
        .or_else(|| bill.and_then(|b| b.get("subscription")));
    let customer = bill
        .and_then(|b| b.get("customer"))
        .or_else(|| subscription.and_then(|s| s.get("customer")))
        .or_else(|| charge.and_then(|c| c.get("customer")))
        .or_else(|| data.get("customer"));

    let bill_id = id_string(bill.and_then(|b| b.get("id")));
    let subscription_id = id_string(subscription.and_then(|s| s.get("id")));
    let charge_id = id_string(charge.and_then(|c| c.get("id")));

    let gateway_message = charge
        .and_then(|c| c.get("last_transaction"))
        .and_then(|t| text(t.get("gateway_message")));

    let object_id = charge_id
        .clone()
        .or_else(|| bill_id.clone())
        .or_else(|| subscription_id.clone());

    let event_id = match (text(event.get("id")), &object_id, &created_at) {
        (Some(id), _, _) => id,
        (None, Some(object_id), Some(created_at)) => format!("{event_type}:{object_id}:{created_at}"),
        _ => sha256_hex(body),
    };

    NormalizedEvent {
        event_id,
        kind: WebhookKind::from_type(&event_type),
        event_type,
        created_at,
        bill_status: text(bill.and_then(|b| b.get("status"))),
        amount: text(bill.and_then(|b| b.get("amount"))),
        bill_id,
        subscription_id,
        customer_id: id_string(customer.and_then(|c| c.get("id"))),
        customer_code: text(customer.and_then(|c| c.get("code"))),
        gateway_message,
        raw: raw.clone(),
    }
}
