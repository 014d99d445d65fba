use std::collections::HashMap;

use gp_common::Paise;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A payment intent ("order" in Razorpay terminology). Created before the buyer is shown the
/// payment form; its id ties all later payment and webhook traffic back to us.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub amount: Paise,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub notes: Notes,
}

/// Gateway-side payment lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Created,
    Authorized,
    Captured,
    Refunded,
    Failed,
}

/// The `notes` field on gateway entities is a free-form string map, except that the gateway
/// serialises an *empty* map as an empty JSON list. Model both shapes so deserialization never
/// trips over it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Notes {
    Map(HashMap<String, String>),
    List(Vec<Value>),
}

impl Default for Notes {
    fn default() -> Self {
        Notes::List(Vec::new())
    }
}

impl Notes {
    pub fn get(&self, key: &str) -> Option<&str> {
        match self {
            Notes::Map(map) => map.get(key).map(String::as_str),
            Notes::List(_) => None,
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Notes::Map(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEntity {
    pub id: String,
    #[serde(default)]
    pub order_id: Option<String>,
    pub amount: Paise,
    pub currency: String,
    pub status: PaymentStatus,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub notes: Notes,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl PaymentEntity {
    /// True if the funds are held but not yet settled to the merchant.
    pub fn is_authorized_only(&self) -> bool {
        self.status == PaymentStatus::Authorized
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundEntity {
    pub id: String,
    pub payment_id: String,
    pub amount: Paise,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub notes: Notes,
    /// Bank reference number for the reversal, once the bank has assigned one.
    #[serde(default)]
    pub acquirer_data: Option<Value>,
}

/// The envelope the gateway POSTs to the webhook endpoint. Entities arrive one level down,
/// wrapped in `{ "entity": ... }` objects keyed by type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    pub event: String,
    #[serde(default)]
    pub payload: WebhookPayload,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub payment: Option<WrappedEntity<PaymentEntity>>,
    #[serde(default)]
    pub refund: Option<WrappedEntity<RefundEntity>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WrappedEntity<T> {
    pub entity: T,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn notes_accept_empty_list_shape() {
        let notes: Notes = serde_json::from_str("[]").unwrap();
        assert!(notes.get("order_id").is_none());
        let notes: Notes = serde_json::from_str(r#"{"order_id":"gp-1234"}"#).unwrap();
        assert_eq!(notes.get("order_id"), Some("gp-1234"));
    }

    #[test]
    fn webhook_envelope_parses_payment_captured() {
        let body = r#"{
            "event": "payment.captured",
            "payload": {
                "payment": {
                    "entity": {
                        "id": "pay_abc123",
                        "order_id": "order_xyz",
                        "amount": 12000,
                        "currency": "INR",
                        "status": "captured",
                        "notes": {"order_id": "gp-77aa"}
                    }
                }
            }
        }"#;
        let envelope: WebhookEnvelope = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.event, "payment.captured");
        let payment = envelope.payload.payment.unwrap().entity;
        assert_eq!(payment.status, PaymentStatus::Captured);
        assert_eq!(payment.notes.get("order_id"), Some("gp-77aa"));
    }

    #[test]
    fn unknown_events_still_parse() {
        let body = r#"{"event": "invoice.expired", "payload": {}}"#;
        let envelope: WebhookEnvelope = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.event, "invoice.expired");
        assert!(envelope.payload.payment.is_none());
    }
}
