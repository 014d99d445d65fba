use gp_common::Paise;
use serde_json::Value;
use thiserror::Error;

/// The payment-processor port. Provider-agnostic: the live adapter wraps the gateway vendor's
/// client, tests substitute a mock. The gateway holds no engine state; every call is a plain
/// blocking (awaited) round trip.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway: Clone {
    /// Register an intent to collect `spec.amount` and get back the gateway's id for it. The
    /// metadata pairs travel with the intent and return on every related payment and webhook.
    async fn create_intent(&self, spec: PaymentIntentSpec) -> Result<IntentHandle, GatewayError>;

    /// Check the signature a buyer's client presents after completing payment. Pure
    /// computation; no network round trip.
    fn verify_client_signature(&self, intent_id: &str, payment_id: &str, signature: &str) -> bool;

    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPaymentState, GatewayError>;

    /// Settle an authorized payment to the merchant. Must be called before refunding a payment
    /// that was only authorized.
    async fn capture(&self, payment_id: &str, amount: Paise) -> Result<(), GatewayError>;

    /// Request a refund. The metadata pairs travel with the refund and come back on its
    /// lifecycle webhooks, which is how those events find their order again.
    async fn refund(
        &self,
        payment_id: &str,
        amount: Paise,
        metadata: &[(String, String)],
    ) -> Result<RefundHandle, GatewayError>;
}

#[derive(Debug, Clone)]
pub struct PaymentIntentSpec {
    pub amount: Paise,
    pub currency: String,
    /// Our reference for the intent, echoed back in gateway dashboards.
    pub receipt: String,
    pub metadata: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct IntentHandle {
    pub intent_id: String,
    pub amount: Paise,
    pub currency: String,
}

#[derive(Debug, Clone)]
pub struct GatewayPaymentState {
    pub payment_id: String,
    pub amount: Paise,
    pub captured: bool,
    /// Funds held but not yet settled to the merchant; capture before refunding.
    pub authorized_only: bool,
    pub raw: Value,
}

#[derive(Debug, Clone)]
pub struct RefundHandle {
    pub refund_id: String,
}

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Payment gateway call failed: {0}")]
    CallFailed(String),
    #[error("Unexpected payment gateway response: {0}")]
    InvalidResponse(String),
}
