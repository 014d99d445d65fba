//! The live payment-gateway adapter: maps the engine's provider-agnostic gateway port onto the
//! Razorpay REST client. Holds no state beyond the HTTP client.
use gp_common::Paise;
use greenplate_engine::traits::{
    GatewayError,
    GatewayPaymentState,
    IntentHandle,
    PaymentGateway,
    PaymentIntentSpec,
    RefundHandle,
};
use razorpay_tools::{helpers, Notes, PaymentStatus, RazorpayApi, RazorpayApiError, RazorpayConfig};
use serde_json::Value;

use crate::errors::ServerError;

#[derive(Clone)]
pub struct RazorpayGateway {
    api: RazorpayApi,
}

impl RazorpayGateway {
    pub fn new(config: RazorpayConfig) -> Result<Self, ServerError> {
        let api = RazorpayApi::new(config).map_err(|e| ServerError::InitializeError(e.to_string()))?;
        Ok(Self { api })
    }
}

fn gateway_error(e: RazorpayApiError) -> GatewayError {
    match e {
        RazorpayApiError::JsonError(_) | RazorpayApiError::RestResponseError(_) => {
            GatewayError::InvalidResponse(e.to_string())
        },
        _ => GatewayError::CallFailed(e.to_string()),
    }
}

impl PaymentGateway for RazorpayGateway {
    async fn create_intent(&self, spec: PaymentIntentSpec) -> Result<IntentHandle, GatewayError> {
        let notes = Notes::from_pairs(spec.metadata);
        let intent = self
            .api
            .create_intent(spec.amount, &spec.currency, &spec.receipt, notes)
            .await
            .map_err(gateway_error)?;
        Ok(IntentHandle { intent_id: intent.id, amount: intent.amount, currency: intent.currency })
    }

    fn verify_client_signature(&self, intent_id: &str, payment_id: &str, signature: &str) -> bool {
        helpers::verify_payment_signature(self.api.key_secret(), intent_id, payment_id, signature)
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPaymentState, GatewayError> {
        let payment = self.api.fetch_payment(payment_id).await.map_err(gateway_error)?;
        let raw = serde_json::to_value(&payment).unwrap_or(Value::Null);
        Ok(GatewayPaymentState {
            payment_id: payment.id,
            amount: payment.amount,
            captured: payment.status == PaymentStatus::Captured,
            authorized_only: payment.status == PaymentStatus::Authorized,
            raw,
        })
    }

    async fn capture(&self, payment_id: &str, amount: Paise) -> Result<(), GatewayError> {
        self.api.capture(payment_id, amount).await.map(|_| ()).map_err(gateway_error)
    }

    async fn refund(
        &self,
        payment_id: &str,
        amount: Paise,
        metadata: &[(String, String)],
    ) -> Result<RefundHandle, GatewayError> {
        let notes = Notes::from_pairs(metadata.iter().cloned());
        let refund = self.api.refund(payment_id, amount, notes).await.map_err(gateway_error)?;
        Ok(RefundHandle { refund_id: refund.id })
    }
}
