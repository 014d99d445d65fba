use std::sync::Arc;

use gp_common::Paise;
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;

use crate::{
    data_objects::{Notes, PaymentEntity, PaymentIntent, RefundEntity},
    RazorpayApiError,
    RazorpayConfig,
};

#[derive(Clone)]
pub struct RazorpayApi {
    config: RazorpayConfig,
    client: Arc<Client>,
}

impl RazorpayApi {
    pub fn new(config: RazorpayConfig) -> Result<Self, RazorpayApiError> {
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| RazorpayApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn key_secret(&self) -> &str {
        self.config.key_secret.reveal()
    }

    pub fn webhook_secret(&self) -> &str {
        self.config.webhook_secret.reveal()
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T, RazorpayApiError> {
        let url = format!("{}{path}", self.config.base_url);
        trace!("Sending REST query: {url}");
        let mut req = self
            .client
            .request(method, url)
            .basic_auth(&self.config.key_id, Some(self.config.key_secret.reveal()));
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| RazorpayApiError::RestResponseError(e.to_string()))?;
        if response.status().is_success() {
            trace!("REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| RazorpayApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| RazorpayApiError::RestResponseError(e.to_string()))?;
            Err(RazorpayApiError::QueryError { status, message })
        }
    }

    /// Create a payment intent for the given amount. `notes` travel with the intent and come
    /// back on every payment entity and webhook event related to it.
    pub async fn create_intent(
        &self,
        amount: Paise,
        currency: &str,
        receipt: &str,
        notes: Notes,
    ) -> Result<PaymentIntent, RazorpayApiError> {
        let body = json!({
            "amount": amount.value(),
            "currency": currency,
            "receipt": receipt,
            "notes": notes,
        });
        let intent = self.rest_query::<PaymentIntent, _>(Method::POST, "/orders", Some(body)).await?;
        debug!("💳️ Created payment intent {} for {}", intent.id, amount);
        Ok(intent)
    }

    pub async fn fetch_payment(&self, payment_id: &str) -> Result<PaymentEntity, RazorpayApiError> {
        self.rest_query::<PaymentEntity, ()>(Method::GET, &format!("/payments/{payment_id}"), None).await
    }

    /// Capture an authorized payment for the given amount. A no-op at the gateway if the payment
    /// was auto-captured.
    pub async fn capture(&self, payment_id: &str, amount: Paise) -> Result<PaymentEntity, RazorpayApiError> {
        let body = json!({ "amount": amount.value(), "currency": gp_common::INR_CURRENCY_CODE });
        let payment =
            self.rest_query::<PaymentEntity, _>(Method::POST, &format!("/payments/{payment_id}/capture"), Some(body)).await?;
        debug!("💳️ Captured payment {payment_id} for {amount}");
        Ok(payment)
    }

    pub async fn refund(
        &self,
        payment_id: &str,
        amount: Paise,
        notes: Notes,
    ) -> Result<RefundEntity, RazorpayApiError> {
        let body = json!({ "amount": amount.value(), "notes": notes });
        let refund =
            self.rest_query::<RefundEntity, _>(Method::POST, &format!("/payments/{payment_id}/refund"), Some(body)).await?;
        debug!("💳️ Refund {} issued against payment {payment_id} for {amount}", refund.id);
        Ok(refund)
    }
}
