//----------------------------------------------   Payment webhooks  --------------------------------------------
//
// The gateway delivers events at least once and in no particular order relative to the client
// confirmation path. Everything here leans on the engine's idempotent settle: replays and
// out-of-order deliveries are no-ops by construction. Transport authentication (the raw-body
// HMAC) happens in middleware before this handler ever runs.
use actix_web::{web, HttpResponse};
use greenplate_engine::{
    db_types::{OrderId, RefundStatusType},
    traits::{LedgerDatabase, LedgerError, PaymentGateway, RefundUpdate},
    OrderFlowApi,
    OrderFlowError,
};
use log::*;
use razorpay_tools::{PaymentEntity, RefundEntity, WebhookEnvelope};
use serde_json::Value;

use crate::{data_objects::JsonResponse, errors::ServerError, route};

route!(payments_webhook => Post "/payments" impl LedgerDatabase, PaymentGateway);
pub async fn payments_webhook<B, G>(
    body: web::Json<WebhookEnvelope>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: LedgerDatabase,
    G: PaymentGateway,
{
    let envelope = body.into_inner();
    trace!("🛰️ Received webhook event: {}", envelope.event);
    let result = match envelope.event.as_str() {
        "payment.captured" | "payment_link.paid" => {
            let payment = envelope
                .payload
                .payment
                .map(|w| w.entity)
                .ok_or_else(|| ServerError::ValidationError("Webhook payload carries no payment entity".to_string()))?;
            handle_payment_captured(payment, api.as_ref()).await?
        },
        "refund.processed" => {
            let refund = envelope
                .payload
                .refund
                .map(|w| w.entity)
                .ok_or_else(|| ServerError::ValidationError("Webhook payload carries no refund entity".to_string()))?;
            handle_refund_event(refund, RefundStatusType::Processed, api.as_ref()).await?
        },
        "refund.failed" => {
            let refund = envelope
                .payload
                .refund
                .map(|w| w.entity)
                .ok_or_else(|| ServerError::ValidationError("Webhook payload carries no refund entity".to_string()))?;
            handle_refund_event(refund, RefundStatusType::Failed, api.as_ref()).await?
        },
        other => {
            debug!("🛰️ Skipping unhandled webhook event: {other}");
            JsonResponse::success("Event ignored.")
        },
    };
    Ok(HttpResponse::Ok().json(result))
}

async fn handle_payment_captured<B, G>(
    payment: PaymentEntity,
    api: &OrderFlowApi<B, G>,
) -> Result<JsonResponse, ServerError>
where
    B: LedgerDatabase,
    G: PaymentGateway,
{
    let Some(order_id) = payment.notes.get("order_id").map(|s| OrderId::from(s.to_string())) else {
        info!("🛰️ Payment {} carries no order id in its notes; nothing to reconcile", payment.id);
        return Ok(JsonResponse::success("No order to reconcile."));
    };
    let raw_payload = serde_json::to_value(&payment).unwrap_or(Value::Null);
    match api.settle_from_webhook(&order_id, payment.id.clone(), raw_payload).await {
        Ok(outcome) if outcome.is_newly_settled() => {
            info!("🛰️ Payment {} reconciled order {order_id}", payment.id);
            Ok(JsonResponse::success("Order reconciled."))
        },
        Ok(_) => {
            debug!("🛰️ Duplicate delivery for order {order_id}; already settled");
            Ok(JsonResponse::success("Order already settled."))
        },
        Err(OrderFlowError::Ledger(LedgerError::OrderNotFound(_))) => {
            // A retry cannot fix an unknown order id, so report success to stop the redelivery.
            warn!("🛰️ Payment {} references unknown order {order_id}", payment.id);
            Ok(JsonResponse::failure("Unknown order."))
        },
        Err(e) => Err(e.into()),
    }
}

async fn handle_refund_event<B, G>(
    refund: RefundEntity,
    status: RefundStatusType,
    api: &OrderFlowApi<B, G>,
) -> Result<JsonResponse, ServerError>
where
    B: LedgerDatabase,
    G: PaymentGateway,
{
    let Some(order_id) = refund.notes.get("order_id").map(|s| OrderId::from(s.to_string())) else {
        info!("🛰️ Refund {} carries no order id in its notes; nothing to record", refund.id);
        return Ok(JsonResponse::success("No order to record against."));
    };
    let reference = refund
        .acquirer_data
        .as_ref()
        .and_then(|v| v.get("rrn"))
        .and_then(Value::as_str)
        .map(String::from);
    let failed_reason =
        (status == RefundStatusType::Failed).then(|| "Refund failed at the payment gateway".to_string());
    let update = RefundUpdate { status, refund_id: Some(refund.id.clone()), reference, failed_reason };
    match api.record_refund_event(&order_id, update).await {
        Ok(_) => {
            info!("🛰️ Refund {} on order {order_id} recorded as {status}", refund.id);
            Ok(JsonResponse::success("Refund recorded."))
        },
        Err(OrderFlowError::Ledger(LedgerError::OrderNotFound(_))) => {
            warn!("🛰️ Refund {} references unknown order {order_id}", refund.id);
            Ok(JsonResponse::failure("Unknown order."))
        },
        Err(e) => Err(e.into()),
    }
}
