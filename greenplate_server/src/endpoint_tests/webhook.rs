use actix_web::{http::StatusCode, test, web, App};
use gp_common::Secret;
use greenplate_engine::{
    db_types::{OrderId, OrderStatusType, RefundStatusType},
    events::EventProducers,
    traits::SettlementOutcome,
    OrderFlowApi,
};
use razorpay_tools::helpers::hmac_hex;
use serde_json::{json, Value};

use super::{
    helpers::sample_order,
    mocks::{MockGateway, MockLedger},
};
use crate::{
    middleware::HmacMiddlewareFactory,
    server::RAZORPAY_SIGNATURE_HEADER,
    webhook_routes::PaymentsWebhookRoute,
};

const WEBHOOK_SECRET: &str = "webhook-test-secret";

/// Fire a raw body at the webhook endpoint, signing it (or not) as instructed.
async fn webhook_request(signature: Option<String>, body: String, ledger: MockLedger) -> (StatusCode, Value) {
    let _ = env_logger::try_init();
    let api = OrderFlowApi::new(ledger, MockGateway::new(), EventProducers::default(), 50);
    let app = test::init_service(
        App::new().app_data(web::Data::new(api)).service(
            web::scope("/webhook")
                .wrap(HmacMiddlewareFactory::new(
                    RAZORPAY_SIGNATURE_HEADER,
                    Secret::new(WEBHOOK_SECRET.to_string()),
                    true,
                ))
                .service(PaymentsWebhookRoute::<MockLedger, MockGateway>::new()),
        ),
    )
    .await;
    let mut req = test::TestRequest::post()
        .uri("/webhook/payments")
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body);
    if let Some(signature) = signature {
        req = req.insert_header((RAZORPAY_SIGNATURE_HEADER, signature));
    }
    match test::try_call_service(&app, req.to_request()).await {
        Ok(response) => {
            let status = response.status();
            let bytes = test::read_body(response).await;
            let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, body)
        },
        Err(e) => (e.as_response_error().status_code(), json!({ "error": e.to_string() })),
    }
}

fn captured_event(order_id: Option<&str>) -> String {
    let notes = match order_id {
        Some(order_id) => json!({ "order_id": order_id, "stall_id": "stall-dosa", "user_uid": "stu-1" }),
        None => json!([]),
    };
    json!({
        "event": "payment.captured",
        "payload": {
            "payment": {
                "entity": {
                    "id": "pay_1",
                    "order_id": "intent_1",
                    "amount": 6000,
                    "currency": "INR",
                    "status": "captured",
                    "notes": notes,
                }
            }
        }
    })
    .to_string()
}

#[actix_web::test]
async fn webhook_with_valid_signature_settles_the_order() {
    let mut ledger = MockLedger::new();
    ledger
        .expect_settle_order_payment()
        .withf(|order_id, settlement| order_id == &OrderId("gp-000000000001".into()) && settlement.payment_id == "pay_1")
        .returning(|order_id, _| {
            Ok(SettlementOutcome::Settled {
                order: sample_order(order_id.as_str(), "stu-1", OrderStatusType::Paid),
                sold_listing: None,
            })
        });
    let body = captured_event(Some("gp-000000000001"));
    let signature = hmac_hex(WEBHOOK_SECRET, body.as_bytes());
    let (status, response) = webhook_request(Some(signature), body, ledger).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["success"], true);
}

#[actix_web::test]
async fn webhook_with_invalid_signature_is_rejected_without_side_effects() {
    // no expectations on the mock: any ledger call would panic the test
    let ledger = MockLedger::new();
    let body = captured_event(Some("gp-000000000001"));
    let (status, _) = webhook_request(Some("0badc0de".repeat(8)), body, ledger).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn webhook_without_signature_is_rejected() {
    let ledger = MockLedger::new();
    let body = captured_event(Some("gp-000000000001"));
    let (status, _) = webhook_request(None, body, ledger).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn webhook_without_order_notes_is_accepted_and_ignored() {
    let ledger = MockLedger::new();
    let body = captured_event(None);
    let signature = hmac_hex(WEBHOOK_SECRET, body.as_bytes());
    let (status, response) = webhook_request(Some(signature), body, ledger).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["success"], true);
}

#[actix_web::test]
async fn unrecognized_events_are_accepted_and_ignored() {
    let ledger = MockLedger::new();
    let body = json!({ "event": "invoice.expired", "payload": {} }).to_string();
    let signature = hmac_hex(WEBHOOK_SECRET, body.as_bytes());
    let (status, response) = webhook_request(Some(signature), body, ledger).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["message"], "Event ignored.");
}

#[actix_web::test]
async fn refund_processed_updates_the_refund_record() {
    let mut ledger = MockLedger::new();
    ledger
        .expect_record_refund_update()
        .withf(|order_id, update| {
            order_id == &OrderId("gp-000000000001".into())
                && update.status == RefundStatusType::Processed
                && update.refund_id.as_deref() == Some("rfnd_1")
                && update.reference.as_deref() == Some("UTR0012345")
        })
        .returning(|order_id, _| Ok(sample_order(order_id.as_str(), "stu-1", OrderStatusType::Cancelled)));
    let body = json!({
        "event": "refund.processed",
        "payload": {
            "refund": {
                "entity": {
                    "id": "rfnd_1",
                    "payment_id": "pay_1",
                    "amount": 3000,
                    "status": "processed",
                    "notes": { "order_id": "gp-000000000001" },
                    "acquirer_data": { "rrn": "UTR0012345" }
                }
            }
        }
    })
    .to_string();
    let signature = hmac_hex(WEBHOOK_SECRET, body.as_bytes());
    let (status, response) = webhook_request(Some(signature), body, ledger).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["success"], true);
}
