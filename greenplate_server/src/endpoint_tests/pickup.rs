use actix_web::{http::StatusCode, web, web::ServiceConfig};
use greenplate_engine::{
    db_types::{OrderId, OrderStatusType},
    events::EventProducers,
    traits::LedgerError,
    OrderFlowApi,
};
use serde_json::json;

use super::{
    helpers::{bearer, post_request, sample_order, staff, STALL},
    mocks::{MockGateway, MockLedger},
};
use crate::routes::VerifyPickupRoute;

fn configure(ledger: MockLedger) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg: &mut ServiceConfig| {
        let api = OrderFlowApi::new(ledger, MockGateway::new(), EventProducers::default(), 50);
        cfg.service(VerifyPickupRoute::<MockLedger, MockGateway>::new()).app_data(web::Data::new(api));
    }
}

fn pickup_body(order_id: &str, code: &str) -> serde_json::Value {
    json!({ "order_id": order_id, "pickup_code": code })
}

#[actix_web::test]
async fn pickup_by_non_staff_is_forbidden() {
    let mut ledger = MockLedger::new();
    ledger.expect_fetch_staff_profile().returning(|_| Ok(None));
    let token = bearer("stu-1");
    let (status, _) = post_request(
        Some(&token),
        "/staff/orders/verify-pickup",
        pickup_body("gp-000000000001", "0042"),
        configure(ledger),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn pickup_by_staff_from_another_stall_is_forbidden() {
    let mut ledger = MockLedger::new();
    ledger.expect_fetch_staff_profile().returning(|uid| Ok(Some(staff(uid, "stall-other"))));
    ledger
        .expect_fetch_order_by_order_id()
        .returning(|id| Ok(Some(sample_order(id.as_str(), "stu-1", OrderStatusType::Paid))));
    let token = bearer("staff-1");
    let (status, body) = post_request(
        Some(&token),
        "/staff/orders/verify-pickup",
        pickup_body("gp-000000000001", "0042"),
        configure(ledger),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().unwrap().contains("cannot act on orders"));
}

#[actix_web::test]
async fn pickup_with_wrong_code_is_rejected() {
    let mut ledger = MockLedger::new();
    ledger.expect_fetch_staff_profile().returning(|uid| Ok(Some(staff(uid, STALL))));
    ledger
        .expect_fetch_order_by_order_id()
        .returning(|id| Ok(Some(sample_order(id.as_str(), "stu-1", OrderStatusType::Paid))));
    ledger
        .expect_claim_order()
        .withf(|_, code, _| code == "9999")
        .returning(|id, _, _| Err(LedgerError::PickupCodeMismatch(id.clone())));
    let token = bearer("staff-1");
    let (status, _) = post_request(
        Some(&token),
        "/staff/orders/verify-pickup",
        pickup_body("gp-000000000001", "9999"),
        configure(ledger),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn pickup_with_matching_code_claims_the_order() {
    let mut ledger = MockLedger::new();
    ledger.expect_fetch_staff_profile().returning(|uid| Ok(Some(staff(uid, STALL))));
    ledger
        .expect_fetch_order_by_order_id()
        .returning(|id| Ok(Some(sample_order(id.as_str(), "stu-1", OrderStatusType::Ready))));
    ledger.expect_claim_order().withf(|id, code, s| {
        id == &OrderId("gp-000000000001".to_string()) && code == "0042" && s.stall_id == STALL
    }).returning(|id, _, s| {
        let mut order = sample_order(id.as_str(), "stu-1", OrderStatusType::Claimed);
        order.handled_by = Some(s.email.clone());
        order.picked_up_at = Some(chrono::Utc::now());
        Ok(order)
    });
    let token = bearer("staff-1");
    let (status, body) = post_request(
        Some(&token),
        "/staff/orders/verify-pickup",
        pickup_body("gp-000000000001", "0042"),
        configure(ledger),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CLAIMED");
    assert_eq!(body["handled_by"], "staff-1@college.edu");
}
