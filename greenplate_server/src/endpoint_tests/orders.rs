use actix_web::{http::StatusCode, web, web::ServiceConfig};
use greenplate_engine::{db_types::OrderStatusType, events::EventProducers, AccountApi, OrderFlowApi};
use serde_json::json;

use super::{
    helpers::{bearer, expired_bearer, get_request, post_request, sample_order, student, STALL},
    mocks::{MockGateway, MockLedger},
};
use crate::routes::{CancelOrderRoute, CheckoutRoute, MyOrdersRoute};

fn configure_my_orders(ledger: MockLedger) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg: &mut ServiceConfig| {
        cfg.service(MyOrdersRoute::<MockLedger>::new()).app_data(web::Data::new(AccountApi::new(ledger)));
    }
}

fn configure_order_flow(ledger: MockLedger, gateway: MockGateway) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg: &mut ServiceConfig| {
        let api = OrderFlowApi::new(ledger, gateway, EventProducers::default(), 50);
        cfg.service(CheckoutRoute::<MockLedger, MockGateway>::new())
            .service(CancelOrderRoute::<MockLedger, MockGateway>::new())
            .app_data(web::Data::new(api));
    }
}

#[actix_web::test]
async fn fetch_my_orders_without_token() {
    let ledger = MockLedger::new();
    let (status, _) = get_request(None, "/orders", configure_my_orders(ledger)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn fetch_my_orders_with_expired_token() {
    let ledger = MockLedger::new();
    let token = expired_bearer("stu-1");
    let (status, _) = get_request(Some(&token), "/orders", configure_my_orders(ledger)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn fetch_my_orders() {
    let mut ledger = MockLedger::new();
    ledger.expect_fetch_user_profile().returning(|uid| Ok(Some(student(uid))));
    ledger
        .expect_fetch_orders_for_buyer()
        .withf(|buyer_id| buyer_id == "stu-1")
        .returning(|_| Ok(vec![sample_order("gp-000000000001", "stu-1", OrderStatusType::Paid)]));
    let token = bearer("stu-1");
    let (status, body) = get_request(Some(&token), "/orders", configure_my_orders(ledger)).await;
    assert_eq!(status, StatusCode::OK);
    let orders = body.as_array().expect("expected a JSON array");
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["order_id"], "gp-000000000001");
    assert_eq!(orders[0]["status"], "PAID");
}

#[actix_web::test]
async fn checkout_from_unknown_account() {
    let mut ledger = MockLedger::new();
    ledger.expect_fetch_user_profile().returning(|_| Ok(None));
    let gateway = MockGateway::new();
    let token = bearer("ghost");
    let body = json!({ "stall_id": STALL, "items": [{"item_id": "m-dosa", "quantity": 1}] });
    let (status, _) = post_request(Some(&token), "/order/checkout", body, configure_order_flow(ledger, gateway)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn checkout_with_empty_cart() {
    let mut ledger = MockLedger::new();
    ledger.expect_fetch_user_profile().returning(|uid| Ok(Some(student(uid))));
    let gateway = MockGateway::new();
    let token = bearer("stu-1");
    let body = json!({ "stall_id": STALL, "items": [] });
    let (status, body) =
        post_request(Some(&token), "/order/checkout", body, configure_order_flow(ledger, gateway)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Cart is empty"));
}

#[actix_web::test]
async fn cancel_terminal_order_conflicts() {
    let mut ledger = MockLedger::new();
    ledger.expect_fetch_user_profile().returning(|uid| Ok(Some(student(uid))));
    ledger
        .expect_fetch_order_by_order_id()
        .returning(|id| Ok(Some(sample_order(id.as_str(), "stu-1", OrderStatusType::Claimed))));
    let gateway = MockGateway::new();
    let token = bearer("stu-1");
    let (status, body) = post_request(
        Some(&token),
        "/order/gp-000000000001/cancel",
        json!({ "reason": "too late" }),
        configure_order_flow(ledger, gateway),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("CLAIMED"));
}

#[actix_web::test]
async fn cancel_someone_elses_order_is_forbidden() {
    let mut ledger = MockLedger::new();
    ledger.expect_fetch_user_profile().returning(|uid| Ok(Some(student(uid))));
    ledger
        .expect_fetch_order_by_order_id()
        .returning(|id| Ok(Some(sample_order(id.as_str(), "someone-else", OrderStatusType::Paid))));
    let gateway = MockGateway::new();
    let token = bearer("stu-1");
    let (status, _) = post_request(
        Some(&token),
        "/order/gp-000000000001/cancel",
        json!({}),
        configure_order_flow(ledger, gateway),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
