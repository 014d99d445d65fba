use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::Utc;
use gp_common::Paise;
use greenplate_engine::{
    db_types::{LineItem, OrderId, ResaleId, ResaleItem, ResaleStatusType},
    traits::{IntentHandle, LedgerError},
    ResaleApi,
};
use serde_json::json;

use super::{
    helpers::{bearer, get_request, post_request, sample_order, student, COLLEGE, STALL},
    mocks::{MockGateway, MockLedger},
};
use crate::routes::{BuyResaleItemRoute, ResaleFeedRoute};

fn listing(resale_id: &str, seller_id: &str, status: ResaleStatusType) -> ResaleItem {
    ResaleItem {
        id: 1,
        resale_id: ResaleId(resale_id.to_string()),
        order_id: OrderId("gp-000000000001".to_string()),
        seller_id: seller_id.to_string(),
        stall_id: STALL.to_string(),
        college_id: COLLEGE.to_string(),
        items: vec![LineItem {
            item_id: "m-dosa".to_string(),
            name: "Masala Dosa".to_string(),
            unit_price: Paise::from(6_000),
            quantity: 2,
        }],
        original_price: Paise::from(12_000),
        discounted_price: Paise::from(6_000),
        status,
        reserved_by: None,
        reserved_at: None,
        sold_order_id: None,
        created_at: Utc::now(),
    }
}

fn configure(ledger: MockLedger, gateway: MockGateway) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg: &mut ServiceConfig| {
        let api = ResaleApi::new(ledger, gateway, 50);
        cfg.service(ResaleFeedRoute::<MockLedger, MockGateway>::new())
            .service(BuyResaleItemRoute::<MockLedger, MockGateway>::new())
            .app_data(web::Data::new(api));
    }
}

#[actix_web::test]
async fn feed_returns_college_listings() {
    let mut ledger = MockLedger::new();
    ledger.expect_fetch_user_profile().returning(|uid| Ok(Some(student(uid))));
    ledger
        .expect_fetch_resale_feed()
        .withf(|college_id, _| college_id == COLLEGE)
        .returning(|_, _| Ok(vec![listing("rs-000000000001", "seller", ResaleStatusType::Available)]));
    let token = bearer("stu-1");
    let (status, body) = get_request(Some(&token), "/resale/feed", configure(ledger, MockGateway::new())).await;
    assert_eq!(status, StatusCode::OK);
    let items = body.as_array().expect("expected a JSON array");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["resale_id"], "rs-000000000001");
    assert_eq!(items[0]["discounted_price"], 6_000);
}

#[actix_web::test]
async fn buying_your_own_listing_is_forbidden() {
    let mut ledger = MockLedger::new();
    ledger.expect_fetch_user_profile().returning(|uid| Ok(Some(student(uid))));
    ledger
        .expect_fetch_resale_item()
        .returning(|id| Ok(Some(listing(id.as_str(), "stu-1", ResaleStatusType::Available))));
    let token = bearer("stu-1");
    let (status, _) = post_request(
        Some(&token),
        "/resale/rs-000000000001/buy",
        json!({}),
        configure(ledger, MockGateway::new()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn losing_the_reservation_race_conflicts() {
    let mut ledger = MockLedger::new();
    ledger.expect_fetch_user_profile().returning(|uid| Ok(Some(student(uid))));
    ledger
        .expect_fetch_resale_item()
        .returning(|id| Ok(Some(listing(id.as_str(), "seller", ResaleStatusType::Available))));
    ledger
        .expect_reserve_resale_item()
        .returning(|id, _, _| Err(LedgerError::ResaleItemUnavailable(id.clone())));
    let token = bearer("stu-1");
    let (status, _) = post_request(
        Some(&token),
        "/resale/rs-000000000001/buy",
        json!({}),
        configure(ledger, MockGateway::new()),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn winning_the_reservation_creates_a_resale_order() {
    let mut ledger = MockLedger::new();
    ledger.expect_fetch_user_profile().returning(|uid| Ok(Some(student(uid))));
    ledger
        .expect_fetch_resale_item()
        .returning(|id| Ok(Some(listing(id.as_str(), "seller", ResaleStatusType::Available))));
    ledger.expect_reserve_resale_item().withf(|_, buyer, _| buyer == "stu-1").returning(|id, buyer, now| {
        let mut item = listing(id.as_str(), "seller", ResaleStatusType::Reserved);
        item.reserved_by = Some(buyer.to_string());
        item.reserved_at = Some(now);
        Ok(item)
    });
    ledger.expect_insert_order().returning(|new_order| {
        let mut order =
            sample_order(new_order.order_id.as_str(), &new_order.buyer_id, greenplate_engine::db_types::OrderStatusType::Pending);
        order.total = new_order.total;
        Ok(order)
    });
    let mut gateway = MockGateway::new();
    gateway.expect_create_intent().withf(|spec| spec.amount == Paise::from(6_000)).returning(|spec| {
        Ok(IntentHandle { intent_id: "intent_resale".to_string(), amount: spec.amount, currency: spec.currency })
    });
    let token = bearer("stu-1");
    let (status, body) = post_request(
        Some(&token),
        "/resale/rs-000000000001/buy",
        json!({}),
        configure(ledger, gateway),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["intent_id"], "intent_resale");
    assert_eq!(body["amount"], 6_000);
}
