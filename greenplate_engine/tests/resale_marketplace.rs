//! Resale marketplace tests: the reservation compare-and-swap, lazy TTL expiry, and
//! finalization of resale purchases through the shared settlement path.
mod support;

use gp_common::Paise;
use greenplate_engine::{
    db_types::{OrderStatusType, OrderType, ResaleStatusType, UserProfile},
    events::EventProducers,
    order_objects::{CartLine, CheckoutRequest},
    traits::{AccountManagement, LedgerDatabase, LedgerError, SettlementOutcome},
    OrderFlowApi,
    OrderFlowError,
    ResaleApi,
    SqliteDatabase,
};
use serde_json::json;
use support::{new_test_db, seed_menu_item, seed_user, TestGateway, COLLEGE, STALL};

fn student(uid: &str) -> UserProfile {
    UserProfile {
        uid: uid.to_string(),
        email: format!("{uid}@college.edu"),
        college_id: COLLEGE.to_string(),
        cancel_count: 0,
        cancel_window_start: None,
    }
}

fn flow_api(db: &SqliteDatabase) -> OrderFlowApi<SqliteDatabase, TestGateway> {
    OrderFlowApi::new(db.clone(), TestGateway::default(), EventProducers::default(), 50)
}

fn resale_api(db: &SqliteDatabase) -> ResaleApi<SqliteDatabase, TestGateway> {
    ResaleApi::new(db.clone(), TestGateway::default(), 50)
}

/// Walk a fresh order to READY and cancel it, leaving one AVAILABLE listing on the marketplace.
async fn seed_listing(db: &SqliteDatabase, seller_uid: &str) -> greenplate_engine::db_types::ResaleId {
    seed_user(db, seller_uid).await;
    let api = flow_api(db);
    let seller = student(seller_uid);
    let request = CheckoutRequest {
        stall_id: STALL.to_string(),
        items: vec![CartLine { item_id: "m-dosa".into(), quantity: 2 }],
    };
    let instructions = api.checkout(&seller, request).await.expect("checkout failed");
    api.settle_from_webhook(&instructions.order_id, format!("pay_{seller_uid}"), json!({})).await.unwrap();
    sqlx::query("UPDATE orders SET status = 'READY' WHERE order_id = $1")
        .bind(instructions.order_id.as_str())
        .execute(db.pool())
        .await
        .unwrap();
    let outcome = api.cancel_order(&seller, &instructions.order_id, None).await.unwrap();
    outcome.listing.expect("READY cancellation must create a listing").resale_id
}

#[tokio::test]
async fn concurrent_reservations_yield_exactly_one_winner() {
    let db = new_test_db().await;
    seed_menu_item(&db, "m-dosa", "Masala Dosa", Paise::from(6_000), true).await;
    let resale_id = seed_listing(&db, "seller").await;

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..8 {
        let db = db.clone();
        let resale_id = resale_id.clone();
        tasks.spawn(async move {
            db.reserve_resale_item(&resale_id, &format!("buyer-{i}"), chrono::Utc::now()).await
        });
    }
    let mut wins = 0;
    let mut conflicts = 0;
    while let Some(result) = tasks.join_next().await {
        match result.expect("task panicked") {
            Ok(_) => wins += 1,
            Err(LedgerError::ResaleItemUnavailable(_)) => conflicts += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(wins, 1, "exactly one reservation attempt may win");
    assert_eq!(conflicts, 7);
}

#[tokio::test]
async fn expired_reservations_are_available_again_at_read_time() {
    let db = new_test_db().await;
    seed_menu_item(&db, "m-dosa", "Masala Dosa", Paise::from(6_000), true).await;
    let resale_id = seed_listing(&db, "seller").await;

    db.reserve_resale_item(&resale_id, "buyer-1", chrono::Utc::now()).await.unwrap();
    let err = db.reserve_resale_item(&resale_id, "buyer-2", chrono::Utc::now()).await.unwrap_err();
    assert!(matches!(err, LedgerError::ResaleItemUnavailable(_)));

    // age the reservation past the 5-minute TTL; the stored status stays RESERVED
    sqlx::query("UPDATE resale_items SET reserved_at = datetime('now', '-6 minutes') WHERE resale_id = $1")
        .bind(resale_id.as_str())
        .execute(db.pool())
        .await
        .unwrap();
    let item = db.fetch_resale_item(&resale_id).await.unwrap().unwrap();
    assert_eq!(item.status, ResaleStatusType::Reserved, "no background sweep reverts the status");

    let item = db.reserve_resale_item(&resale_id, "buyer-2", chrono::Utc::now()).await.unwrap();
    assert_eq!(item.reserved_by.as_deref(), Some("buyer-2"), "the takeover wins the reservation");
}

#[tokio::test]
async fn feed_shows_available_and_lapsed_reservations_only() {
    let db = new_test_db().await;
    seed_menu_item(&db, "m-dosa", "Masala Dosa", Paise::from(6_000), true).await;
    let available = seed_listing(&db, "seller-a").await;
    let fresh = seed_listing(&db, "seller-b").await;
    let lapsed = seed_listing(&db, "seller-c").await;
    let sold = seed_listing(&db, "seller-d").await;

    db.reserve_resale_item(&fresh, "buyer-1", chrono::Utc::now()).await.unwrap();
    db.reserve_resale_item(&lapsed, "buyer-2", chrono::Utc::now()).await.unwrap();
    sqlx::query("UPDATE resale_items SET reserved_at = datetime('now', '-6 minutes') WHERE resale_id = $1")
        .bind(lapsed.as_str())
        .execute(db.pool())
        .await
        .unwrap();
    sqlx::query("UPDATE resale_items SET status = 'SOLD' WHERE resale_id = $1")
        .bind(sold.as_str())
        .execute(db.pool())
        .await
        .unwrap();

    seed_user(&db, "shopper").await;
    let feed = resale_api(&db).feed(&student("shopper")).await.unwrap();
    let ids = feed.iter().map(|i| i.resale_id.clone()).collect::<Vec<_>>();
    assert!(ids.contains(&available));
    assert!(ids.contains(&lapsed), "a lapsed reservation is for sale again");
    assert!(!ids.contains(&fresh), "an active reservation is excluded");
    assert!(!ids.contains(&sold), "SOLD is terminal");
}

#[tokio::test]
async fn owners_cannot_buy_their_own_listing() {
    let db = new_test_db().await;
    seed_menu_item(&db, "m-dosa", "Masala Dosa", Paise::from(6_000), true).await;
    let resale_id = seed_listing(&db, "seller").await;

    let err = resale_api(&db).buy(&student("seller"), &resale_id).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::OwnListingPurchase));
    let item = db.fetch_resale_item(&resale_id).await.unwrap().unwrap();
    assert_eq!(item.status, ResaleStatusType::Available, "the rejected attempt must not reserve");
}

#[tokio::test]
async fn resale_purchase_settles_order_and_marks_item_sold_atomically() {
    let db = new_test_db().await;
    seed_menu_item(&db, "m-dosa", "Masala Dosa", Paise::from(6_000), true).await;
    let resale_id = seed_listing(&db, "seller").await;
    seed_user(&db, "buyer").await;

    let buyer = student("buyer");
    let instructions = resale_api(&db).buy(&buyer, &resale_id).await.unwrap();
    assert_eq!(instructions.amount, Paise::from(6_000), "half of the 120-rupee original");

    let order = db.fetch_order_by_order_id(&instructions.order_id).await.unwrap().unwrap();
    assert_eq!(order.order_type, OrderType::Resale);
    assert_eq!(order.status, OrderStatusType::Pending);
    assert_eq!(order.resale_item_id.as_ref(), Some(&resale_id));

    let api = flow_api(&db);
    let outcome = api.settle_from_webhook(&instructions.order_id, "pay_resale".into(), json!({})).await.unwrap();
    match outcome {
        SettlementOutcome::Settled { ref order, ref sold_listing } => {
            assert_eq!(order.status, OrderStatusType::Paid);
            assert!(order.pickup_code.is_some());
            let listing = sold_listing.as_ref().expect("the listing flips SOLD in the same commit");
            assert_eq!(listing.status, ResaleStatusType::Sold);
            assert_eq!(listing.sold_order_id.as_ref(), Some(&instructions.order_id));
        },
        SettlementOutcome::AlreadySettled(_) => panic!("first settlement must be new"),
    }

    // duplicate webhook delivery: no second sale, no new pickup code
    let replay = api.settle_from_webhook(&instructions.order_id, "pay_resale".into(), json!({})).await.unwrap();
    assert!(!replay.is_newly_settled());
    let item = db.fetch_resale_item(&resale_id).await.unwrap().unwrap();
    assert_eq!(item.status, ResaleStatusType::Sold);
}
