//! End-to-end engine tests: checkout, the racing confirmation paths, pickup and cancellation,
//! all against a real SQLite ledger.
mod support;

use gp_common::Paise;
use greenplate_engine::{
    db_types::{OrderStatusType, RefundStatusType, RefundType, StaffProfile, StaffRole, UserProfile},
    events::EventProducers,
    order_objects::{CartLine, CheckoutRequest, PaymentConfirmation, PaymentInstructions},
    traits::{AccountManagement, LedgerError, SettlementOutcome},
    OrderFlowApi,
    OrderFlowError,
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

fn staff_member(stall_id: &str) -> StaffProfile {
    StaffProfile {
        uid: "staff-1".to_string(),
        email: "staff-1@college.edu".to_string(),
        name: Some("Asha".to_string()),
        stall_id: stall_id.to_string(),
        college_id: COLLEGE.to_string(),
        role: StaffRole::Staff,
    }
}

fn flow_api(db: &SqliteDatabase, gateway: TestGateway) -> OrderFlowApi<SqliteDatabase, TestGateway> {
    OrderFlowApi::new(db.clone(), gateway, EventProducers::default(), 50)
}

async fn seed_standard_menu(db: &SqliteDatabase) {
    seed_menu_item(db, "m-dosa", "Masala Dosa", Paise::from(6_000), true).await;
    seed_menu_item(db, "m-chai", "Cutting Chai", Paise::from(2_000), true).await;
    seed_menu_item(db, "m-off", "Seasonal Special", Paise::from(9_000), false).await;
}

async fn checkout_order(
    api: &OrderFlowApi<SqliteDatabase, TestGateway>,
    user: &UserProfile,
) -> PaymentInstructions {
    let request = CheckoutRequest {
        stall_id: STALL.to_string(),
        items: vec![CartLine { item_id: "m-dosa".into(), quantity: 1 }, CartLine {
            item_id: "m-chai".into(),
            quantity: 2,
        }],
    };
    api.checkout(user, request).await.expect("checkout failed")
}

#[tokio::test]
async fn checkout_prices_cart_server_side() {
    let db = new_test_db().await;
    seed_user(&db, "stu-1").await;
    seed_standard_menu(&db).await;
    let api = flow_api(&db, TestGateway::default());
    let instructions = checkout_order(&api, &student("stu-1")).await;

    // 1 dosa + 2 chai = 60 + 40 rupees
    assert_eq!(instructions.amount, Paise::from(10_000));
    let order = db.fetch_order_by_order_id(&instructions.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Pending);
    assert_eq!(order.total, Paise::from(10_000));
    assert_eq!(order.payment_intent_id.as_deref(), Some(instructions.intent_id.as_str()));
    assert!(order.pickup_code.is_none(), "no pickup code before payment");
    assert_eq!(order.ready_refund_percent, 50);
}

#[tokio::test]
async fn checkout_rejects_bad_carts() {
    let db = new_test_db().await;
    seed_user(&db, "stu-1").await;
    seed_standard_menu(&db).await;
    let api = flow_api(&db, TestGateway::default());
    let user = student("stu-1");

    let empty = CheckoutRequest { stall_id: STALL.to_string(), items: vec![] };
    assert!(matches!(api.checkout(&user, empty).await, Err(OrderFlowError::InvalidCart(_))));

    let unknown = CheckoutRequest {
        stall_id: STALL.to_string(),
        items: vec![CartLine { item_id: "m-nope".into(), quantity: 1 }],
    };
    assert!(matches!(api.checkout(&user, unknown).await, Err(OrderFlowError::InvalidCart(_))));

    let unavailable = CheckoutRequest {
        stall_id: STALL.to_string(),
        items: vec![CartLine { item_id: "m-off".into(), quantity: 1 }],
    };
    assert!(matches!(api.checkout(&user, unavailable).await, Err(OrderFlowError::InvalidCart(_))));
}

#[tokio::test]
async fn webhook_settle_is_idempotent() {
    let db = new_test_db().await;
    seed_user(&db, "stu-1").await;
    seed_standard_menu(&db).await;
    let api = flow_api(&db, TestGateway::default());
    let instructions = checkout_order(&api, &student("stu-1")).await;

    let payload = json!({ "id": "pay_1", "status": "captured" });
    let first = api
        .settle_from_webhook(&instructions.order_id, "pay_1".into(), payload.clone())
        .await
        .expect("first settle failed");
    assert!(first.is_newly_settled());
    let code = first.order().pickup_code.clone().expect("pickup code must be set at PAID");

    let second = api
        .settle_from_webhook(&instructions.order_id, "pay_1".into(), payload)
        .await
        .expect("second settle failed");
    assert!(!second.is_newly_settled(), "duplicate delivery must be a no-op");
    assert_eq!(second.order().pickup_code.as_ref(), Some(&code), "pickup code is assigned exactly once");
    assert_eq!(second.order().status, OrderStatusType::Paid);
}

#[tokio::test]
async fn client_verify_and_webhook_commute() {
    let db = new_test_db().await;
    seed_user(&db, "stu-1").await;
    seed_standard_menu(&db).await;
    let api = flow_api(&db, TestGateway::default());
    let user = student("stu-1");

    // client first, webhook second
    let a = checkout_order(&api, &user).await;
    let confirmation = PaymentConfirmation {
        order_id: a.order_id.clone(),
        intent_id: a.intent_id.clone(),
        payment_id: "pay_a".into(),
        signature: TestGateway::valid_signature(&a.intent_id, "pay_a"),
    };
    let outcome = api.verify_and_settle(&user, confirmation).await.unwrap();
    assert!(outcome.is_newly_settled());
    let replay = api.settle_from_webhook(&a.order_id, "pay_a".into(), json!({"id": "pay_a"})).await.unwrap();
    assert!(!replay.is_newly_settled());

    // webhook first, client second
    let b = checkout_order(&api, &user).await;
    let outcome = api.settle_from_webhook(&b.order_id, "pay_b".into(), json!({"id": "pay_b"})).await.unwrap();
    assert!(outcome.is_newly_settled());
    let confirmation = PaymentConfirmation {
        order_id: b.order_id.clone(),
        intent_id: b.intent_id.clone(),
        payment_id: "pay_b".into(),
        signature: TestGateway::valid_signature(&b.intent_id, "pay_b"),
    };
    let replay = api.verify_and_settle(&user, confirmation).await.unwrap();
    assert!(!replay.is_newly_settled());
    assert_eq!(replay.order().status, OrderStatusType::Paid);
}

#[tokio::test]
async fn client_verify_rejects_bad_signature_without_mutation() {
    let db = new_test_db().await;
    seed_user(&db, "stu-1").await;
    seed_standard_menu(&db).await;
    let api = flow_api(&db, TestGateway::default());
    let user = student("stu-1");
    let instructions = checkout_order(&api, &user).await;

    let confirmation = PaymentConfirmation {
        order_id: instructions.order_id.clone(),
        intent_id: instructions.intent_id.clone(),
        payment_id: "pay_x".into(),
        signature: "sig:forged".into(),
    };
    let err = api.verify_and_settle(&user, confirmation).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::InvalidPaymentSignature));
    let order = db.fetch_order_by_order_id(&instructions.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Pending, "rejected confirmation must not touch the order");
}

#[tokio::test]
async fn pickup_verification_gates_on_stall_and_code() {
    let db = new_test_db().await;
    seed_user(&db, "stu-1").await;
    seed_standard_menu(&db).await;
    let api = flow_api(&db, TestGateway::default());
    let user = student("stu-1");
    let instructions = checkout_order(&api, &user).await;
    let outcome = api.settle_from_webhook(&instructions.order_id, "pay_1".into(), json!({})).await.unwrap();
    let code = outcome.order().pickup_code.clone().unwrap();

    // wrong stall is an authorization problem, rejected before the code is compared
    let outsider = staff_member("stall-other");
    let err = api.verify_pickup(&outsider, &instructions.order_id, &code).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::WrongStall { .. }));

    // right stall, wrong code
    let staff = staff_member(STALL);
    let err = api.verify_pickup(&staff, &instructions.order_id, "9999").await.unwrap_err();
    assert!(matches!(err, OrderFlowError::Ledger(LedgerError::PickupCodeMismatch(_))));
    let order = db.fetch_order_by_order_id(&instructions.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Paid, "failed pickup attempts leave the order alone");

    // right stall, right code
    let order = api.verify_pickup(&staff, &instructions.order_id, &code).await.unwrap();
    assert_eq!(order.status, OrderStatusType::Claimed);
    assert_eq!(order.handled_by.as_deref(), Some("staff-1@college.edu"));
    assert!(order.picked_up_at.is_some());

    // a second claim attempt hits the terminal state
    let err = api.verify_pickup(&staff, &instructions.order_id, &code).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::Ledger(LedgerError::TransitionForbidden { .. })));
}

#[tokio::test]
async fn staff_status_updates_follow_the_graph() {
    let db = new_test_db().await;
    seed_user(&db, "stu-1").await;
    seed_standard_menu(&db).await;
    let api = flow_api(&db, TestGateway::default());
    let user = student("stu-1");
    let staff = staff_member(STALL);
    let instructions = checkout_order(&api, &user).await;

    // PENDING → READY skips payment and must fail
    let err = api.staff_update_status(&staff, &instructions.order_id, OrderStatusType::Ready).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::Ledger(LedgerError::TransitionForbidden { .. })));

    let outcome = api.settle_from_webhook(&instructions.order_id, "pay_1".into(), json!({})).await.unwrap();
    let code = outcome.order().pickup_code.clone().unwrap();
    let order = api.staff_update_status(&staff, &instructions.order_id, OrderStatusType::Ready).await.unwrap();
    assert_eq!(order.status, OrderStatusType::Ready);

    // COMPLETED only follows CLAIMED
    let err = api.staff_update_status(&staff, &instructions.order_id, OrderStatusType::Completed).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::Ledger(LedgerError::TransitionForbidden { .. })));
    api.verify_pickup(&staff, &instructions.order_id, &code).await.unwrap();
    let order = api.staff_update_status(&staff, &instructions.order_id, OrderStatusType::Completed).await.unwrap();
    assert_eq!(order.status, OrderStatusType::Completed);
}

#[tokio::test]
async fn cancelling_pending_order_refunds_in_full_without_gateway() {
    let db = new_test_db().await;
    seed_user(&db, "stu-1").await;
    seed_standard_menu(&db).await;
    let api = flow_api(&db, TestGateway::default());
    let user = student("stu-1");
    let instructions = checkout_order(&api, &user).await;

    let outcome = api.cancel_order(&user, &instructions.order_id, Some("changed my mind".into())).await.unwrap();
    let order = outcome.order;
    assert_eq!(order.status, OrderStatusType::Cancelled);
    assert_eq!(order.precancel_status, Some(OrderStatusType::Pending));
    let refund = order.refund.expect("refund record must be present");
    assert_eq!(refund.amount, Paise::from(10_000));
    assert_eq!(refund.refund_type, RefundType::FullRefund);
    // nothing was ever captured, so there is nothing to move at the gateway
    assert_eq!(refund.status, RefundStatusType::NotRequired);
    assert!(outcome.listing.is_none(), "PENDING cancellations never spawn listings");
}

#[tokio::test]
async fn cancelling_paid_order_initiates_full_refund() {
    let db = new_test_db().await;
    seed_user(&db, "stu-1").await;
    seed_standard_menu(&db).await;
    let api = flow_api(&db, TestGateway::default());
    let user = student("stu-1");
    let instructions = checkout_order(&api, &user).await;
    api.settle_from_webhook(&instructions.order_id, "pay_1".into(), json!({})).await.unwrap();

    let outcome = api.cancel_order(&user, &instructions.order_id, None).await.unwrap();
    let refund = outcome.order.refund.expect("refund record must be present");
    assert_eq!(refund.amount, Paise::from(10_000));
    assert_eq!(refund.refund_type, RefundType::FullRefund);
    assert_eq!(refund.status, RefundStatusType::Initiated);
    assert_eq!(refund.refund_id.as_deref(), Some("rfnd_pay_1"));
    let payout = outcome.order.payout.expect("payout record must be present");
    assert_eq!(payout.amount, Paise::from(0));
    assert!(outcome.listing.is_none());
}

#[tokio::test]
async fn cancelling_ready_order_splits_refund_and_spawns_listing() {
    let db = new_test_db().await;
    seed_user(&db, "stu-1").await;
    seed_standard_menu(&db).await;
    let api = flow_api(&db, TestGateway::default());
    let user = student("stu-1");
    let staff = staff_member(STALL);
    let instructions = checkout_order(&api, &user).await;
    api.settle_from_webhook(&instructions.order_id, "pay_1".into(), json!({})).await.unwrap();
    api.staff_update_status(&staff, &instructions.order_id, OrderStatusType::Ready).await.unwrap();

    let outcome = api.cancel_order(&user, &instructions.order_id, None).await.unwrap();
    let refund = outcome.order.refund.clone().expect("refund record must be present");
    assert_eq!(refund.amount, Paise::from(5_000), "READY refunds at the 50% policy");
    assert_eq!(refund.refund_type, RefundType::PartialRefund);
    assert_eq!(refund.status, RefundStatusType::Initiated);
    let payout = outcome.order.payout.expect("payout record must be present");
    assert_eq!(payout.amount, Paise::from(5_000), "the stall keeps the rest");

    let listing = outcome.listing.expect("READY cancellations re-list the food");
    assert_eq!(listing.original_price, Paise::from(10_000));
    assert_eq!(listing.discounted_price, Paise::from(5_000));
    assert_eq!(listing.seller_id, "stu-1");
    assert_eq!(outcome.order.resale_item_id.as_ref(), Some(&listing.resale_id));
}

#[tokio::test]
async fn gateway_failure_downgrades_refund_but_cancellation_commits() {
    let db = new_test_db().await;
    seed_user(&db, "stu-1").await;
    seed_standard_menu(&db).await;
    let api = flow_api(&db, TestGateway { fail_refunds: true, ..TestGateway::default() });
    let user = student("stu-1");
    let instructions = checkout_order(&api, &user).await;
    api.settle_from_webhook(&instructions.order_id, "pay_1".into(), json!({})).await.unwrap();

    let outcome = api.cancel_order(&user, &instructions.order_id, None).await.expect("cancellation must not fail");
    assert_eq!(outcome.order.status, OrderStatusType::Cancelled);
    let refund = outcome.order.refund.expect("refund record must be present");
    assert_eq!(refund.status, RefundStatusType::Failed);
    assert!(refund.failed_reason.is_some());
}

#[tokio::test]
async fn authorized_payments_are_captured_before_refunding() {
    let db = new_test_db().await;
    seed_user(&db, "stu-1").await;
    seed_standard_menu(&db).await;
    let api = flow_api(&db, TestGateway { payment_authorized_only: true, ..TestGateway::default() });
    let user = student("stu-1");
    let instructions = checkout_order(&api, &user).await;
    api.settle_from_webhook(&instructions.order_id, "pay_1".into(), json!({})).await.unwrap();

    let outcome = api.cancel_order(&user, &instructions.order_id, None).await.unwrap();
    let refund = outcome.order.refund.expect("refund record must be present");
    assert_eq!(refund.status, RefundStatusType::Initiated);
}

#[tokio::test]
async fn terminal_orders_cannot_be_cancelled() {
    let db = new_test_db().await;
    seed_user(&db, "stu-1").await;
    seed_standard_menu(&db).await;
    let api = flow_api(&db, TestGateway::default());
    let user = student("stu-1");
    let staff = staff_member(STALL);
    let instructions = checkout_order(&api, &user).await;
    let outcome = api.settle_from_webhook(&instructions.order_id, "pay_1".into(), json!({})).await.unwrap();
    let code = outcome.order().pickup_code.clone().unwrap();
    api.verify_pickup(&staff, &instructions.order_id, &code).await.unwrap();

    let err = api.cancel_order(&user, &instructions.order_id, None).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::NotCancellable(OrderStatusType::Claimed)));
    let order = db.fetch_order_by_order_id(&instructions.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Claimed, "failed cancellation must not mutate");
    assert!(order.refund.is_none());
}

#[tokio::test]
async fn weekly_cancellation_quota_is_enforced_and_resets() {
    let db = new_test_db().await;
    seed_user(&db, "stu-1").await;
    seed_standard_menu(&db).await;
    let api = flow_api(&db, TestGateway::default());

    for _ in 0..3 {
        let user = db.fetch_user_profile("stu-1").await.unwrap().unwrap();
        let instructions = checkout_order(&api, &user).await;
        api.cancel_order(&user, &instructions.order_id, None).await.expect("cancellation within quota");
    }

    let user = db.fetch_user_profile("stu-1").await.unwrap().unwrap();
    assert_eq!(user.cancel_count, 3);
    let instructions = checkout_order(&api, &user).await;
    let err = api.cancel_order(&user, &instructions.order_id, None).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::Ledger(LedgerError::CancellationQuotaExceeded)));

    // age the window past seven days; the next cancellation starts a fresh count
    sqlx::query("UPDATE users SET cancel_window_start = datetime('now', '-8 days') WHERE uid = 'stu-1'")
        .execute(db.pool())
        .await
        .unwrap();
    let user = db.fetch_user_profile("stu-1").await.unwrap().unwrap();
    api.cancel_order(&user, &instructions.order_id, None).await.expect("quota resets with the window");
    let user = db.fetch_user_profile("stu-1").await.unwrap().unwrap();
    assert_eq!(user.cancel_count, 1);
}

#[tokio::test]
async fn refund_webhooks_update_bookkeeping_without_resurrecting() {
    let db = new_test_db().await;
    seed_user(&db, "stu-1").await;
    seed_standard_menu(&db).await;
    let api = flow_api(&db, TestGateway::default());
    let user = student("stu-1");
    let instructions = checkout_order(&api, &user).await;
    api.settle_from_webhook(&instructions.order_id, "pay_1".into(), json!({})).await.unwrap();
    api.cancel_order(&user, &instructions.order_id, None).await.unwrap();

    let update = greenplate_engine::traits::RefundUpdate {
        status: RefundStatusType::Processed,
        refund_id: Some("rfnd_pay_1".into()),
        reference: Some("UTR0012345".into()),
        failed_reason: None,
    };
    let order = api.record_refund_event(&instructions.order_id, update).await.unwrap();
    assert_eq!(order.status, OrderStatusType::Cancelled, "refund bookkeeping never changes the status");
    let refund = order.refund.unwrap();
    assert_eq!(refund.status, RefundStatusType::Processed);
    assert_eq!(refund.reference.as_deref(), Some("UTR0012345"));
    assert!(refund.refunded_at.is_some());
}

#[tokio::test]
async fn settlement_outcome_exposes_the_order_either_way() {
    let db = new_test_db().await;
    seed_user(&db, "stu-1").await;
    seed_standard_menu(&db).await;
    let api = flow_api(&db, TestGateway::default());
    let instructions = checkout_order(&api, &student("stu-1")).await;
    let outcome = api.settle_from_webhook(&instructions.order_id, "pay_1".into(), json!({})).await.unwrap();
    match outcome {
        SettlementOutcome::Settled { ref order, ref sold_listing } => {
            assert_eq!(order.order_id, instructions.order_id);
            assert!(sold_listing.is_none(), "normal orders have no linked listing");
        },
        SettlementOutcome::AlreadySettled(_) => panic!("first settlement must be new"),
    }
}
