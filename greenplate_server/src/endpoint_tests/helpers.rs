use actix_web::{
    http::{header, Method, StatusCode},
    test,
    web,
    web::ServiceConfig,
    App,
};
use chrono::Utc;
use gp_common::{Paise, Secret};
use greenplate_engine::db_types::{
    LineItem,
    Order,
    OrderId,
    OrderStatusType,
    OrderType,
    StaffProfile,
    StaffRole,
    UserProfile,
};
use serde_json::Value;

use crate::{
    auth::{issue_test_token, TokenVerifier},
    config::AuthConfig,
};

pub const TEST_JWT_SECRET: &str = "endpoint-test-secret";
pub const COLLEGE: &str = "college-green";
pub const STALL: &str = "stall-dosa";

pub fn auth_config() -> AuthConfig {
    AuthConfig { jwt_secret: Secret::new(TEST_JWT_SECRET.to_string()) }
}

pub fn bearer(uid: &str) -> String {
    issue_test_token(uid, &format!("{uid}@college.edu"), TEST_JWT_SECRET, 3600)
}

pub fn expired_bearer(uid: &str) -> String {
    issue_test_token(uid, &format!("{uid}@college.edu"), TEST_JWT_SECRET, -3600)
}

pub fn student(uid: &str) -> UserProfile {
    UserProfile {
        uid: uid.to_string(),
        email: format!("{uid}@college.edu"),
        college_id: COLLEGE.to_string(),
        cancel_count: 0,
        cancel_window_start: None,
    }
}

pub fn staff(uid: &str, stall_id: &str) -> StaffProfile {
    StaffProfile {
        uid: uid.to_string(),
        email: format!("{uid}@college.edu"),
        name: Some("Asha".to_string()),
        stall_id: stall_id.to_string(),
        college_id: COLLEGE.to_string(),
        role: StaffRole::Staff,
    }
}

pub fn sample_order(order_id: &str, buyer_id: &str, status: OrderStatusType) -> Order {
    Order {
        id: 1,
        order_id: OrderId(order_id.to_string()),
        buyer_id: buyer_id.to_string(),
        stall_id: STALL.to_string(),
        college_id: COLLEGE.to_string(),
        items: vec![LineItem {
            item_id: "m-dosa".to_string(),
            name: "Masala Dosa".to_string(),
            unit_price: Paise::from(6_000),
            quantity: 1,
        }],
        total: Paise::from(6_000),
        status,
        order_type: OrderType::Normal,
        pickup_code: status.is_settled().then(|| "0042".to_string()),
        payment_intent_id: Some("intent_1".to_string()),
        payment_id: status.is_settled().then(|| "pay_1".to_string()),
        ready_refund_percent: 50,
        refund: None,
        payout: None,
        precancel_status: None,
        cancel_reason: None,
        cancelled_at: None,
        resale_item_id: None,
        picked_up_at: None,
        handled_by: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// Spin up an app with the given route configuration and fire one request at it.
pub async fn send_request<F>(
    method: Method,
    token: Option<&str>,
    path: &str,
    body: Option<Value>,
    configure: F,
) -> (StatusCode, Value)
where
    F: FnOnce(&mut ServiceConfig),
{
    let _ = env_logger::try_init();
    let app = test::init_service(
        App::new().app_data(web::Data::new(TokenVerifier::new(&auth_config()))).configure(configure),
    )
    .await;
    let mut req = test::TestRequest::with_uri(path).method(method);
    if let Some(token) = token {
        req = req.insert_header((header::AUTHORIZATION, format!("Bearer {token}")));
    }
    if let Some(body) = body {
        req = req.set_json(body);
    }
    match test::try_call_service(&app, req.to_request()).await {
        Ok(response) => {
            let status = response.status();
            let bytes = test::read_body(response).await;
            let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, body)
        },
        // Errors that never reached a handler (auth extractors, middleware) surface here.
        Err(e) => {
            let status = e.as_response_error().status_code();
            (status, serde_json::json!({ "error": e.to_string() }))
        },
    }
}

pub async fn get_request<F>(token: Option<&str>, path: &str, configure: F) -> (StatusCode, Value)
where F: FnOnce(&mut ServiceConfig) {
    send_request(Method::GET, token, path, None, configure).await
}

pub async fn post_request<F>(token: Option<&str>, path: &str, body: Value, configure: F) -> (StatusCode, Value)
where F: FnOnce(&mut ServiceConfig) {
    send_request(Method::POST, token, path, Some(body), configure).await
}
