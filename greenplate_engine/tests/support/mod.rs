//! Shared fixtures for the engine integration tests.
#![allow(dead_code)]

use gp_common::Paise;
use greenplate_engine::{
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    traits::{GatewayError, GatewayPaymentState, IntentHandle, PaymentGateway, PaymentIntentSpec, RefundHandle},
    SqliteDatabase,
};
use serde_json::json;

pub const COLLEGE: &str = "college-green";
pub const STALL: &str = "stall-dosa";

pub async fn new_test_db() -> SqliteDatabase {
    let _ = env_logger::try_init();
    let url = random_db_path();
    prepare_test_env(&url).await
}

pub async fn seed_user(db: &SqliteDatabase, uid: &str) {
    sqlx::query("INSERT INTO users (uid, email, college_id) VALUES ($1, $2, $3)")
        .bind(uid)
        .bind(format!("{uid}@college.edu"))
        .bind(COLLEGE)
        .execute(db.pool())
        .await
        .expect("Error seeding user");
}

pub async fn seed_staff(db: &SqliteDatabase, uid: &str, stall_id: &str) {
    sqlx::query("INSERT INTO staffs (uid, email, name, stall_id, college_id, role) VALUES ($1, $2, $3, $4, $5, 'staff')")
        .bind(uid)
        .bind(format!("{uid}@college.edu"))
        .bind(uid)
        .bind(stall_id)
        .bind(COLLEGE)
        .execute(db.pool())
        .await
        .expect("Error seeding staff");
}

pub async fn seed_menu_item(db: &SqliteDatabase, item_id: &str, name: &str, price: Paise, available: bool) {
    sqlx::query("INSERT INTO menu_items (item_id, stall_id, college_id, name, price, is_available) VALUES ($1, $2, $3, $4, $5, $6)")
        .bind(item_id)
        .bind(STALL)
        .bind(COLLEGE)
        .bind(name)
        .bind(price.value())
        .bind(i64::from(available))
        .execute(db.pool())
        .await
        .expect("Error seeding menu item");
}

/// A deterministic in-process stand-in for the payment gateway. Signatures are valid when they
/// follow the `sig:{intent}:{payment}` convention; refund behaviour is switchable per test.
#[derive(Clone, Default)]
pub struct TestGateway {
    pub payment_authorized_only: bool,
    pub fail_refunds: bool,
}

impl TestGateway {
    pub fn valid_signature(intent_id: &str, payment_id: &str) -> String {
        format!("sig:{intent_id}:{payment_id}")
    }
}

impl PaymentGateway for TestGateway {
    async fn create_intent(&self, spec: PaymentIntentSpec) -> Result<IntentHandle, GatewayError> {
        Ok(IntentHandle {
            intent_id: format!("intent_{}", spec.receipt),
            amount: spec.amount,
            currency: spec.currency,
        })
    }

    fn verify_client_signature(&self, intent_id: &str, payment_id: &str, signature: &str) -> bool {
        signature == Self::valid_signature(intent_id, payment_id)
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPaymentState, GatewayError> {
        Ok(GatewayPaymentState {
            payment_id: payment_id.to_string(),
            amount: Paise::from(0),
            captured: !self.payment_authorized_only,
            authorized_only: self.payment_authorized_only,
            raw: json!({ "id": payment_id }),
        })
    }

    async fn capture(&self, _payment_id: &str, _amount: Paise) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn refund(
        &self,
        payment_id: &str,
        _amount: Paise,
        _metadata: &[(String, String)],
    ) -> Result<RefundHandle, GatewayError> {
        if self.fail_refunds {
            Err(GatewayError::CallFailed("gateway is down".to_string()))
        } else {
            Ok(RefundHandle { refund_id: format!("rfnd_{payment_id}") })
        }
    }
}
