use std::fmt::Debug;

use chrono::Utc;
use gp_common::INR_CURRENCY_CODE;
use log::*;

use crate::{
    db_types::{NewOrder, OrderId, OrderType, ResaleId, ResaleItem, UserProfile},
    gpe_api::order_objects::PaymentInstructions,
    traits::{LedgerDatabase, LedgerError, PaymentGateway, PaymentIntentSpec},
    OrderFlowError,
};

/// The resale marketplace: the discounted feed, the reservation compare-and-swap, and checkout
/// of a reserved item. Finalization (order → PAID, item → SOLD) happens through the same
/// reconciliation path as any other order.
pub struct ResaleApi<B, G> {
    db: B,
    gateway: G,
    refund_policy_percent: u32,
}

impl<B, G> Debug for ResaleApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ResaleApi")
    }
}

impl<B, G> ResaleApi<B, G> {
    pub fn new(db: B, gateway: G, refund_policy_percent: u32) -> Self {
        Self { db, gateway, refund_policy_percent }
    }
}

impl<B, G> ResaleApi<B, G>
where
    B: LedgerDatabase,
    G: PaymentGateway,
{
    /// Discounted listings a student can buy right now: everything AVAILABLE in their college,
    /// plus RESERVED items whose reservation has lapsed.
    pub async fn feed(&self, user: &UserProfile) -> Result<Vec<ResaleItem>, OrderFlowError> {
        let items = self.db.fetch_resale_feed(&user.college_id, Utc::now()).await?;
        Ok(items)
    }

    /// Attempt to buy a resale item: reserve it (exactly one concurrent buyer can win), then
    /// create the RESALE order at the discounted price with a payment intent for it.
    pub async fn buy(&self, user: &UserProfile, resale_id: &ResaleId) -> Result<PaymentInstructions, OrderFlowError> {
        let item = self
            .db
            .fetch_resale_item(resale_id)
            .await?
            .ok_or_else(|| LedgerError::ResaleItemNotFound(resale_id.clone()))?;
        if item.seller_id == user.uid {
            return Err(OrderFlowError::OwnListingPurchase);
        }
        let item = self.db.reserve_resale_item(resale_id, &user.uid, Utc::now()).await?;
        info!("🏷️ Resale item {resale_id} reserved for {}", user.uid);

        let order = NewOrder {
            order_id: OrderId::random(),
            buyer_id: user.uid.clone(),
            stall_id: item.stall_id.clone(),
            college_id: item.college_id.clone(),
            items: item.items.clone(),
            total: item.discounted_price,
            order_type: OrderType::Resale,
            ready_refund_percent: self.refund_policy_percent,
            payment_intent_id: None,
            resale_item_id: Some(item.resale_id.clone()),
        };
        let spec = PaymentIntentSpec {
            amount: order.total,
            currency: INR_CURRENCY_CODE.to_string(),
            receipt: order.order_id.as_str().to_string(),
            metadata: vec![
                ("order_id".to_string(), order.order_id.as_str().to_string()),
                ("stall_id".to_string(), order.stall_id.clone()),
                ("user_uid".to_string(), user.uid.clone()),
                ("resale_id".to_string(), resale_id.as_str().to_string()),
            ],
        };
        let intent = self.gateway.create_intent(spec).await?;
        let order = self.db.insert_order(order.with_intent(intent.intent_id.clone())).await?;
        info!("🏷️ Resale order {} created for item {resale_id} at {}", order.order_id, order.total);
        Ok(PaymentInstructions {
            order_id: order.order_id,
            intent_id: intent.intent_id,
            amount: intent.amount,
            currency: intent.currency,
        })
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
