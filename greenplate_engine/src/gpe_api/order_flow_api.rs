use std::{collections::HashMap, fmt::Debug};

use chrono::Utc;
use gp_common::{Paise, INR_CURRENCY_CODE};
use log::*;
use serde_json::{json, Value};

use crate::{
    db_types::{
        LineItem,
        NewOrder,
        NewResaleItem,
        Order,
        OrderId,
        OrderStatusType,
        PayoutStatusType,
        RefundRecord,
        RefundStatusType,
        StaffPayout,
        StaffProfile,
        UserProfile,
        CANCEL_QUOTA_LIMIT,
    },
    events::{EventProducers, OrderCancelledEvent, OrderPaidEvent},
    gpe_api::order_objects::{CheckoutRequest, PaymentConfirmation, PaymentInstructions},
    helpers::{refund_tier, RefundTier},
    traits::{
        CancellationCommit,
        CancellationOutcome,
        GatewayError,
        LedgerDatabase,
        LedgerError,
        PaymentGateway,
        PaymentIntentSpec,
        PaymentSettlement,
        RefundHandle,
        RefundUpdate,
        SettlementOutcome,
    },
    OrderFlowError,
};

/// `OrderFlowApi` drives the order lifecycle: checkout, the two racing payment-confirmation
/// paths, pickup verification, staff status updates and the cancellation/refund flow.
pub struct OrderFlowApi<B, G> {
    db: B,
    gateway: G,
    producers: EventProducers,
    /// Refund percentage stamped onto new orders for READY-state cancellations.
    refund_policy_percent: u32,
}

impl<B, G> Debug for OrderFlowApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B, G> OrderFlowApi<B, G> {
    pub fn new(db: B, gateway: G, producers: EventProducers, refund_policy_percent: u32) -> Self {
        Self { db, gateway, producers, refund_policy_percent }
    }
}

impl<B, G> OrderFlowApi<B, G>
where
    B: LedgerDatabase,
    G: PaymentGateway,
{
    /// Checkout: validate and price the cart server-side, obtain a payment intent carrying our
    /// order id in its metadata, and store the PENDING order.
    pub async fn checkout(
        &self,
        user: &UserProfile,
        request: CheckoutRequest,
    ) -> Result<PaymentInstructions, OrderFlowError> {
        let items = self.price_cart(&request).await?;
        let mut order = NewOrder::new(user.uid.clone(), request.stall_id, user.college_id.clone(), items)
            .with_refund_policy(self.refund_policy_percent);
        if !order.total.is_positive() {
            return Err(OrderFlowError::InvalidCart("Order total must be positive".to_string()));
        }
        let spec = PaymentIntentSpec {
            amount: order.total,
            currency: INR_CURRENCY_CODE.to_string(),
            receipt: order.order_id.as_str().to_string(),
            metadata: vec![
                ("order_id".to_string(), order.order_id.as_str().to_string()),
                ("stall_id".to_string(), order.stall_id.clone()),
                ("user_uid".to_string(), user.uid.clone()),
            ],
        };
        let intent = self.gateway.create_intent(spec).await?;
        order = order.with_intent(intent.intent_id.clone());
        let order = self.db.insert_order(order).await?;
        info!("🔄️📦️ Order {} created for {} ({})", order.order_id, user.uid, order.total);
        Ok(PaymentInstructions {
            order_id: order.order_id,
            intent_id: intent.intent_id,
            amount: intent.amount,
            currency: intent.currency,
        })
    }

    async fn price_cart(&self, request: &CheckoutRequest) -> Result<Vec<LineItem>, OrderFlowError> {
        if request.items.is_empty() {
            return Err(OrderFlowError::InvalidCart("Cart is empty".to_string()));
        }
        if request.items.iter().any(|line| line.quantity == 0) {
            return Err(OrderFlowError::InvalidCart("Item quantities must be positive".to_string()));
        }
        let ids = request.items.iter().map(|line| line.item_id.clone()).collect::<Vec<_>>();
        let menu = self.db.fetch_menu_items(&request.stall_id, &ids).await?;
        let menu = menu.into_iter().map(|m| (m.item_id.clone(), m)).collect::<HashMap<_, _>>();
        let mut items = Vec::with_capacity(request.items.len());
        for line in &request.items {
            let entry = menu
                .get(&line.item_id)
                .ok_or_else(|| OrderFlowError::InvalidCart(format!("Item {} is not on this menu", line.item_id)))?;
            if !entry.is_available {
                return Err(OrderFlowError::InvalidCart(format!("{} is currently unavailable", entry.name)));
            }
            items.push(LineItem {
                item_id: entry.item_id.clone(),
                name: entry.name.clone(),
                unit_price: entry.price,
                quantity: line.quantity,
            });
        }
        Ok(items)
    }

    /// The client confirmation path. The signature covers the gateway's ids; the order is looked
    /// up by our internal id from the payload. Safe to call any number of times.
    pub async fn verify_and_settle(
        &self,
        user: &UserProfile,
        confirmation: PaymentConfirmation,
    ) -> Result<SettlementOutcome, OrderFlowError> {
        if !self.gateway.verify_client_signature(
            &confirmation.intent_id,
            &confirmation.payment_id,
            &confirmation.signature,
        ) {
            debug!("🔄️💰️ Rejecting client confirmation for order {}: bad signature", confirmation.order_id);
            return Err(OrderFlowError::InvalidPaymentSignature);
        }
        let order = self
            .db
            .fetch_order_by_order_id(&confirmation.order_id)
            .await?
            .ok_or_else(|| LedgerError::OrderNotFound(confirmation.order_id.clone()))?;
        if order.buyer_id != user.uid {
            return Err(OrderFlowError::NotOrderOwner);
        }
        let settlement = PaymentSettlement {
            payment_id: confirmation.payment_id.clone(),
            raw_payload: json!({
                "source": "client_verify",
                "intent_id": confirmation.intent_id,
                "payment_id": confirmation.payment_id,
            }),
        };
        self.settle(&confirmation.order_id, settlement).await
    }

    /// The webhook confirmation path. Transport authentication has already happened; this is
    /// the shared idempotent transition.
    pub async fn settle_from_webhook(
        &self,
        order_id: &OrderId,
        payment_id: String,
        raw_payload: Value,
    ) -> Result<SettlementOutcome, OrderFlowError> {
        let settlement = PaymentSettlement { payment_id, raw_payload };
        self.settle(order_id, settlement).await
    }

    async fn settle(
        &self,
        order_id: &OrderId,
        settlement: PaymentSettlement,
    ) -> Result<SettlementOutcome, OrderFlowError> {
        let outcome = self.db.settle_order_payment(order_id, settlement).await?;
        match &outcome {
            SettlementOutcome::Settled { order, sold_listing } => {
                info!("🔄️💰️ Order {order_id} reconciled as PAID");
                if let Some(listing) = sold_listing {
                    info!("🔄️🏷️ Resale item {} marked SOLD by order {order_id}", listing.resale_id);
                }
                self.call_order_paid_hook(order).await;
            },
            SettlementOutcome::AlreadySettled(order) => {
                debug!("🔄️💰️ Order {order_id} was already {}; confirmation was a no-op", order.status);
            },
        }
        Ok(outcome)
    }

    /// Refund-lifecycle bookkeeping from the gateway. Terminal updates only; a cancelled order
    /// never comes back to life here.
    pub async fn record_refund_event(&self, order_id: &OrderId, update: RefundUpdate) -> Result<Order, OrderFlowError> {
        let order = self.db.record_refund_update(order_id, update).await?;
        Ok(order)
    }

    /// Pickup verification. Wrong-stall staff are rejected before the code is even compared.
    pub async fn verify_pickup(
        &self,
        staff: &StaffProfile,
        order_id: &OrderId,
        pickup_code: &str,
    ) -> Result<Order, OrderFlowError> {
        let order = self
            .db
            .fetch_order_by_order_id(order_id)
            .await?
            .ok_or_else(|| LedgerError::OrderNotFound(order_id.clone()))?;
        if order.stall_id != staff.stall_id {
            return Err(OrderFlowError::WrongStall {
                staff_stall: staff.stall_id.clone(),
                order_stall: order.stall_id,
            });
        }
        let order = self.db.claim_order(order_id, pickup_code, staff).await?;
        info!("🔄️🤝️ Order {order_id} picked up; verified by {}", staff.email);
        Ok(order)
    }

    /// Staff-driven status updates (READY, COMPLETED), validated against the lifecycle graph.
    pub async fn staff_update_status(
        &self,
        staff: &StaffProfile,
        order_id: &OrderId,
        new_status: OrderStatusType,
    ) -> Result<Order, OrderFlowError> {
        let order = self
            .db
            .fetch_order_by_order_id(order_id)
            .await?
            .ok_or_else(|| LedgerError::OrderNotFound(order_id.clone()))?;
        if order.stall_id != staff.stall_id {
            return Err(OrderFlowError::WrongStall {
                staff_stall: staff.stall_id.clone(),
                order_stall: order.stall_id,
            });
        }
        let order = self.db.update_order_status(order_id, new_status).await?;
        Ok(order)
    }

    /// Cancel an order, computing the tiered refund and enforcing the weekly quota.
    ///
    /// The gateway leg (capture-if-authorized, then refund) runs before the batch commits. A
    /// gateway failure does not abort the cancellation: the order still flips to CANCELLED with
    /// `refund.status = FAILED`, surfacing the discrepancy instead of leaving the buyer with an
    /// uncancellable order.
    pub async fn cancel_order(
        &self,
        user: &UserProfile,
        order_id: &OrderId,
        reason: Option<String>,
    ) -> Result<CancellationOutcome, OrderFlowError> {
        let order = self
            .db
            .fetch_order_by_order_id(order_id)
            .await?
            .ok_or_else(|| LedgerError::OrderNotFound(order_id.clone()))?;
        if order.buyer_id != user.uid {
            return Err(OrderFlowError::NotOrderOwner);
        }
        if order.status.is_terminal() {
            return Err(OrderFlowError::NotCancellable(order.status));
        }
        let now = Utc::now();
        if user.effective_cancel_count(now) >= CANCEL_QUOTA_LIMIT {
            return Err(LedgerError::CancellationQuotaExceeded.into());
        }
        let tier = refund_tier(order.status, order.total, order.ready_refund_percent);
        let refund = match (&order.payment_id, tier.amount.is_positive()) {
            (Some(payment_id), true) => self.execute_gateway_refund(&order, payment_id, tier).await,
            _ => RefundRecord {
                eligible: tier.amount.is_positive(),
                amount: tier.amount,
                refund_type: tier.refund_type,
                status: RefundStatusType::NotRequired,
                refund_id: None,
                reference: None,
                failed_reason: None,
                refunded_at: None,
            },
        };
        let listing = (order.status == OrderStatusType::Ready).then(|| NewResaleItem::for_cancelled_order(&order));
        let payout = StaffPayout { amount: order.total - refund.amount, status: PayoutStatusType::Pending };
        let commit = CancellationCommit {
            order_id: order_id.clone(),
            expected_status: order.status,
            cancelled_by: user.uid.clone(),
            reason,
            refund,
            payout,
            listing,
        };
        let outcome = self.db.commit_cancellation(commit).await.map_err(|e| {
            if matches!(e, LedgerError::StaleOrderState(_)) {
                // The refund may already have been issued at the gateway by this point. Shout,
                // so the discrepancy reaches manual reconciliation.
                error!(
                    "🔄️❌️ Order {order_id} changed state while cancellation was in flight; any issued refund needs \
                     manual review"
                );
            }
            e
        })?;
        info!(
            "🔄️❌️ Order {order_id} cancelled. Refund {} ({}), payout {}",
            outcome.order.refund.as_ref().map(|r| r.amount).unwrap_or_default(),
            outcome.order.refund.as_ref().map(|r| r.status.to_string()).unwrap_or_default(),
            outcome.order.payout.as_ref().map(|p| p.amount).unwrap_or_default(),
        );
        self.call_order_cancelled_hook(&outcome.order).await;
        Ok(outcome)
    }

    async fn execute_gateway_refund(&self, order: &Order, payment_id: &str, tier: RefundTier) -> RefundRecord {
        let mut record = RefundRecord {
            eligible: true,
            amount: tier.amount,
            refund_type: tier.refund_type,
            status: RefundStatusType::Initiated,
            refund_id: None,
            reference: None,
            failed_reason: None,
            refunded_at: None,
        };
        match self.try_gateway_refund(order, payment_id, tier.amount).await {
            Ok(handle) => {
                debug!("🔄️💸️ Refund {} initiated for order {}", handle.refund_id, order.order_id);
                record.refund_id = Some(handle.refund_id);
            },
            Err(e) => {
                error!(
                    "🔄️💸️ Gateway refund for order {} failed: {e}. The cancellation proceeds; the refund is flagged \
                     for manual reconciliation.",
                    order.order_id
                );
                record.status = RefundStatusType::Failed;
                record.failed_reason = Some(e.to_string());
            },
        }
        record
    }

    async fn try_gateway_refund(
        &self,
        order: &Order,
        payment_id: &str,
        amount: Paise,
    ) -> Result<RefundHandle, GatewayError> {
        let payment = self.gateway.fetch_payment(payment_id).await?;
        if payment.authorized_only {
            debug!("🔄️💸️ Payment {payment_id} is only authorized; capturing {} before refunding", order.total);
            self.gateway.capture(payment_id, order.total).await?;
        }
        let metadata = [
            ("order_id".to_string(), order.order_id.as_str().to_string()),
            ("reason".to_string(), "order cancellation".to_string()),
        ];
        self.gateway.refund(payment_id, amount, &metadata).await
    }

    async fn call_order_paid_hook(&self, order: &Order) {
        for emitter in &self.producers.order_paid_producer {
            let event = OrderPaidEvent::new(order.clone());
            emitter.publish_event(event).await;
        }
    }

    async fn call_order_cancelled_hook(&self, order: &Order) {
        for emitter in &self.producers.order_cancelled_producer {
            let event = OrderCancelledEvent::new(order.clone());
            emitter.publish_event(event).await;
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
