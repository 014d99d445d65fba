use serde_json::Value;

use crate::db_types::{
    NewResaleItem,
    Order,
    OrderId,
    OrderStatusType,
    RefundRecord,
    RefundStatusType,
    ResaleItem,
    StaffPayout,
};

/// Everything the ledger needs to record when a payment is reconciled against an order.
#[derive(Debug, Clone)]
pub struct PaymentSettlement {
    pub payment_id: String,
    /// The gateway payload as received, kept verbatim for audits and manual reconciliation.
    pub raw_payload: Value,
}

/// Result of the idempotent settle operation. Both confirmation paths treat `AlreadySettled` as
/// success; only `Settled` carries side effects worth reacting to.
#[derive(Debug, Clone)]
pub enum SettlementOutcome {
    /// This call performed the PENDING→PAID transition.
    Settled { order: Order, sold_listing: Option<ResaleItem> },
    /// The order was already PAID or later; nothing was changed.
    AlreadySettled(Order),
}

impl SettlementOutcome {
    pub fn order(&self) -> &Order {
        match self {
            SettlementOutcome::Settled { order, .. } => order,
            SettlementOutcome::AlreadySettled(order) => order,
        }
    }

    pub fn is_newly_settled(&self) -> bool {
        matches!(self, SettlementOutcome::Settled { .. })
    }
}

/// Refund-lifecycle bookkeeping from the gateway (`refund.processed` / `refund.failed`). Only
/// touches the refund sub-record; the order status is never affected.
#[derive(Debug, Clone)]
pub struct RefundUpdate {
    pub status: RefundStatusType,
    pub refund_id: Option<String>,
    pub reference: Option<String>,
    pub failed_reason: Option<String>,
}

/// The cancellation batch, pre-computed by the flow API and committed atomically: the order
/// flips to CANCELLED with its refund and payout records, the optional resale listing is
/// created, and the requester's weekly quota is incremented (resetting an expired window), all
/// in one transaction.
#[derive(Debug, Clone)]
pub struct CancellationCommit {
    pub order_id: OrderId,
    /// The status the refund tier was computed against. If the stored status no longer matches
    /// at commit time the batch is rejected rather than committing a stale refund.
    pub expected_status: OrderStatusType,
    pub cancelled_by: String,
    pub reason: Option<String>,
    pub refund: RefundRecord,
    pub payout: StaffPayout,
    pub listing: Option<NewResaleItem>,
}

#[derive(Debug, Clone)]
pub struct CancellationOutcome {
    pub order: Order,
    pub listing: Option<ResaleItem>,
}
