use crate::db_types::Order;

/// Published once, when an order's payment is reconciled and it transitions to PAID. Duplicate
/// confirmations never republish.
#[derive(Debug, Clone)]
pub struct OrderPaidEvent {
    pub order: Order,
}

impl OrderPaidEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// Published when a cancellation commits. The order carries its refund and payout records.
#[derive(Debug, Clone)]
pub struct OrderCancelledEvent {
    pub order: Order,
}

impl OrderCancelledEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}
