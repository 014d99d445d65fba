use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderStatusType, ResaleId, ResaleItem, StaffProfile},
    traits::{AccountManagement, CancellationCommit, CancellationOutcome, PaymentSettlement, RefundUpdate, SettlementOutcome},
};

/// The storage port for the order ledger.
///
/// Implementations must provide serializable read-modify-write semantics for the operations
/// documented as atomic: concurrent invocations behave as if executed one after another, and a
/// detected write conflict is retried internally rather than surfaced. Three operations carry
/// the engine's entire coordination load: [`settle_order_payment`](Self::settle_order_payment),
/// [`reserve_resale_item`](Self::reserve_resale_item) and
/// [`commit_cancellation`](Self::commit_cancellation).
#[allow(async_fn_in_trait)]
pub trait LedgerDatabase: Clone + AccountManagement {
    /// The URL of the backing database.
    fn url(&self) -> &str;

    /// Store a brand-new PENDING order. Fails if the order id already exists.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, LedgerError>;

    /// The idempotent PENDING→PAID transition, shared by the client-verify and webhook paths.
    ///
    /// In one atomic read-modify-write: re-read the order; if it is already PAID or later,
    /// change nothing and report [`SettlementOutcome::AlreadySettled`]. Otherwise assign a fresh
    /// pickup code, record the external payment id and raw payload, set the status to PAID and,
    /// for RESALE orders, mark the linked resale item SOLD with a back-reference to this order —
    /// all in the same commit, so a crash cannot leave one side updated without the other.
    async fn settle_order_payment(
        &self,
        order_id: &OrderId,
        settlement: PaymentSettlement,
    ) -> Result<SettlementOutcome, LedgerError>;

    /// Apply refund-lifecycle bookkeeping to an order's refund sub-record. Never changes the
    /// order status; a cancelled order stays cancelled no matter what the gateway reports.
    async fn record_refund_update(&self, order_id: &OrderId, update: RefundUpdate) -> Result<Order, LedgerError>;

    /// A staff-driven status update (READY, COMPLETED). The transition is validated against the
    /// lifecycle graph inside the write, so a racing update cannot sneak an illegal edge in.
    async fn update_order_status(&self, order_id: &OrderId, new_status: OrderStatusType) -> Result<Order, LedgerError>;

    /// Hand the order over: PAID/READY → CLAIMED, gated on the pickup code matching exactly.
    /// Stamps the pickup time and the handling staff member. The caller has already verified
    /// that the staff member belongs to the order's stall.
    async fn claim_order(&self, order_id: &OrderId, pickup_code: &str, staff: &StaffProfile)
        -> Result<Order, LedgerError>;

    /// Commit a cancellation batch: order → CANCELLED with refund/payout records, the optional
    /// resale listing, and the quota increment, atomically. Rejects with
    /// [`LedgerError::StaleOrderState`] if the order status no longer matches
    /// [`CancellationCommit::expected_status`], and with
    /// [`LedgerError::CancellationQuotaExceeded`] if the quota re-check fails inside the
    /// transaction.
    async fn commit_cancellation(&self, commit: CancellationCommit) -> Result<CancellationOutcome, LedgerError>;

    /// The marketplace's only compare-and-swap: atomically re-read the item and, if it is
    /// AVAILABLE or holds an expired reservation at `now`, write RESERVED/`buyer_id`/`now`.
    /// Concurrent attempts on one item yield exactly one success; the rest get
    /// [`LedgerError::ResaleItemUnavailable`].
    async fn reserve_resale_item(
        &self,
        resale_id: &ResaleId,
        buyer_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ResaleItem, LedgerError>;
}

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("The requested order (internal id {0}) does not exist")]
    OrderIdNotFound(i64),
    #[error("Cannot insert order, since it already exists with id {0}")]
    OrderAlreadyExists(OrderId),
    #[error("Order {order_id} cannot move from {from} to {to}")]
    TransitionForbidden { order_id: OrderId, from: OrderStatusType, to: OrderStatusType },
    #[error("The presented pickup code does not match order {0}")]
    PickupCodeMismatch(OrderId),
    #[error("The requested resale item {0} does not exist")]
    ResaleItemNotFound(ResaleId),
    #[error("Resale item {0} is not available for reservation")]
    ResaleItemUnavailable(ResaleId),
    #[error("The requested user {0} does not exist")]
    UserNotFound(String),
    #[error("Weekly cancellation limit reached")]
    CancellationQuotaExceeded,
    #[error("Order {0} changed while the cancellation was being prepared")]
    StaleOrderState(OrderId),
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::DatabaseError(e.to_string())
    }
}
