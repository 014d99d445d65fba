use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Duration, Utc};
use gp_common::Paise;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How long a resale reservation grants exclusivity before anyone else may take the item over.
pub const RESERVATION_TTL: Duration = Duration::minutes(5);
/// The rolling window over which cancellations are counted.
pub const CANCEL_QUOTA_WINDOW: Duration = Duration::days(7);
/// Maximum cancellations per user inside one quota window.
pub const CANCEL_QUOTA_LIMIT: i64 = 3;
/// Discount applied when a cancelled READY order is re-listed on the marketplace.
pub const RESALE_DISCOUNT_PERCENT: u32 = 50;
/// Fallback refund percentage for READY-order cancellations when no policy is configured.
pub const DEFAULT_READY_REFUND_PERCENT: u32 = 50;

#[derive(Debug, Clone, Error)]
#[error("Invalid conversion: {0}")]
pub struct ConversionError(pub String);

//--------------------------------------        OrderId        -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl OrderId {
    /// A fresh system-generated order id.
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        Self(format!("gp-{:012x}", rng.gen::<u64>() & 0xffff_ffff_ffff))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

//--------------------------------------       ResaleId        -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResaleId(pub String);

impl ResaleId {
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        Self(format!("rs-{:012x}", rng.gen::<u64>() & 0xffff_ffff_ffff))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ResaleId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for ResaleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

//--------------------------------------   OrderStatusType     -------------------------------------------------------
/// The order lifecycle. `PENDING → PAID → READY → CLAIMED → COMPLETED`, with `CANCELLED`
/// reachable from the first three states only. `CLAIMED`, `COMPLETED` and `CANCELLED` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatusType {
    Pending,
    Paid,
    Ready,
    Claimed,
    Completed,
    Cancelled,
}

impl OrderStatusType {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatusType::Claimed | OrderStatusType::Completed | OrderStatusType::Cancelled)
    }

    /// True once payment has been reconciled, i.e. the order is in PAID or any later state.
    pub fn is_settled(&self) -> bool {
        !matches!(self, OrderStatusType::Pending)
    }

    /// Whether `self → next` is an edge of the lifecycle graph. Everything not listed here is a
    /// conflict, including transitions out of terminal states and self-transitions.
    pub fn can_transition_to(&self, next: OrderStatusType) -> bool {
        use OrderStatusType::*;
        matches!(
            (self, next),
            (Pending, Paid)
                | (Paid, Ready)
                | (Ready, Claimed)
                | (Paid, Claimed)
                | (Claimed, Completed)
                | (Pending, Cancelled)
                | (Paid, Cancelled)
                | (Ready, Cancelled)
        )
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatusType::Pending => "PENDING",
            OrderStatusType::Paid => "PAID",
            OrderStatusType::Ready => "READY",
            OrderStatusType::Claimed => "CLAIMED",
            OrderStatusType::Completed => "COMPLETED",
            OrderStatusType::Cancelled => "CANCELLED",
        };
        write!(f, "{s}")
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "PAID" => Ok(Self::Paid),
            "READY" => Ok(Self::Ready),
            "CLAIMED" => Ok(Self::Claimed),
            "COMPLETED" => Ok(Self::Completed),
            "CANCELLED" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------      OrderType        -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Normal,
    Resale,
}

impl Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderType::Normal => write!(f, "NORMAL"),
            OrderType::Resale => write!(f, "RESALE"),
        }
    }
}

impl FromStr for OrderType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NORMAL" => Ok(Self::Normal),
            "RESALE" => Ok(Self::Resale),
            s => Err(ConversionError(format!("Invalid order type: {s}"))),
        }
    }
}

//--------------------------------------      LineItem         -------------------------------------------------------
/// One ordered menu line, snapshotted at checkout so later menu edits cannot change history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub item_id: String,
    pub name: String,
    pub unit_price: Paise,
    pub quantity: u32,
}

impl LineItem {
    pub fn line_total(&self) -> Paise {
        self.unit_price * i64::from(self.quantity)
    }
}

//--------------------------------------     RefundRecord      -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefundType {
    FullRefund,
    PartialRefund,
    NoRefund,
}

impl Display for RefundType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefundType::FullRefund => write!(f, "FULL_REFUND"),
            RefundType::PartialRefund => write!(f, "PARTIAL_REFUND"),
            RefundType::NoRefund => write!(f, "NO_REFUND"),
        }
    }
}

impl FromStr for RefundType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FULL_REFUND" => Ok(Self::FullRefund),
            "PARTIAL_REFUND" => Ok(Self::PartialRefund),
            "NO_REFUND" => Ok(Self::NoRefund),
            s => Err(ConversionError(format!("Invalid refund type: {s}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefundStatusType {
    /// No money needs to move (nothing was captured, or the computed amount is zero).
    NotRequired,
    /// The gateway accepted the refund request; the money is in flight.
    Initiated,
    /// The gateway confirmed the reversal landed.
    Processed,
    /// The gateway rejected or lost the refund; needs manual reconciliation.
    Failed,
}

impl Display for RefundStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefundStatusType::NotRequired => write!(f, "NOT_REQUIRED"),
            RefundStatusType::Initiated => write!(f, "INITIATED"),
            RefundStatusType::Processed => write!(f, "PROCESSED"),
            RefundStatusType::Failed => write!(f, "FAILED"),
        }
    }
}

impl FromStr for RefundStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NOT_REQUIRED" => Ok(Self::NotRequired),
            "INITIATED" => Ok(Self::Initiated),
            "PROCESSED" => Ok(Self::Processed),
            "FAILED" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid refund status: {s}"))),
        }
    }
}

/// Refund bookkeeping attached to a cancelled order. `amount` never exceeds the order total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRecord {
    pub eligible: bool,
    pub amount: Paise,
    pub refund_type: RefundType,
    pub status: RefundStatusType,
    pub refund_id: Option<String>,
    /// Bank reference for the reversal, reported by the gateway once the money lands.
    pub reference: Option<String>,
    pub failed_reason: Option<String>,
    pub refunded_at: Option<DateTime<Utc>>,
}

//--------------------------------------     StaffPayout       -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayoutStatusType {
    Pending,
    Settled,
}

impl Display for PayoutStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayoutStatusType::Pending => write!(f, "PENDING"),
            PayoutStatusType::Settled => write!(f, "SETTLED"),
        }
    }
}

impl FromStr for PayoutStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "SETTLED" => Ok(Self::Settled),
            s => Err(ConversionError(format!("Invalid payout status: {s}"))),
        }
    }
}

/// What the stall is still owed after a cancellation (total minus the buyer's refund).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffPayout {
    pub amount: Paise,
    pub status: PayoutStatusType,
}

//--------------------------------------        Order          -------------------------------------------------------
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub buyer_id: String,
    pub stall_id: String,
    pub college_id: String,
    pub items: Vec<LineItem>,
    pub total: Paise,
    pub status: OrderStatusType,
    pub order_type: OrderType,
    /// Present exactly from the PENDING→PAID transition onwards.
    pub pickup_code: Option<String>,
    pub payment_intent_id: Option<String>,
    pub payment_id: Option<String>,
    /// Refund percentage applied if this order is cancelled while READY. Snapshotted at
    /// creation; policy changes never affect existing orders.
    pub ready_refund_percent: u32,
    pub refund: Option<RefundRecord>,
    pub payout: Option<StaffPayout>,
    pub precancel_status: Option<OrderStatusType>,
    pub cancel_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Marketplace listing this order bought (RESALE orders) or spawned (cancelled READY orders).
    pub resale_item_id: Option<ResaleId>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub handled_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------       NewOrder        -------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub buyer_id: String,
    pub stall_id: String,
    pub college_id: String,
    pub items: Vec<LineItem>,
    pub total: Paise,
    pub order_type: OrderType,
    pub ready_refund_percent: u32,
    pub payment_intent_id: Option<String>,
    pub resale_item_id: Option<ResaleId>,
}

impl NewOrder {
    pub fn new(buyer_id: String, stall_id: String, college_id: String, items: Vec<LineItem>) -> Self {
        let total = items.iter().map(LineItem::line_total).sum();
        Self {
            order_id: OrderId::random(),
            buyer_id,
            stall_id,
            college_id,
            items,
            total,
            order_type: OrderType::Normal,
            ready_refund_percent: DEFAULT_READY_REFUND_PERCENT,
            payment_intent_id: None,
            resale_item_id: None,
        }
    }

    pub fn with_refund_policy(mut self, percent: u32) -> Self {
        self.ready_refund_percent = percent;
        self
    }

    pub fn with_intent(mut self, intent_id: String) -> Self {
        self.payment_intent_id = Some(intent_id);
        self
    }
}

//--------------------------------------  ResaleStatusType     -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResaleStatusType {
    Available,
    Reserved,
    Sold,
}

impl Display for ResaleStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResaleStatusType::Available => write!(f, "AVAILABLE"),
            ResaleStatusType::Reserved => write!(f, "RESERVED"),
            ResaleStatusType::Sold => write!(f, "SOLD"),
        }
    }
}

impl FromStr for ResaleStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AVAILABLE" => Ok(Self::Available),
            "RESERVED" => Ok(Self::Reserved),
            "SOLD" => Ok(Self::Sold),
            s => Err(ConversionError(format!("Invalid resale status: {s}"))),
        }
    }
}

//--------------------------------------      ResaleItem       -------------------------------------------------------
/// A discounted re-listing of a cancelled, already-prepared order.
///
/// Reservation expiry is evaluated lazily: a stale RESERVED row is treated as available again by
/// every read; nothing ever sweeps the stored status back to AVAILABLE.
#[derive(Debug, Clone, Serialize)]
pub struct ResaleItem {
    pub id: i64,
    pub resale_id: ResaleId,
    pub order_id: OrderId,
    pub seller_id: String,
    pub stall_id: String,
    pub college_id: String,
    pub items: Vec<LineItem>,
    pub original_price: Paise,
    pub discounted_price: Paise,
    pub status: ResaleStatusType,
    pub reserved_by: Option<String>,
    pub reserved_at: Option<DateTime<Utc>>,
    pub sold_order_id: Option<OrderId>,
    pub created_at: DateTime<Utc>,
}

impl ResaleItem {
    /// Whether the active reservation, if any, has outlived its TTL at `now`.
    pub fn reservation_expired(&self, now: DateTime<Utc>) -> bool {
        match (self.status, self.reserved_at) {
            (ResaleStatusType::Reserved, Some(reserved_at)) => now - reserved_at >= RESERVATION_TTL,
            _ => false,
        }
    }

    /// Whether a new buyer may take this item over at `now`.
    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            ResaleStatusType::Available => true,
            ResaleStatusType::Reserved => self.reservation_expired(now),
            ResaleStatusType::Sold => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewResaleItem {
    pub resale_id: ResaleId,
    pub order_id: OrderId,
    pub seller_id: String,
    pub stall_id: String,
    pub college_id: String,
    pub items: Vec<LineItem>,
    pub original_price: Paise,
    pub discounted_price: Paise,
}

impl NewResaleItem {
    /// Build the marketplace listing for a cancelled READY order, at the standard discount.
    pub fn for_cancelled_order(order: &Order) -> Self {
        Self {
            resale_id: ResaleId::random(),
            order_id: order.order_id.clone(),
            seller_id: order.buyer_id.clone(),
            stall_id: order.stall_id.clone(),
            college_id: order.college_id.clone(),
            items: order.items.clone(),
            original_price: order.total,
            discounted_price: order.total.percent(100 - RESALE_DISCOUNT_PERCENT),
        }
    }
}

//--------------------------------------     UserProfile       -------------------------------------------------------
/// A student account, with the weekly cancellation quota embedded on the record. The window is
/// only persisted as reset or incremented together with a cancellation commit, never eagerly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub uid: String,
    pub email: String,
    pub college_id: String,
    pub cancel_count: i64,
    pub cancel_window_start: Option<DateTime<Utc>>,
}

impl UserProfile {
    /// Cancellations counted against the quota at `now`: zero if the window is unset or older
    /// than the quota window.
    pub fn effective_cancel_count(&self, now: DateTime<Utc>) -> i64 {
        match self.cancel_window_start {
            Some(start) if now - start < CANCEL_QUOTA_WINDOW => self.cancel_count,
            _ => 0,
        }
    }
}

//--------------------------------------     StaffProfile      -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaffRole {
    Staff,
    Manager,
}

impl Display for StaffRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StaffRole::Staff => write!(f, "staff"),
            StaffRole::Manager => write!(f, "manager"),
        }
    }
}

impl FromStr for StaffRole {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "staff" => Ok(Self::Staff),
            "manager" => Ok(Self::Manager),
            s => Err(ConversionError(format!("Invalid staff role: {s}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffProfile {
    pub uid: String,
    pub email: String,
    pub name: Option<String>,
    pub stall_id: String,
    pub college_id: String,
    pub role: StaffRole,
}

//--------------------------------------      MenuItem         -------------------------------------------------------
/// Read-only view of a stall's menu entry; menu administration happens elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuItem {
    pub item_id: String,
    pub stall_id: String,
    pub college_id: String,
    pub name: String,
    pub price: Paise,
    pub is_available: bool,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lifecycle_graph_edges() {
        use OrderStatusType::*;
        assert!(Pending.can_transition_to(Paid));
        assert!(Paid.can_transition_to(Ready));
        assert!(Ready.can_transition_to(Claimed));
        assert!(Paid.can_transition_to(Claimed));
        assert!(Claimed.can_transition_to(Completed));
        for from in [Pending, Paid, Ready] {
            assert!(from.can_transition_to(Cancelled), "{from} should be cancellable");
        }
    }

    #[test]
    fn terminal_states_have_no_exits() {
        use OrderStatusType::*;
        let all = [Pending, Paid, Ready, Claimed, Completed, Cancelled];
        for from in [Completed, Cancelled] {
            for to in all {
                assert!(!from.can_transition_to(to), "{from} → {to} must be rejected");
            }
        }
        // CLAIMED is terminal for everything except the bookkeeping step to COMPLETED
        for to in [Pending, Paid, Ready, Cancelled, Claimed] {
            assert!(!Claimed.can_transition_to(to));
        }
    }

    #[test]
    fn no_backward_or_skip_transitions() {
        use OrderStatusType::*;
        assert!(!Paid.can_transition_to(Pending));
        assert!(!Ready.can_transition_to(Paid));
        assert!(!Pending.can_transition_to(Ready));
        assert!(!Pending.can_transition_to(Claimed));
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(!Paid.can_transition_to(Paid));
    }

    #[test]
    fn status_round_trips_through_strings() {
        use OrderStatusType::*;
        for status in [Pending, Paid, Ready, Claimed, Completed, Cancelled] {
            assert_eq!(status.to_string().parse::<OrderStatusType>().unwrap(), status);
        }
        assert!("paid".parse::<OrderStatusType>().is_err());
    }

    #[test]
    fn reservation_expiry_is_lazy() {
        let now = Utc::now();
        let mut item = ResaleItem {
            id: 1,
            resale_id: ResaleId("rs-000000000001".into()),
            order_id: OrderId("gp-000000000001".into()),
            seller_id: "u1".into(),
            stall_id: "s1".into(),
            college_id: "c1".into(),
            items: vec![],
            original_price: Paise::from(10_000),
            discounted_price: Paise::from(5_000),
            status: ResaleStatusType::Reserved,
            reserved_by: Some("u2".into()),
            reserved_at: Some(now - Duration::minutes(4)),
            sold_order_id: None,
            created_at: now - Duration::hours(1),
        };
        assert!(!item.is_available(now), "fresh reservation still holds");
        item.reserved_at = Some(now - Duration::minutes(5));
        assert!(item.is_available(now), "expired reservation is available to others");
        item.status = ResaleStatusType::Sold;
        assert!(!item.is_available(now), "SOLD is terminal");
    }

    #[test]
    fn quota_window_resets_after_seven_days() {
        let now = Utc::now();
        let mut user = UserProfile {
            uid: "u1".into(),
            email: "u1@college.edu".into(),
            college_id: "c1".into(),
            cancel_count: 3,
            cancel_window_start: Some(now - Duration::days(2)),
        };
        assert_eq!(user.effective_cancel_count(now), 3);
        user.cancel_window_start = Some(now - Duration::days(7));
        assert_eq!(user.effective_cancel_count(now), 0);
        user.cancel_window_start = None;
        assert_eq!(user.effective_cancel_count(now), 0);
    }

    #[test]
    fn resale_listing_prices_at_half() {
        let order = Order {
            id: 1,
            order_id: OrderId("gp-0000000000aa".into()),
            buyer_id: "u1".into(),
            stall_id: "s1".into(),
            college_id: "c1".into(),
            items: vec![LineItem {
                item_id: "m1".into(),
                name: "Veg Thali".into(),
                unit_price: Paise::from(10_000),
                quantity: 1,
            }],
            total: Paise::from(10_000),
            status: OrderStatusType::Ready,
            order_type: OrderType::Normal,
            pickup_code: Some("0042".into()),
            payment_intent_id: None,
            payment_id: None,
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
        };
        let listing = NewResaleItem::for_cancelled_order(&order);
        assert_eq!(listing.discounted_price, Paise::from(5_000));
        assert!(listing.discounted_price < listing.original_price);
        assert_eq!(listing.seller_id, "u1");
    }
}
