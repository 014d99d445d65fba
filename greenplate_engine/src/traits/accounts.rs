use chrono::{DateTime, Utc};

use crate::{
    db_types::{MenuItem, Order, OrderId, OrderStatusType, ResaleId, ResaleItem, StaffProfile, UserProfile},
    traits::LedgerError,
};

/// Read-side access to users, staff, menus and order history.
#[allow(async_fn_in_trait)]
pub trait AccountManagement {
    async fn fetch_user_profile(&self, uid: &str) -> Result<Option<UserProfile>, LedgerError>;

    async fn fetch_staff_profile(&self, uid: &str) -> Result<Option<StaffProfile>, LedgerError>;

    /// Fetch the menu entries for `item_ids` at the given stall. Items that do not exist at the
    /// stall are simply absent from the result; callers decide what a miss means.
    async fn fetch_menu_items(&self, stall_id: &str, item_ids: &[String]) -> Result<Vec<MenuItem>, LedgerError>;

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, LedgerError>;

    /// All orders placed by a buyer, newest first.
    async fn fetch_orders_for_buyer(&self, buyer_id: &str) -> Result<Vec<Order>, LedgerError>;

    /// Orders at a stall, optionally filtered by status, oldest first (kitchen queue order).
    async fn fetch_orders_for_stall(
        &self,
        stall_id: &str,
        status: Option<OrderStatusType>,
    ) -> Result<Vec<Order>, LedgerError>;

    async fn fetch_resale_item(&self, resale_id: &ResaleId) -> Result<Option<ResaleItem>, LedgerError>;

    /// Marketplace feed for a college: items purchasable at `now`, i.e. AVAILABLE plus RESERVED
    /// entries whose reservation has expired. Expiry is evaluated here, at read time; the stored
    /// status is left alone.
    async fn fetch_resale_feed(&self, college_id: &str, now: DateTime<Utc>) -> Result<Vec<ResaleItem>, LedgerError>;
}
