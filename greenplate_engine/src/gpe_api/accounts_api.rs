use crate::{
    db_types::{Order, OrderStatusType, StaffProfile, UserProfile},
    traits::{AccountManagement, LedgerError},
};

/// Read-side queries: profiles and order listings.
pub struct AccountApi<B> {
    db: B,
}

impl<B> std::fmt::Debug for AccountApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccountApi")
    }
}

impl<B> AccountApi<B>
where B: AccountManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn fetch_user_profile(&self, uid: &str) -> Result<Option<UserProfile>, LedgerError> {
        self.db.fetch_user_profile(uid).await
    }

    pub async fn fetch_staff_profile(&self, uid: &str) -> Result<Option<StaffProfile>, LedgerError> {
        self.db.fetch_staff_profile(uid).await
    }

    /// A buyer's own order history, newest first.
    pub async fn my_orders(&self, uid: &str) -> Result<Vec<Order>, LedgerError> {
        self.db.fetch_orders_for_buyer(uid).await
    }

    /// The kitchen queue for the staff member's own stall.
    pub async fn stall_orders(
        &self,
        staff: &StaffProfile,
        status: Option<OrderStatusType>,
    ) -> Result<Vec<Order>, LedgerError> {
        self.db.fetch_orders_for_stall(&staff.stall_id, status).await
    }
}
