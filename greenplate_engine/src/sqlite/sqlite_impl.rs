//! `SqliteDatabase` is the concrete order-ledger backend.
//!
//! It implements the storage ports defined in the [`traits`](crate::traits) module on top of
//! SQLite. The three coordination-critical operations (settle, reserve, cancellation batch) each
//! run inside a single transaction, retried a bounded number of times when they lose a write
//! race; everything inside either commits together or not at all.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqlitePool;

use super::db::{self, menu, orders, resale, users};
use crate::{
    db_types::{
        MenuItem,
        NewOrder,
        Order,
        OrderId,
        OrderStatusType,
        OrderType,
        ResaleId,
        ResaleItem,
        StaffProfile,
        UserProfile,
    },
    sqlite::db::orders::SettleWrite,
    traits::{
        AccountManagement,
        CancellationCommit,
        CancellationOutcome,
        LedgerDatabase,
        LedgerError,
        PaymentSettlement,
        RefundUpdate,
        SettlementOutcome,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, LedgerError> {
        let pool = db::new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<(), LedgerError> {
        sqlx::migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| LedgerError::DatabaseError(e.to_string()))
    }

    async fn try_settle(
        &self,
        order_id: &OrderId,
        settlement: &PaymentSettlement,
    ) -> Result<SettlementOutcome, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let write = orders::settle(order_id, settlement, &mut tx).await?;
        let outcome = match write {
            SettleWrite::NoOp(order) => SettlementOutcome::AlreadySettled(order),
            SettleWrite::Settled(order) => {
                let sold_listing = match (order.order_type, order.resale_item_id.as_ref()) {
                    (OrderType::Resale, Some(resale_id)) => {
                        Some(resale::mark_sold(resale_id, &order.order_id, &mut tx).await?)
                    },
                    _ => None,
                };
                SettlementOutcome::Settled { order, sold_listing }
            },
        };
        tx.commit().await?;
        Ok(outcome)
    }

    async fn try_reserve(
        &self,
        resale_id: &ResaleId,
        buyer_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ResaleItem, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let item = resale::reserve(resale_id, buyer_id, now, &mut tx).await?;
        tx.commit().await?;
        Ok(item)
    }

    async fn try_commit_cancellation(&self, commit: &CancellationCommit) -> Result<CancellationOutcome, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_order_by_order_id(&commit.order_id, &mut tx)
            .await?
            .ok_or_else(|| LedgerError::OrderNotFound(commit.order_id.clone()))?;
        if order.status != commit.expected_status {
            return Err(LedgerError::StaleOrderState(commit.order_id.clone()));
        }
        users::check_and_bump_cancel_quota(&commit.cancelled_by, Utc::now(), &mut tx).await?;
        let listing = match &commit.listing {
            Some(new_listing) => Some(resale::insert(new_listing, &mut tx).await?),
            None => None,
        };
        let order =
            orders::apply_cancellation(&order, commit, listing.as_ref().map(|l| &l.resale_id), &mut tx).await?;
        tx.commit().await?;
        Ok(CancellationOutcome { order, listing })
    }
}

impl AccountManagement for SqliteDatabase {
    async fn fetch_user_profile(&self, uid: &str) -> Result<Option<UserProfile>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(users::fetch_user(uid, &mut conn).await?)
    }

    async fn fetch_staff_profile(&self, uid: &str) -> Result<Option<StaffProfile>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(users::fetch_staff(uid, &mut conn).await?)
    }

    async fn fetch_menu_items(&self, stall_id: &str, item_ids: &[String]) -> Result<Vec<MenuItem>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(menu::fetch_menu_items(stall_id, item_ids, &mut conn).await?)
    }

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_by_order_id(order_id, &mut conn).await?)
    }

    async fn fetch_orders_for_buyer(&self, buyer_id: &str) -> Result<Vec<Order>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_orders_for_buyer(buyer_id, &mut conn).await?)
    }

    async fn fetch_orders_for_stall(
        &self,
        stall_id: &str,
        status: Option<OrderStatusType>,
    ) -> Result<Vec<Order>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_orders_for_stall(stall_id, status, &mut conn).await?)
    }

    async fn fetch_resale_item(&self, resale_id: &ResaleId) -> Result<Option<ResaleItem>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(resale::fetch_by_resale_id(resale_id, &mut conn).await?)
    }

    async fn fetch_resale_feed(&self, college_id: &str, now: DateTime<Utc>) -> Result<Vec<ResaleItem>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(resale::feed(college_id, now, &mut conn).await?)
    }
}

impl LedgerDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::insert_order(order, &mut conn).await?;
        debug!("🗃️ Order {} saved with id {}", order.order_id, order.id);
        Ok(order)
    }

    async fn settle_order_payment(
        &self,
        order_id: &OrderId,
        settlement: PaymentSettlement,
    ) -> Result<SettlementOutcome, LedgerError> {
        let mut attempts = 0;
        loop {
            match self.try_settle(order_id, &settlement).await {
                Err(e) if db::is_write_conflict(&e) && attempts < db::MAX_WRITE_RETRIES => {
                    attempts += 1;
                    debug!("🗃️ Write conflict settling order {order_id}; retrying ({attempts}/{})", db::MAX_WRITE_RETRIES);
                },
                other => return other,
            }
        }
    }

    async fn record_refund_update(&self, order_id: &OrderId, update: RefundUpdate) -> Result<Order, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::record_refund_update(order_id, &update, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Refund record on order {order_id} updated to {}", update.status);
        Ok(order)
    }

    async fn update_order_status(&self, order_id: &OrderId, new_status: OrderStatusType) -> Result<Order, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::update_status(order_id, new_status, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order {order_id} moved to {new_status}");
        Ok(order)
    }

    async fn claim_order(
        &self,
        order_id: &OrderId,
        pickup_code: &str,
        staff: &StaffProfile,
    ) -> Result<Order, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::claim(order_id, pickup_code, &staff.email, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order {order_id} claimed; handled by {}", staff.email);
        Ok(order)
    }

    async fn commit_cancellation(&self, commit: CancellationCommit) -> Result<CancellationOutcome, LedgerError> {
        let mut attempts = 0;
        loop {
            match self.try_commit_cancellation(&commit).await {
                Err(e) if db::is_write_conflict(&e) && attempts < db::MAX_WRITE_RETRIES => {
                    attempts += 1;
                    debug!(
                        "🗃️ Write conflict cancelling order {}; retrying ({attempts}/{})",
                        commit.order_id,
                        db::MAX_WRITE_RETRIES
                    );
                },
                other => return other,
            }
        }
    }

    async fn reserve_resale_item(
        &self,
        resale_id: &ResaleId,
        buyer_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ResaleItem, LedgerError> {
        let mut attempts = 0;
        loop {
            match self.try_reserve(resale_id, buyer_id, now).await {
                Err(e) if db::is_write_conflict(&e) && attempts < db::MAX_WRITE_RETRIES => {
                    attempts += 1;
                    debug!("🗃️ Write conflict reserving item {resale_id}; retrying ({attempts}/{})", db::MAX_WRITE_RETRIES);
                },
                other => return other,
            }
        }
    }
}
