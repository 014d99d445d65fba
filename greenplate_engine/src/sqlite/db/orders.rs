use std::str::FromStr;

use chrono::Utc;
use gp_common::Paise;
use log::{trace, warn};
use sqlx::{sqlite::SqliteRow, FromRow, Row, SqliteConnection};

use crate::{
    db_types::{
        LineItem,
        NewOrder,
        Order,
        OrderId,
        OrderStatusType,
        PayoutStatusType,
        RefundRecord,
        RefundStatusType,
        RefundType,
        ResaleId,
        StaffPayout,
    },
    helpers::new_pickup_code,
    traits::{CancellationCommit, LedgerError, PaymentSettlement, RefundUpdate},
};

pub(crate) fn parse_col<T>(row: &SqliteRow, index: &'static str) -> Result<T, sqlx::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.try_get(index)?;
    raw.parse().map_err(|e: T::Err| sqlx::Error::ColumnDecode { index: index.into(), source: Box::new(e) })
}

pub(crate) fn parse_col_opt<T>(row: &SqliteRow, index: &'static str) -> Result<Option<T>, sqlx::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match row.try_get::<Option<String>, _>(index)? {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e: T::Err| sqlx::Error::ColumnDecode { index: index.into(), source: Box::new(e) }),
        None => Ok(None),
    }
}

pub(crate) fn decode_items(row: &SqliteRow) -> Result<Vec<LineItem>, sqlx::Error> {
    let raw: String = row.try_get("items")?;
    serde_json::from_str(&raw).map_err(|e| sqlx::Error::ColumnDecode { index: "items".into(), source: Box::new(e) })
}

impl FromRow<'_, SqliteRow> for Order {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let refund = match parse_col_opt::<RefundType>(row, "refund_type")? {
            Some(refund_type) => Some(RefundRecord {
                eligible: row.try_get::<Option<i64>, _>("refund_eligible")?.unwrap_or(0) != 0,
                amount: Paise::from(row.try_get::<Option<i64>, _>("refund_amount")?.unwrap_or(0)),
                refund_type,
                status: parse_col_opt::<RefundStatusType>(row, "refund_status")?
                    .unwrap_or(RefundStatusType::NotRequired),
                refund_id: row.try_get("refund_id")?,
                reference: row.try_get("refund_reference")?,
                failed_reason: row.try_get("refund_failed_reason")?,
                refunded_at: row.try_get("refunded_at")?,
            }),
            None => None,
        };
        let payout = match row.try_get::<Option<i64>, _>("payout_amount")? {
            Some(amount) => Some(StaffPayout {
                amount: Paise::from(amount),
                status: parse_col_opt::<PayoutStatusType>(row, "payout_status")?.unwrap_or(PayoutStatusType::Pending),
            }),
            None => None,
        };
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let ready_refund_percent = row.try_get::<i64, _>("ready_refund_percent")? as u32;
        Ok(Order {
            id: row.try_get("id")?,
            order_id: OrderId(row.try_get("order_id")?),
            buyer_id: row.try_get("buyer_id")?,
            stall_id: row.try_get("stall_id")?,
            college_id: row.try_get("college_id")?,
            items: decode_items(row)?,
            total: Paise::from(row.try_get::<i64, _>("total")?),
            status: parse_col(row, "status")?,
            order_type: parse_col(row, "order_type")?,
            pickup_code: row.try_get("pickup_code")?,
            payment_intent_id: row.try_get("payment_intent_id")?,
            payment_id: row.try_get("payment_id")?,
            ready_refund_percent,
            refund,
            payout,
            precancel_status: parse_col_opt(row, "precancel_status")?,
            cancel_reason: row.try_get("cancel_reason")?,
            cancelled_at: row.try_get("cancelled_at")?,
            resale_item_id: row.try_get::<Option<String>, _>("resale_item_id")?.map(ResaleId),
            picked_up_at: row.try_get("picked_up_at")?,
            handled_by: row.try_get("handled_by")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

fn encode_items(items: &[LineItem]) -> Result<String, LedgerError> {
    serde_json::to_string(items).map_err(|e| LedgerError::DatabaseError(format!("Could not encode line items: {e}")))
}

pub(crate) async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, LedgerError> {
    let items = encode_items(&order.items)?;
    let result = sqlx::query_as::<_, Order>(
        r#"
            INSERT INTO orders (
                order_id,
                buyer_id,
                stall_id,
                college_id,
                items,
                total,
                order_type,
                ready_refund_percent,
                payment_intent_id,
                resale_item_id
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *;
        "#,
    )
    .bind(order.order_id.as_str())
    .bind(&order.buyer_id)
    .bind(&order.stall_id)
    .bind(&order.college_id)
    .bind(items)
    .bind(order.total.value())
    .bind(order.order_type.to_string())
    .bind(i64::from(order.ready_refund_percent))
    .bind(&order.payment_intent_id)
    .bind(order.resale_item_id.as_ref().map(|r| r.as_str().to_string()))
    .fetch_one(conn)
    .await;
    match result {
        Ok(order) => {
            trace!("📝️ Order {} inserted with id {}", order.order_id, order.id);
            Ok(order)
        },
        Err(sqlx::Error::Database(de)) if matches!(de.kind(), sqlx::error::ErrorKind::UniqueViolation) => {
            Err(LedgerError::OrderAlreadyExists(order.order_id))
        },
        Err(e) => Err(e.into()),
    }
}

pub(crate) async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await
}

pub(crate) async fn fetch_orders_for_buyer(
    buyer_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE buyer_id = $1 ORDER BY created_at DESC, id DESC")
        .bind(buyer_id)
        .fetch_all(conn)
        .await
}

pub(crate) async fn fetch_orders_for_stall(
    stall_id: &str,
    status: Option<OrderStatusType>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    match status {
        Some(status) => {
            sqlx::query_as("SELECT * FROM orders WHERE stall_id = $1 AND status = $2 ORDER BY created_at ASC")
                .bind(stall_id)
                .bind(status.to_string())
                .fetch_all(conn)
                .await
        },
        None => {
            sqlx::query_as("SELECT * FROM orders WHERE stall_id = $1 ORDER BY created_at ASC")
                .bind(stall_id)
                .fetch_all(conn)
                .await
        },
    }
}

/// The write half of the idempotent settle. The caller owns the surrounding transaction.
pub(crate) async fn settle(
    order_id: &OrderId,
    settlement: &PaymentSettlement,
    conn: &mut SqliteConnection,
) -> Result<SettleWrite, LedgerError> {
    let order = fetch_order_by_order_id(order_id, &mut *conn)
        .await?
        .ok_or_else(|| LedgerError::OrderNotFound(order_id.clone()))?;
    if order.status.is_settled() {
        trace!("📝️ Order {order_id} is already {}; settlement is a no-op", order.status);
        return Ok(SettleWrite::NoOp(order));
    }
    let code = new_pickup_code();
    let payload = settlement.raw_payload.to_string();
    let order: Order = sqlx::query_as(
        "UPDATE orders SET status = 'PAID', pickup_code = $1, payment_id = $2, payment_payload = $3, updated_at = \
         CURRENT_TIMESTAMP WHERE id = $4 RETURNING *",
    )
    .bind(&code)
    .bind(&settlement.payment_id)
    .bind(payload)
    .bind(order.id)
    .fetch_one(conn)
    .await?;
    trace!("📝️ Order {order_id} marked PAID with pickup code assigned");
    Ok(SettleWrite::Settled(order))
}

/// Outcome of the order-side settle write, before any linked resale item is touched.
pub(crate) enum SettleWrite {
    Settled(Order),
    NoOp(Order),
}

pub(crate) async fn claim(
    order_id: &OrderId,
    pickup_code: &str,
    staff_email: &str,
    conn: &mut SqliteConnection,
) -> Result<Order, LedgerError> {
    let order = fetch_order_by_order_id(order_id, &mut *conn)
        .await?
        .ok_or_else(|| LedgerError::OrderNotFound(order_id.clone()))?;
    if !matches!(order.status, OrderStatusType::Paid | OrderStatusType::Ready) {
        return Err(LedgerError::TransitionForbidden {
            order_id: order.order_id,
            from: order.status,
            to: OrderStatusType::Claimed,
        });
    }
    match order.pickup_code.as_deref() {
        Some(stored) if stored == pickup_code => {},
        _ => return Err(LedgerError::PickupCodeMismatch(order.order_id)),
    }
    let order = sqlx::query_as(
        "UPDATE orders SET status = 'CLAIMED', picked_up_at = CURRENT_TIMESTAMP, handled_by = $1, updated_at = \
         CURRENT_TIMESTAMP WHERE id = $2 RETURNING *",
    )
    .bind(staff_email)
    .bind(order.id)
    .fetch_one(conn)
    .await?;
    Ok(order)
}

pub(crate) async fn update_status(
    order_id: &OrderId,
    new_status: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Order, LedgerError> {
    let order = fetch_order_by_order_id(order_id, &mut *conn)
        .await?
        .ok_or_else(|| LedgerError::OrderNotFound(order_id.clone()))?;
    // PAID, CLAIMED and CANCELLED have dedicated operations with their own side effects; this
    // path only serves the bare staff-driven updates.
    let plain_update = matches!(new_status, OrderStatusType::Ready | OrderStatusType::Completed);
    if !plain_update || !order.status.can_transition_to(new_status) {
        return Err(LedgerError::TransitionForbidden { order_id: order.order_id, from: order.status, to: new_status });
    }
    let order = sqlx::query_as("UPDATE orders SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *")
        .bind(new_status.to_string())
        .bind(order.id)
        .fetch_one(conn)
        .await?;
    Ok(order)
}

pub(crate) async fn record_refund_update(
    order_id: &OrderId,
    update: &RefundUpdate,
    conn: &mut SqliteConnection,
) -> Result<Order, LedgerError> {
    let order = fetch_order_by_order_id(order_id, &mut *conn)
        .await?
        .ok_or_else(|| LedgerError::OrderNotFound(order_id.clone()))?;
    if order.refund.is_none() {
        warn!("📝️ Order {order_id} has no refund record; ignoring refund update to {}", update.status);
        return Ok(order);
    }
    let refunded_at = (update.status == RefundStatusType::Processed).then(Utc::now);
    let order = sqlx::query_as(
        "UPDATE orders SET refund_status = $1, refund_id = COALESCE($2, refund_id), refund_reference = COALESCE($3, \
         refund_reference), refund_failed_reason = $4, refunded_at = COALESCE($5, refunded_at), updated_at = \
         CURRENT_TIMESTAMP WHERE id = $6 RETURNING *",
    )
    .bind(update.status.to_string())
    .bind(&update.refund_id)
    .bind(&update.reference)
    .bind(&update.failed_reason)
    .bind(refunded_at)
    .bind(order.id)
    .fetch_one(conn)
    .await?;
    Ok(order)
}

/// The order-side write of a cancellation batch. Quota and listing writes live in their own
/// modules; the caller composes all three inside one transaction.
pub(crate) async fn apply_cancellation(
    order: &Order,
    commit: &CancellationCommit,
    listing_id: Option<&ResaleId>,
    conn: &mut SqliteConnection,
) -> Result<Order, LedgerError> {
    let refund = &commit.refund;
    let order = sqlx::query_as(
        r#"
        UPDATE orders SET
            status = 'CANCELLED',
            precancel_status = $1,
            cancel_reason = $2,
            cancelled_at = CURRENT_TIMESTAMP,
            refund_eligible = $3,
            refund_amount = $4,
            refund_type = $5,
            refund_status = $6,
            refund_id = $7,
            refund_failed_reason = $8,
            payout_amount = $9,
            payout_status = $10,
            resale_item_id = COALESCE($11, resale_item_id),
            updated_at = CURRENT_TIMESTAMP
        WHERE id = $12
        RETURNING *;
    "#,
    )
    .bind(commit.expected_status.to_string())
    .bind(&commit.reason)
    .bind(i64::from(refund.eligible))
    .bind(refund.amount.value())
    .bind(refund.refund_type.to_string())
    .bind(refund.status.to_string())
    .bind(&refund.refund_id)
    .bind(&refund.failed_reason)
    .bind(commit.payout.amount.value())
    .bind(commit.payout.status.to_string())
    .bind(listing_id.map(|r| r.as_str().to_string()))
    .bind(order.id)
    .fetch_one(conn)
    .await?;
    Ok(order)
}
