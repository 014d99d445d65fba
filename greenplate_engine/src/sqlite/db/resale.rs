use chrono::{DateTime, Utc};
use gp_common::Paise;
use log::trace;
use sqlx::{sqlite::SqliteRow, FromRow, Row, SqliteConnection};

use crate::{
    db_types::{NewResaleItem, OrderId, ResaleId, ResaleItem},
    sqlite::db::orders::{decode_items, parse_col},
    traits::LedgerError,
};

impl FromRow<'_, SqliteRow> for ResaleItem {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(ResaleItem {
            id: row.try_get("id")?,
            resale_id: ResaleId(row.try_get("resale_id")?),
            order_id: OrderId(row.try_get("order_id")?),
            seller_id: row.try_get("seller_id")?,
            stall_id: row.try_get("stall_id")?,
            college_id: row.try_get("college_id")?,
            items: decode_items(row)?,
            original_price: Paise::from(row.try_get::<i64, _>("original_price")?),
            discounted_price: Paise::from(row.try_get::<i64, _>("discounted_price")?),
            status: parse_col(row, "status")?,
            reserved_by: row.try_get("reserved_by")?,
            reserved_at: row.try_get("reserved_at")?,
            sold_order_id: row.try_get::<Option<String>, _>("sold_order_id")?.map(OrderId),
            created_at: row.try_get("created_at")?,
        })
    }
}

pub(crate) async fn insert(item: &NewResaleItem, conn: &mut SqliteConnection) -> Result<ResaleItem, LedgerError> {
    let items = serde_json::to_string(&item.items)
        .map_err(|e| LedgerError::DatabaseError(format!("Could not encode line items: {e}")))?;
    let listing = sqlx::query_as(
        r#"
            INSERT INTO resale_items (
                resale_id,
                order_id,
                seller_id,
                stall_id,
                college_id,
                items,
                original_price,
                discounted_price
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(item.resale_id.as_str())
    .bind(item.order_id.as_str())
    .bind(&item.seller_id)
    .bind(&item.stall_id)
    .bind(&item.college_id)
    .bind(items)
    .bind(item.original_price.value())
    .bind(item.discounted_price.value())
    .fetch_one(conn)
    .await?;
    trace!("🏷️ Resale listing {} created for order {}", item.resale_id, item.order_id);
    Ok(listing)
}

pub(crate) async fn fetch_by_resale_id(
    resale_id: &ResaleId,
    conn: &mut SqliteConnection,
) -> Result<Option<ResaleItem>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM resale_items WHERE resale_id = $1").bind(resale_id.as_str()).fetch_optional(conn).await
}

/// Items purchasable at `now` for a college: AVAILABLE, or RESERVED with the reservation past
/// its TTL. Expiry is evaluated here on the decoded rows rather than in SQL; the stored status
/// of an expired reservation is deliberately left untouched.
pub(crate) async fn feed(
    college_id: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<ResaleItem>, sqlx::Error> {
    let items: Vec<ResaleItem> =
        sqlx::query_as("SELECT * FROM resale_items WHERE college_id = $1 AND status != 'SOLD' ORDER BY created_at DESC")
            .bind(college_id)
            .fetch_all(conn)
            .await?;
    Ok(items.into_iter().filter(|item| item.is_available(now)).collect())
}

/// The reservation compare-and-swap. The caller owns the surrounding transaction; this re-read
/// plus conditional write is what makes concurrent attempts yield exactly one winner.
pub(crate) async fn reserve(
    resale_id: &ResaleId,
    buyer_id: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<ResaleItem, LedgerError> {
    let item = fetch_by_resale_id(resale_id, &mut *conn)
        .await?
        .ok_or_else(|| LedgerError::ResaleItemNotFound(resale_id.clone()))?;
    if !item.is_available(now) {
        return Err(LedgerError::ResaleItemUnavailable(resale_id.clone()));
    }
    let item = sqlx::query_as(
        "UPDATE resale_items SET status = 'RESERVED', reserved_by = $1, reserved_at = $2 WHERE id = $3 RETURNING *",
    )
    .bind(buyer_id)
    .bind(now)
    .bind(item.id)
    .fetch_one(conn)
    .await?;
    trace!("🏷️ Resale item {resale_id} reserved by {buyer_id}");
    Ok(item)
}

/// Terminal SOLD write with the back-reference to the order that bought the item. Runs inside
/// the settle transaction so the order and the listing flip together.
pub(crate) async fn mark_sold(
    resale_id: &ResaleId,
    sold_order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<ResaleItem, LedgerError> {
    let item = fetch_by_resale_id(resale_id, &mut *conn)
        .await?
        .ok_or_else(|| LedgerError::ResaleItemNotFound(resale_id.clone()))?;
    let item = sqlx::query_as(
        "UPDATE resale_items SET status = 'SOLD', sold_order_id = $1 WHERE id = $2 RETURNING *",
    )
    .bind(sold_order_id.as_str())
    .bind(item.id)
    .fetch_one(conn)
    .await?;
    trace!("🏷️ Resale item {resale_id} sold to order {sold_order_id}");
    Ok(item)
}
