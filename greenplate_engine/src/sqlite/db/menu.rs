use gp_common::Paise;
use sqlx::{sqlite::SqliteRow, FromRow, QueryBuilder, Row, SqliteConnection};

use crate::db_types::MenuItem;

impl FromRow<'_, SqliteRow> for MenuItem {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(MenuItem {
            item_id: row.try_get("item_id")?,
            stall_id: row.try_get("stall_id")?,
            college_id: row.try_get("college_id")?,
            name: row.try_get("name")?,
            price: Paise::from(row.try_get::<i64, _>("price")?),
            is_available: row.try_get::<i64, _>("is_available")? != 0,
        })
    }
}

pub(crate) async fn fetch_menu_items(
    stall_id: &str,
    item_ids: &[String],
    conn: &mut SqliteConnection,
) -> Result<Vec<MenuItem>, sqlx::Error> {
    if item_ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut builder = QueryBuilder::new("SELECT * FROM menu_items WHERE stall_id = ");
    builder.push_bind(stall_id);
    builder.push(" AND item_id IN (");
    let mut in_clause = builder.separated(", ");
    for item_id in item_ids {
        in_clause.push_bind(item_id.as_str());
    }
    builder.push(")");
    builder.build_query_as::<MenuItem>().fetch_all(conn).await
}
