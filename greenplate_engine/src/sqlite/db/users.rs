use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, FromRow, Row, SqliteConnection};

use crate::{
    db_types::{StaffProfile, UserProfile, CANCEL_QUOTA_LIMIT},
    sqlite::db::orders::parse_col,
    traits::LedgerError,
};

impl FromRow<'_, SqliteRow> for UserProfile {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(UserProfile {
            uid: row.try_get("uid")?,
            email: row.try_get("email")?,
            college_id: row.try_get("college_id")?,
            cancel_count: row.try_get("cancel_count")?,
            cancel_window_start: row.try_get("cancel_window_start")?,
        })
    }
}

impl FromRow<'_, SqliteRow> for StaffProfile {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(StaffProfile {
            uid: row.try_get("uid")?,
            email: row.try_get("email")?,
            name: row.try_get("name")?,
            stall_id: row.try_get("stall_id")?,
            college_id: row.try_get("college_id")?,
            role: parse_col(row, "role")?,
        })
    }
}

pub(crate) async fn fetch_user(uid: &str, conn: &mut SqliteConnection) -> Result<Option<UserProfile>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM users WHERE uid = $1").bind(uid).fetch_optional(conn).await
}

pub(crate) async fn fetch_staff(uid: &str, conn: &mut SqliteConnection) -> Result<Option<StaffProfile>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM staffs WHERE uid = $1").bind(uid).fetch_optional(conn).await
}

/// Re-check the weekly quota and persist the increment, resetting an expired window. Runs
/// inside the cancellation transaction so the count can never drift past the limit under
/// concurrent cancellations.
pub(crate) async fn check_and_bump_cancel_quota(
    uid: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<UserProfile, LedgerError> {
    let user = fetch_user(uid, &mut *conn).await?.ok_or_else(|| LedgerError::UserNotFound(uid.to_string()))?;
    let effective = user.effective_cancel_count(now);
    if effective >= CANCEL_QUOTA_LIMIT {
        return Err(LedgerError::CancellationQuotaExceeded);
    }
    let user = if effective == 0 {
        sqlx::query_as("UPDATE users SET cancel_count = 1, cancel_window_start = $1 WHERE uid = $2 RETURNING *")
            .bind(now)
            .bind(uid)
            .fetch_one(conn)
            .await?
    } else {
        sqlx::query_as("UPDATE users SET cancel_count = cancel_count + 1 WHERE uid = $1 RETURNING *")
            .bind(uid)
            .fetch_one(conn)
            .await?
    };
    Ok(user)
}
