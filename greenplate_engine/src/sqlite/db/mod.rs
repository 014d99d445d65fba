use std::{str::FromStr, time::Duration};

use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};

use crate::traits::LedgerError;

pub(crate) mod menu;
pub(crate) mod orders;
pub(crate) mod resale;
pub(crate) mod users;

/// How many times an atomic operation is retried when it loses a write race before the error is
/// surfaced.
pub(crate) const MAX_WRITE_RETRIES: usize = 3;

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(5))
        .journal_mode(SqliteJournalMode::Wal);
    SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await
}

/// True for errors that mean "another writer got there first, try again", as opposed to real
/// failures.
pub(crate) fn is_write_conflict(e: &LedgerError) -> bool {
    match e {
        LedgerError::DatabaseError(msg) => {
            msg.contains("database is locked") || msg.contains("database table is locked")
        },
        _ => false,
    }
}
