//! Helpers for spinning up throwaway SQLite databases in tests.
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

use crate::SqliteDatabase;

/// Create a fresh database at `url`, run the migrations, and hand back a connected backend.
pub async fn prepare_test_env(url: &str) -> SqliteDatabase {
    create_database(url).await;
    // Single connection: WAL cross-connection visibility relies on shared memory (the `-shm` file),
    // which the test sandbox's tmpfs does not honour, so a write on one pooled connection is not
    // reliably seen by a read on another. One connection keeps read-your-writes correct in tests.
    let db = SqliteDatabase::new_with_url(url, 1).await.expect("Error creating connection to database");
    db.run_migrations().await.expect("Error running DB migrations");
    info!("🚀️ Migrations complete");
    db
}

/// A unique database path under the system temp directory.
pub fn random_db_path() -> String {
    format!("sqlite://{}/greenplate_test_{}.db", std::env::temp_dir().display(), rand::random::<u64>())
}

pub async fn create_database(url: &str) {
    if let Err(e) = Sqlite::drop_database(url).await {
        warn!("Error dropping database {url}: {e:?}");
    }
    Sqlite::create_database(url).await.expect("Error creating database");
    info!("Created Sqlite database {url}");
}
