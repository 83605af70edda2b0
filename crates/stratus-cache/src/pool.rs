//! SQLite pool shared by every store
//!
//! A file database runs in WAL mode with up to five connections so the
//! control loops can read while a batch commits. The in-memory database
//! keeps one connection, since each SQLite connection owns its own copy.

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::StoreError;

const FILE_CONNECTIONS: u32 = 5;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const SCHEMA: &str = include_str!("migrations/20261019_initial.sql");

/// Connection pool with the Stratus schema applied
#[derive(Clone)]
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Opens (or creates) the store at `db_path`, creating missing parent directories
    pub async fn new(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(dir) = db_path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| {
                StoreError::ConnectionFailed(format!("cannot create {}: {e}", dir.display()))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        let db = Self::open(options, FILE_CONNECTIONS).await?;
        tracing::info!(path = %db_path.display(), "Resource store opened");
        Ok(db)
    }

    /// Opens a private in-memory store
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .foreign_keys(true);
        Self::open(options, 1).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Waits for in-flight queries, then closes every connection
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn open(options: SqliteConnectOptions, connections: u32) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        // Every statement in the schema is IF NOT EXISTS
        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(e.to_string()))?;

        Ok(Self { pool })
    }
}
