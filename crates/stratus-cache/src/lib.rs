//! Stratus Cache - SQLite persistence
//!
//! SQLite-based storage for:
//! - The resource mirror reconciled by the sync scheduler
//! - Registered cloud accounts
//! - The recycle bin
//! - Leader election leases
//!
//! ## Architecture
//!
//! This crate implements the store ports from `stratus-core` (and the
//! `ILeaderGate` port, via a lease row) using SQLite as the storage backend.
//! It is a driven (secondary) adapter in the hexagonal architecture.
//!
//! ## Key Components
//!
//! - [`DatabasePool`] - Connection pool with migration support
//! - [`SqliteResourceStore`] - `IResourceStore` implementation
//! - [`SqliteAccountStore`] - `IAccountStore` implementation
//! - [`SqliteRecycleStore`] - `IRecycleStore` implementation
//! - [`SqliteLeaseLeader`] - `ILeaderGate` backed by a shared lease row
//! - [`StoreError`] - Error types for store operations
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use stratus_cache::{DatabasePool, SqliteResourceStore};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/var/lib/stratus/stratus.db")).await?;
//! let store = SqliteResourceStore::new(pool.pool().clone());
//! // Use store as IResourceStore...
//! # Ok(())
//! # }
//! ```

mod convert;
pub mod account_store;
pub mod lease;
pub mod pool;
pub mod recycle_store;
pub mod resource_store;

pub use account_store::SqliteAccountStore;
pub use lease::SqliteLeaseLeader;
pub use pool::DatabasePool;
pub use recycle_store::SqliteRecycleStore;
pub use resource_store::SqliteResourceStore;

/// Errors that can occur during store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Serialization or deserialization of domain types failed
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A batch call exceeded the per-call item limit
    #[error("Batch of {size} items exceeds the limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },

    /// A conditional update did not match the expected rows
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::QueryFailed(e.to_string())
    }
}

impl From<stratus_core::domain::DomainError> for StoreError {
    fn from(e: stratus_core::domain::DomainError) -> Self {
        StoreError::SerializationError(e.to_string())
    }
}
