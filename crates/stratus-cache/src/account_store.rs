//! SQLite implementation of IAccountStore
//!
//! Accounts are registered by the account management service; the control
//! loops only read them. [`SqliteAccountStore::upsert_account`] exists for
//! that service and for seeding tests.

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use stratus_core::domain::{AccountDescriptor, AccountId, AccountKind, Vendor};
use stratus_core::ports::{IAccountStore, Page};

use crate::convert::{format_datetime, parse_column};
use crate::StoreError;

/// SQLite-based implementation of the account store port
pub struct SqliteAccountStore {
    pool: SqlitePool,
}

impl SqliteAccountStore {
    /// Creates a new store instance with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts an account, or replaces its vendor and kind if it exists
    pub async fn upsert_account(&self, account: &AccountDescriptor) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO accounts (account_id, vendor, kind, created_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT(account_id) DO UPDATE SET vendor = excluded.vendor, kind = excluded.kind",
        )
        .bind(account.account_id.as_str())
        .bind(account.vendor.as_str())
        .bind(account.kind.as_str())
        .bind(format_datetime(&Utc::now()))
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            account_id = %account.account_id,
            vendor = %account.vendor,
            "Saved account"
        );
        Ok(())
    }
}

/// Reconstruct an AccountDescriptor from a database row
fn account_from_row(row: &SqliteRow) -> Result<AccountDescriptor, StoreError> {
    let account_id: String = row.get("account_id");
    let vendor: String = row.get("vendor");
    let kind: String = row.get("kind");

    Ok(
        AccountDescriptor::new(AccountId::new(account_id)?, parse_column::<Vendor>("vendor", &vendor)?)
            .with_kind(parse_column::<AccountKind>("kind", &kind)?),
    )
}

#[async_trait::async_trait]
impl IAccountStore for SqliteAccountStore {
    async fn list_accounts(&self, vendor: Vendor, page: Page) -> anyhow::Result<Vec<AccountDescriptor>> {
        let rows = sqlx::query(
            "SELECT * FROM accounts WHERE vendor = ? ORDER BY account_id LIMIT ? OFFSET ?",
        )
        .bind(vendor.as_str())
        .bind(i64::from(page.limit))
        .bind(i64::from(page.offset))
        .fetch_all(&self.pool)
        .await?;

        let mut accounts = Vec::with_capacity(rows.len());
        for row in &rows {
            accounts.push(account_from_row(row)?);
        }
        Ok(accounts)
    }

    async fn get_account(&self, id: &AccountId) -> anyhow::Result<Option<AccountDescriptor>> {
        let row = sqlx::query("SELECT * FROM accounts WHERE account_id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(account_from_row(r)?)),
            None => Ok(None),
        }
    }
}
