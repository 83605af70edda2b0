//! Lease-based leader gate
//!
//! Several control-plane instances may share one database. Only the holder
//! of the named lease row runs the singleton loops.
//!
//! ## Protocol
//!
//! ```text
//!   is_master()
//!       │
//!       ▼
//!   UPSERT leader_leases(name, holder = me, expires_at = now + ttl)
//!       ON CONFLICT(name) DO UPDATE ... WHERE holder = me OR expires_at <= now
//!       │
//!       ├── 1 row changed ──► leader (claimed or renewed)
//!       └── 0 rows changed ─► follower (someone else holds a live lease)
//! ```
//!
//! The statement is a single write, so two instances can never both win the
//! same expired lease. The answer is advisory: it is valid at the moment of
//! the call and is never cached.

use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use tracing::{debug, warn};
use uuid::Uuid;

use stratus_core::ports::ILeaderGate;

use crate::convert::format_datetime;
use crate::StoreError;

/// Leader gate backed by a row in the `leader_leases` table
pub struct SqliteLeaseLeader {
    pool: SqlitePool,
    name: String,
    holder: String,
    ttl: Duration,
}

impl SqliteLeaseLeader {
    /// Creates a gate contending for lease `name` with a random holder ID
    ///
    /// # Arguments
    /// * `pool` - Shared database pool
    /// * `name` - Lease row contended for by every instance
    /// * `ttl` - How long a claim stays valid without renewal
    pub fn new(pool: SqlitePool, name: impl Into<String>, ttl: Duration) -> Self {
        Self {
            pool,
            name: name.into(),
            holder: Uuid::new_v4().to_string(),
            ttl,
        }
    }

    /// Returns this instance's holder ID
    pub fn holder(&self) -> &str {
        &self.holder
    }

    /// Claims or renews the lease as of `now`
    ///
    /// Returns `true` if this instance holds the lease afterwards.
    pub async fn try_acquire_at(&self, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT INTO leader_leases (name, holder, expires_at) VALUES (?, ?, ?) \
             ON CONFLICT(name) DO UPDATE SET holder = excluded.holder, expires_at = excluded.expires_at \
             WHERE leader_leases.holder = excluded.holder OR leader_leases.expires_at <= ?",
        )
        .bind(&self.name)
        .bind(&self.holder)
        .bind(format_datetime(&(now + self.ttl)))
        .bind(format_datetime(&now))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Gives the lease up if this instance holds it
    pub async fn release(&self) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM leader_leases WHERE name = ? AND holder = ?")
            .bind(&self.name)
            .bind(&self.holder)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            debug!(lease = %self.name, "Released leader lease");
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ILeaderGate for SqliteLeaseLeader {
    async fn is_master(&self) -> bool {
        match self.try_acquire_at(Utc::now()).await {
            Ok(held) => held,
            Err(e) => {
                warn!(lease = %self.name, error = %e, "Lease check failed, assuming follower");
                false
            }
        }
    }
}
