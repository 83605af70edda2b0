//! SQLite implementation of IRecycleStore
//!
//! Every status change is a conditional update on `status = 'wait_recycle'`,
//! so terminal records are never rewritten, whoever races to update them.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use stratus_core::domain::{
    AccountId, CloudNativeId, RecordId, RecycleDetail, RecycleRecord, RecycleStatus, RecycleType,
    ResourceType, StoreId, TaskId, Vendor,
};
use stratus_core::ports::{DueRecord, IRecycleStore, Page};

use crate::convert::{check_batch_size, format_datetime, parse_column, parse_datetime, placeholders};
use crate::StoreError;

/// SQLite-based implementation of the recycle store port
pub struct SqliteRecycleStore {
    pool: SqlitePool,
}

impl SqliteRecycleStore {
    /// Creates a new store instance with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Reconstruct a RecycleRecord from a database row
fn recycle_record_from_row(row: &SqliteRow) -> Result<RecycleRecord, StoreError> {
    let id: String = row.get("id");
    let task_id: String = row.get("task_id");
    let vendor: String = row.get("vendor");
    let resource_type: String = row.get("resource_type");
    let resource_id: String = row.get("resource_id");
    let cloud_resource_id: String = row.get("cloud_resource_id");
    let account_id: String = row.get("account_id");
    let region: String = row.get("region");
    let recycle_type: String = row.get("recycle_type");
    let status: String = row.get("status");
    let detail: String = row.get("detail");
    let failure_reason: Option<String> = row.get("failure_reason");
    let created_at: String = row.get("created_at");
    let retention_deadline: String = row.get("retention_deadline");

    let detail: RecycleDetail = serde_json::from_str(&detail)
        .map_err(|e| StoreError::SerializationError(format!("Failed to parse detail: {}", e)))?;

    Ok(RecycleRecord::from_parts(
        parse_column::<RecordId>("id", &id)?,
        parse_column::<TaskId>("task_id", &task_id)?,
        parse_column::<Vendor>("vendor", &vendor)?,
        parse_column::<ResourceType>("resource_type", &resource_type)?,
        parse_column::<StoreId>("resource_id", &resource_id)?,
        CloudNativeId::new(cloud_resource_id)?,
        AccountId::new(account_id)?,
        region,
        parse_column::<RecycleType>("recycle_type", &recycle_type)?,
        parse_column::<RecycleStatus>("status", &status)?,
        detail,
        failure_reason,
        parse_datetime(&created_at)?,
        parse_datetime(&retention_deadline)?,
    ))
}

#[async_trait::async_trait]
impl IRecycleStore for SqliteRecycleStore {
    async fn insert(&self, record: &RecycleRecord) -> anyhow::Result<()> {
        let detail = serde_json::to_string(record.detail())
            .map_err(|e| StoreError::SerializationError(format!("Failed to serialize detail: {}", e)))?;

        sqlx::query(
            "INSERT INTO recycle_records \
             (id, task_id, vendor, resource_type, resource_id, cloud_resource_id, account_id, \
              region, recycle_type, status, detail, failure_reason, created_at, \
              retention_deadline, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id().to_string())
        .bind(record.task_id().to_string())
        .bind(record.vendor().as_str())
        .bind(record.resource_type().as_str())
        .bind(record.resource_id().to_string())
        .bind(record.cloud_resource_id().as_str())
        .bind(record.account_id().as_str())
        .bind(record.region())
        .bind(record.recycle_type().as_str())
        .bind(record.status().as_str())
        .bind(detail)
        .bind(record.failure_reason())
        .bind(format_datetime(&record.created_at()))
        .bind(format_datetime(&record.retention_deadline()))
        .bind(format_datetime(&Utc::now()))
        .execute(&self.pool)
        .await?;

        tracing::trace!(record_id = %record.id(), "Inserted recycle record");
        Ok(())
    }

    async fn get_records(&self, ids: &[RecordId]) -> anyhow::Result<Vec<RecycleRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT * FROM recycle_records WHERE id IN ({}) ORDER BY created_at, id",
            placeholders(ids.len())
        );
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id.to_string());
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            records.push(recycle_record_from_row(row)?);
        }
        Ok(records)
    }

    async fn list_due(
        &self,
        resource_type: ResourceType,
        now: DateTime<Utc>,
        page: Page,
    ) -> anyhow::Result<Vec<DueRecord>> {
        let rows = sqlx::query(
            "SELECT id, resource_id FROM recycle_records \
             WHERE resource_type = ? AND status = ? AND recycle_type = ? \
               AND retention_deadline <= ? \
             ORDER BY retention_deadline, id LIMIT ? OFFSET ?",
        )
        .bind(resource_type.as_str())
        .bind(RecycleStatus::WaitingRecycle.as_str())
        .bind(RecycleType::Normal.as_str())
        .bind(format_datetime(&now))
        .bind(i64::from(page.limit))
        .bind(i64::from(page.offset))
        .fetch_all(&self.pool)
        .await?;

        let mut due = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: String = row.get("id");
            let resource_id: String = row.get("resource_id");
            due.push(DueRecord {
                id: parse_column("id", &id)?,
                resource_id: parse_column("resource_id", &resource_id)?,
            });
        }
        Ok(due)
    }

    async fn list_related(&self, task_id: TaskId) -> anyhow::Result<Vec<RecycleRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM recycle_records \
             WHERE task_id = ? AND recycle_type = ? AND status = ? ORDER BY id",
        )
        .bind(task_id.to_string())
        .bind(RecycleType::Related.as_str())
        .bind(RecycleStatus::WaitingRecycle.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            records.push(recycle_record_from_row(row)?);
        }
        Ok(records)
    }

    async fn mark_recycled(&self, ids: &[RecordId]) -> anyhow::Result<u64> {
        check_batch_size(ids.len())?;
        if ids.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            "UPDATE recycle_records SET status = ?, updated_at = ? \
             WHERE status = ? AND id IN ({})",
            placeholders(ids.len())
        );
        let mut query = sqlx::query(&sql)
            .bind(RecycleStatus::Recycled.as_str())
            .bind(format_datetime(&Utc::now()))
            .bind(RecycleStatus::WaitingRecycle.as_str());
        for id in ids {
            query = query.bind(id.to_string());
        }
        let result = query.execute(&self.pool).await?;

        Ok(result.rows_affected())
    }

    async fn mark_failed(&self, id: RecordId, reason: &str) -> anyhow::Result<u64> {
        let result = sqlx::query(
            "UPDATE recycle_records SET status = ?, failure_reason = ?, updated_at = ? \
             WHERE id = ? AND status = ?",
        )
        .bind(RecycleStatus::Failed.as_str())
        .bind(reason)
        .bind(format_datetime(&Utc::now()))
        .bind(id.to_string())
        .bind(RecycleStatus::WaitingRecycle.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn mark_recovered(&self, ids: &[RecordId]) -> anyhow::Result<u64> {
        check_batch_size(ids.len())?;
        if ids.is_empty() {
            return Ok(0);
        }

        let now = format_datetime(&Utc::now());
        let mut tx = self.pool.begin().await?;
        let mut changed = 0;
        for id in ids {
            let result = sqlx::query(
                "UPDATE recycle_records SET status = ?, updated_at = ? \
                 WHERE id = ? AND status = ?",
            )
            .bind(RecycleStatus::Recovered.as_str())
            .bind(&now)
            .bind(id.to_string())
            .bind(RecycleStatus::WaitingRecycle.as_str())
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from)?;

            if result.rows_affected() == 0 {
                // Dropping the transaction rolls back the earlier rows
                return Err(StoreError::Conflict(format!(
                    "Recycle record {} is not recoverable",
                    id
                ))
                .into());
            }
            changed += result.rows_affected();
        }
        tx.commit().await?;

        tracing::debug!(count = changed, "Recovered recycle records");
        Ok(changed)
    }
}
