//! SQLite implementation of IResourceStore
//!
//! Each batch call runs in its own transaction, so a batch is applied
//! entirely or not at all. Nothing spans batches.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use stratus_core::domain::{
    AccountId, Attributes, CloudNativeId, ResourceBasicInfo, ResourceRecord, ResourceType,
    StoreId, Vendor,
};
use stratus_core::ports::{IResourceStore, Page, ResourceFilter};

use crate::convert::{check_batch_size, format_datetime, parse_column, parse_datetime, placeholders};
use crate::StoreError;

/// SQLite-based implementation of the resource store port
pub struct SqliteResourceStore {
    pool: SqlitePool,
}

impl SqliteResourceStore {
    /// Creates a new store instance with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Counts records matching `filter`
    pub async fn count(&self, filter: &ResourceFilter) -> Result<u64, StoreError> {
        let (clause, binds) = filter_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM resources WHERE 1=1{clause}");

        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for bind in &binds {
            query = query.bind(bind);
        }
        let count = query.fetch_one(&self.pool).await?;
        Ok(count as u64)
    }
}

// ============================================================================
// Query building and row mapping
// ============================================================================

/// Translates a filter into `AND ...` conditions plus their bind values
fn filter_clause(filter: &ResourceFilter) -> (String, Vec<String>) {
    let mut sql = String::new();
    let mut binds: Vec<String> = Vec::new();

    if let Some(vendor) = filter.vendor {
        sql.push_str(" AND vendor = ?");
        binds.push(vendor.as_str().to_string());
    }

    if let Some(resource_type) = filter.resource_type {
        sql.push_str(" AND resource_type = ?");
        binds.push(resource_type.as_str().to_string());
    }

    if let Some(ref account_id) = filter.account_id {
        sql.push_str(" AND account_id = ?");
        binds.push(account_id.as_str().to_string());
    }

    if let Some(ref region) = filter.region {
        sql.push_str(" AND region = ?");
        binds.push(region.clone());
    }

    if let Some(ref ids) = filter.cloud_native_ids {
        if ids.is_empty() {
            // An empty ID list matches nothing
            sql.push_str(" AND 1=0");
        } else {
            sql.push_str(&format!(" AND cloud_native_id IN ({})", placeholders(ids.len())));
            binds.extend(ids.iter().map(|id| id.as_str().to_string()));
        }
    }

    (sql, binds)
}

/// Reconstruct a ResourceRecord from a database row
fn record_from_row(row: &SqliteRow) -> Result<ResourceRecord, StoreError> {
    let store_id: String = row.get("store_id");
    let vendor: String = row.get("vendor");
    let resource_type: String = row.get("resource_type");
    let cloud_native_id: String = row.get("cloud_native_id");
    let account_id: String = row.get("account_id");
    let region: String = row.get("region");
    let attributes: String = row.get("attributes");
    let last_synced_at: String = row.get("last_synced_at");

    let attributes: Attributes = serde_json::from_str(&attributes).map_err(|e| {
        StoreError::SerializationError(format!("Failed to parse attributes: {}", e))
    })?;

    Ok(ResourceRecord {
        store_id: parse_column::<StoreId>("store_id", &store_id)?,
        vendor: parse_column::<Vendor>("vendor", &vendor)?,
        resource_type: parse_column::<ResourceType>("resource_type", &resource_type)?,
        cloud_native_id: CloudNativeId::new(cloud_native_id)?,
        account_id: AccountId::new(account_id)?,
        region,
        attributes,
        last_synced_at: parse_datetime(&last_synced_at)?,
    })
}

fn serialize_attributes(attributes: &Attributes) -> Result<String, StoreError> {
    serde_json::to_string(attributes).map_err(|e| {
        StoreError::SerializationError(format!("Failed to serialize attributes: {}", e))
    })
}

// ============================================================================
// IResourceStore implementation
// ============================================================================

#[async_trait::async_trait]
impl IResourceStore for SqliteResourceStore {
    async fn list(&self, filter: &ResourceFilter, page: Page) -> anyhow::Result<Vec<ResourceRecord>> {
        let (clause, binds) = filter_clause(filter);
        let sql = format!(
            "SELECT * FROM resources WHERE 1=1{clause} \
             ORDER BY cloud_native_id, store_id LIMIT ? OFFSET ?"
        );

        let mut query = sqlx::query(&sql);
        for bind in &binds {
            query = query.bind(bind);
        }
        let rows = query
            .bind(i64::from(page.limit))
            .bind(i64::from(page.offset))
            .fetch_all(&self.pool)
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            records.push(record_from_row(row)?);
        }
        Ok(records)
    }

    async fn batch_create(&self, records: &[ResourceRecord]) -> anyhow::Result<()> {
        check_batch_size(records.len())?;
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for record in records {
            sqlx::query(
                "INSERT INTO resources \
                 (store_id, vendor, resource_type, cloud_native_id, account_id, \
                  region, attributes, last_synced_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(record.store_id.to_string())
            .bind(record.vendor.as_str())
            .bind(record.resource_type.as_str())
            .bind(record.cloud_native_id.as_str())
            .bind(record.account_id.as_str())
            .bind(&record.region)
            .bind(serialize_attributes(&record.attributes)?)
            .bind(format_datetime(&record.last_synced_at))
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from)?;
        }
        tx.commit().await?;

        tracing::trace!(count = records.len(), "Created resource batch");
        Ok(())
    }

    async fn batch_update(&self, records: &[ResourceRecord]) -> anyhow::Result<()> {
        check_batch_size(records.len())?;
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for record in records {
            sqlx::query(
                "UPDATE resources SET region = ?, attributes = ?, last_synced_at = ? \
                 WHERE store_id = ?",
            )
            .bind(&record.region)
            .bind(serialize_attributes(&record.attributes)?)
            .bind(format_datetime(&record.last_synced_at))
            .bind(record.store_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from)?;
        }
        tx.commit().await?;

        tracing::trace!(count = records.len(), "Updated resource batch");
        Ok(())
    }

    async fn batch_delete(&self, ids: &[StoreId]) -> anyhow::Result<()> {
        check_batch_size(ids.len())?;
        if ids.is_empty() {
            return Ok(());
        }

        let sql = format!(
            "DELETE FROM resources WHERE store_id IN ({})",
            placeholders(ids.len())
        );
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id.to_string());
        }

        let mut tx = self.pool.begin().await?;
        let result = query.execute(&mut *tx).await.map_err(StoreError::from)?;
        tx.commit().await?;

        tracing::trace!(
            requested = ids.len(),
            deleted = result.rows_affected(),
            "Deleted resource batch"
        );
        Ok(())
    }

    async fn get_basic_info(
        &self,
        resource_type: ResourceType,
        id: &StoreId,
    ) -> anyhow::Result<Option<ResourceBasicInfo>> {
        let row = sqlx::query("SELECT * FROM resources WHERE store_id = ? AND resource_type = ?")
            .bind(id.to_string())
            .bind(resource_type.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(ResourceBasicInfo::from(&record_from_row(r)?))),
            None => Ok(None),
        }
    }
}
