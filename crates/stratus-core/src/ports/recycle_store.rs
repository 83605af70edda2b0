//! Recycle store port
//!
//! Recycle records are created by the recycle trigger (outside the control
//! loops) and afterwards mutated only by the lifecycle manager.

use chrono::{DateTime, Utc};

use crate::domain::{RecordId, RecycleRecord, ResourceType, StoreId, TaskId};

use super::resource_store::Page;

/// Projection returned by the due-record query
///
/// Kept to the two identifiers the manager needs, to bound memory on large
/// recycle bins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueRecord {
    pub id: RecordId,
    pub resource_id: StoreId,
}

/// Port trait for recycle bin persistence
///
/// ## Implementation Notes
///
/// - Every `mark_*` call only touches records still in `WaitingRecycle`
///   and returns how many it changed. Terminal records are never rewritten.
/// - `mark_recovered` is all-or-nothing.
#[async_trait::async_trait]
pub trait IRecycleStore: Send + Sync {
    /// Inserts a new record
    async fn insert(&self, record: &RecycleRecord) -> anyhow::Result<()>;

    /// Retrieves records by ID; missing IDs are skipped
    async fn get_records(&self, ids: &[RecordId]) -> anyhow::Result<Vec<RecycleRecord>>;

    /// Lists `Normal` records of one type in `WaitingRecycle` whose
    /// retention deadline is at or before `now`
    async fn list_due(
        &self,
        resource_type: ResourceType,
        now: DateTime<Utc>,
        page: Page,
    ) -> anyhow::Result<Vec<DueRecord>>;

    /// Lists `Related` records of a task that are still waiting
    async fn list_related(&self, task_id: TaskId) -> anyhow::Result<Vec<RecycleRecord>>;

    /// Marks records as destroyed
    async fn mark_recycled(&self, ids: &[RecordId]) -> anyhow::Result<u64>;

    /// Marks one record as failed with the causing error
    async fn mark_failed(&self, id: RecordId, reason: &str) -> anyhow::Result<u64>;

    /// Marks records as recovered in one transaction
    async fn mark_recovered(&self, ids: &[RecordId]) -> anyhow::Result<u64>;
}
