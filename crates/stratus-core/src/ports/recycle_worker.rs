//! Recycle worker port
//!
//! A worker performs the real, destructive action for one resource type
//! once its recycle record is due. Workers are invoked under the retry
//! policy and must be safe to call again after a partial failure.

use crate::domain::{RecycleRecord, ResourceBasicInfo};

/// Port trait for destroying a recycled resource
#[async_trait::async_trait]
pub trait IRecycleWorker: Send + Sync {
    /// Destroys the resource behind `record` and its recorded dependents
    ///
    /// `info` is `None` when the resource is no longer in the store; the
    /// worker then relies on the identifiers kept in the record.
    async fn destroy(
        &self,
        record: &RecycleRecord,
        info: Option<&ResourceBasicInfo>,
    ) -> anyhow::Result<()>;
}
