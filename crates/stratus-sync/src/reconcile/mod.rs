//! Reconciliation of one (vendor, resource type, account) scope
//!
//! ## Pass
//!
//! ```text
//! list cloud ──┐
//!              ├──→ diff ──→ refine ──→ create ──→ update ──→ re-list ──→ delete
//! list store ──┘
//! ```
//!
//! - Both listings run under the retry policy; every driver call is bounded
//!   by the per-call timeout.
//! - Mutations are applied in batches of at most `sync.batch_size`. The
//!   first failing batch ends the pass with an error; deletes never run
//!   after a failed create or update.
//! - Records in regions the listing skipped are never delete candidates.
//! - Before deleting, the cloud is listed again and any candidate that has
//!   reappeared, or whose region is no longer listed, is kept.
//! - A pass interrupted part-way leaves the store partially applied. The
//!   next pass starts from fresh listings and completes it.

mod plan;

pub use plan::{dedup_cloud_items, diff, ReconcilePlan};

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use stratus_core::config::{RetryConfig, SyncConfig};
use stratus_core::domain::{
    AccountDescriptor, AccountId, CloudNativeId, ResourceRecord, ResourceType, StoreId, Vendor,
};
use stratus_core::ports::{ResourceFilter, MAX_BATCH_SIZE};
use stratus_telemetry::MetricsRegistry;
use tracing::{debug, info, warn};

use crate::driver::{CloudListing, ReconcileDriver};
use crate::retry::{retry, with_timeout, RetryPolicy};
use crate::SyncError;

/// Outcome of one successful pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub vendor: Vendor,
    pub resource_type: ResourceType,
    pub account_id: AccountId,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Delete candidates kept because they reappeared in the cloud
    pub skipped_deletes: usize,
    /// Stored records left alone because their region was not listed
    pub unlisted: usize,
    pub duration_ms: u64,
}

impl ReconcileReport {
    fn new(driver: &dyn ReconcileDriver, account_id: AccountId) -> Self {
        Self {
            vendor: driver.vendor(),
            resource_type: driver.resource_type(),
            account_id,
            created: 0,
            updated: 0,
            deleted: 0,
            skipped_deletes: 0,
            unlisted: 0,
            duration_ms: 0,
        }
    }

    /// Returns true if the pass changed nothing
    pub fn is_noop(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.deleted == 0
    }
}

/// Runs reconciliation passes
pub struct Reconciler {
    batch_size: usize,
    call_timeout: Duration,
    retry: RetryConfig,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl Reconciler {
    /// Creates a reconciler
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::BatchTooLarge`] if `sync.batch_size` exceeds
    /// what the store accepts.
    pub fn new(sync: &SyncConfig, retry: RetryConfig) -> Result<Self, SyncError> {
        if sync.batch_size > MAX_BATCH_SIZE {
            return Err(SyncError::BatchTooLarge {
                size: sync.batch_size,
                limit: MAX_BATCH_SIZE,
            });
        }
        Ok(Self {
            batch_size: sync.batch_size.max(1),
            call_timeout: Duration::from_secs(sync.call_timeout_secs),
            retry,
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Runs one pass of `driver` for `account`
    ///
    /// Public drivers reconcile the vendor-wide scope, using `account`
    /// only for cloud access.
    pub async fn reconcile(
        &self,
        driver: &dyn ReconcileDriver,
        account: &AccountDescriptor,
    ) -> anyhow::Result<ReconcileReport> {
        let started = Instant::now();
        let owner = driver.store_account(account);
        let result = self.run_pass(driver, account, owner.clone()).await;
        let elapsed = started.elapsed();

        if let Some(ref metrics) = self.metrics {
            metrics.observe_reconcile_duration(driver.vendor().as_str(), elapsed.as_secs_f64());
        }

        match result {
            Ok(mut report) => {
                report.duration_ms = elapsed.as_millis() as u64;
                self.record(&report);
                Ok(report)
            }
            Err(e) => {
                if let Some(ref metrics) = self.metrics {
                    metrics.record_reconcile_failure(driver.vendor().as_str(), driver.resource_type().as_str());
                }
                Err(e.context(format!(
                    "Reconciling {} {} for {}",
                    driver.vendor(),
                    driver.resource_type(),
                    owner
                )))
            }
        }
    }

    async fn run_pass(
        &self,
        driver: &dyn ReconcileDriver,
        account: &AccountDescriptor,
        owner: AccountId,
    ) -> anyhow::Result<ReconcileReport> {
        let mut report = ReconcileReport::new(driver, owner.clone());
        let filter = ResourceFilter::scope(driver.vendor(), driver.resource_type(), owner.clone());

        let listing = self.list_cloud(driver, account).await?;
        let store = self.list_store(driver, account, &filter).await?;

        let mut plan = diff(driver, listing.items, store);
        if !listing.skipped_regions.is_empty() {
            let before = plan.to_delete.len();
            plan.to_delete
                .retain(|record| !listing.skipped_regions.contains(&record.region));
            report.unlisted = before - plan.to_delete.len();
        }
        driver.refine_plan(&mut plan);

        if plan.is_empty() {
            debug!(
                vendor = %driver.vendor(),
                resource_type = %driver.resource_type(),
                account_id = %owner,
                "Scope already converged"
            );
            return Ok(report);
        }

        debug!(
            vendor = %driver.vendor(),
            resource_type = %driver.resource_type(),
            account_id = %owner,
            to_create = plan.to_create.len(),
            to_update = plan.to_update.len(),
            to_delete = plan.to_delete.len(),
            "Applying reconcile plan"
        );

        for batch in plan.to_create.chunks(self.batch_size) {
            with_timeout("create", self.call_timeout, driver.create(&owner, batch))
                .await
                .with_context(|| format!("Create batch failed after {} created", report.created))?;
            report.created += batch.len();
        }

        for batch in plan.to_update.chunks(self.batch_size) {
            with_timeout("update", self.call_timeout, driver.update(batch))
                .await
                .with_context(|| format!("Update batch failed after {} updated", report.updated))?;
            report.updated += batch.len();
        }

        if plan.to_delete.is_empty() {
            return Ok(report);
        }

        // Anything that came back since the first listing is not deleted
        let relisted = self.list_cloud(driver, account).await?;
        let alive: HashSet<&CloudNativeId> = relisted.items.iter().map(|c| &c.cloud_native_id).collect();
        let mut doomed: Vec<StoreId> = Vec::with_capacity(plan.to_delete.len());
        for record in &plan.to_delete {
            if alive.contains(&record.cloud_native_id) || relisted.skipped(&record.region) {
                warn!(
                    vendor = %driver.vendor(),
                    resource_type = %driver.resource_type(),
                    cloud_id = %record.cloud_native_id,
                    "Delete candidate reappeared or its region went unlisted, keeping record"
                );
                report.skipped_deletes += 1;
            } else {
                doomed.push(record.store_id);
            }
        }

        for batch in doomed.chunks(self.batch_size) {
            with_timeout("delete", self.call_timeout, driver.delete(batch))
                .await
                .with_context(|| format!("Delete batch failed after {} deleted", report.deleted))?;
            report.deleted += batch.len();
        }

        Ok(report)
    }

    async fn list_cloud(
        &self,
        driver: &dyn ReconcileDriver,
        account: &AccountDescriptor,
    ) -> anyhow::Result<CloudListing> {
        let mut policy = RetryPolicy::from_config(&self.retry);
        retry("list_cloud", &mut policy, || {
            with_timeout("list_cloud", self.call_timeout, driver.list_cloud_scoped(account))
        })
        .await
    }

    async fn list_store(
        &self,
        driver: &dyn ReconcileDriver,
        account: &AccountDescriptor,
        filter: &ResourceFilter,
    ) -> anyhow::Result<Vec<ResourceRecord>> {
        let mut policy = RetryPolicy::from_config(&self.retry);
        retry("list_store", &mut policy, || {
            with_timeout("list_store", self.call_timeout, driver.list_store(account, filter))
        })
        .await
    }

    fn record(&self, report: &ReconcileReport) {
        if !report.is_noop() || report.skipped_deletes > 0 || report.unlisted > 0 {
            info!(
                vendor = %report.vendor,
                resource_type = %report.resource_type,
                account_id = %report.account_id,
                created = report.created,
                updated = report.updated,
                deleted = report.deleted,
                skipped_deletes = report.skipped_deletes,
                unlisted = report.unlisted,
                duration_ms = report.duration_ms,
                "Reconciled scope"
            );
        }

        if let Some(ref metrics) = self.metrics {
            let vendor = report.vendor.as_str();
            let resource_type = report.resource_type.as_str();
            metrics.record_reconcile_operations(vendor, resource_type, "create", report.created as u64);
            metrics.record_reconcile_operations(vendor, resource_type, "update", report.updated as u64);
            metrics.record_reconcile_operations(vendor, resource_type, "delete", report.deleted as u64);
        }
    }
}
