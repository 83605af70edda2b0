//! Recycle-bin lifecycle manager
//!
//! A recycled resource stays recoverable until its retention deadline.
//! After that, one loop per resource type destroys it:
//!
//! ```text
//! loop:
//!   not leader ──→ sleep leader.standby_sleep_secs
//!   list due records (Normal, WaitingRecycle, deadline ≤ now)
//!   none due   ──→ sleep recycle.idle_interval_secs
//!   for each record (leader re-checked before each):
//!     fetch basic info ──→ worker.destroy, both under the retry policy
//!       ok        ──→ Recycled (with its related records)
//!       exhausted ──→ Failed (last error kept)
//!       store error ──→ logged, record left waiting, pass continues
//! ```
//!
//! Related records (dependents recycled with a parent) are never selected
//! on their own. They settle together with their parent.

mod worker;

pub use worker::GatewayRecycleWorker;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use stratus_core::config::{RecycleConfig, RetryConfig};
use stratus_core::domain::{RecordId, RecycleRecord, RecycleStatus, RecycleType, ResourceType};
use stratus_core::ports::{DueRecord, ILeaderGate, IRecycleStore, IRecycleWorker, IResourceStore, Page};
use stratus_telemetry::MetricsRegistry;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::retry::{retry, RetryPolicy};
use crate::SyncError;

/// Outcome of one pass over the due records of a type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecycleReport {
    pub resource_type: ResourceType,
    /// Due records examined
    pub due: usize,
    pub recycled: usize,
    pub failed: usize,
    /// Records left waiting after a store error
    pub errors: usize,
    /// True if the pass stopped because leadership moved
    pub leadership_lost: bool,
}

impl RecycleReport {
    fn new(resource_type: ResourceType) -> Self {
        Self {
            resource_type,
            due: 0,
            recycled: 0,
            failed: 0,
            errors: 0,
            leadership_lost: false,
        }
    }

    /// Records moved to a terminal state
    pub fn settled(&self) -> usize {
        self.recycled + self.failed
    }
}

enum Outcome {
    Recycled,
    Failed,
    Skipped,
}

/// Returns true if `related` is a dependent listed in `parent`'s detail
fn is_dependent_of(parent: &RecycleRecord, related: &RecycleRecord) -> bool {
    if related.task_id() != parent.task_id() || related.recycle_type() != RecycleType::Related {
        return false;
    }
    let detail = parent.detail();
    let id = related.cloud_resource_id();
    match related.resource_type() {
        ResourceType::Disk => detail.disks.contains(id),
        ResourceType::Eip => detail.eips.contains(id),
        _ => false,
    }
}

/// Drives recycle records to a terminal state
pub struct RecycleManager {
    records: Arc<dyn IRecycleStore>,
    resources: Arc<dyn IResourceStore>,
    leader: Arc<dyn ILeaderGate>,
    workers: HashMap<ResourceType, Arc<dyn IRecycleWorker>>,
    config: RecycleConfig,
    retry: RetryConfig,
    standby_sleep: Duration,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl RecycleManager {
    pub fn new(
        records: Arc<dyn IRecycleStore>,
        resources: Arc<dyn IResourceStore>,
        leader: Arc<dyn ILeaderGate>,
        config: RecycleConfig,
        retry: RetryConfig,
        standby_sleep: Duration,
    ) -> Self {
        Self {
            records,
            resources,
            leader,
            workers: HashMap::new(),
            config,
            retry,
            standby_sleep,
            metrics: None,
        }
    }

    /// Registers the worker destroying resources of `resource_type`
    pub fn with_worker(mut self, resource_type: ResourceType, worker: Arc<dyn IRecycleWorker>) -> Self {
        self.workers.insert(resource_type, worker);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Resource types with a destruction loop
    pub fn resource_types(&self) -> &[ResourceType] {
        &self.config.resource_types
    }

    /// Runs the destruction loop of one resource type until `shutdown`
    ///
    /// # Errors
    ///
    /// Fails immediately if no worker is registered for `resource_type`.
    /// Errors inside an iteration are logged and the loop idles.
    pub async fn run(&self, resource_type: ResourceType, shutdown: CancellationToken) -> anyhow::Result<()> {
        if !self.workers.contains_key(&resource_type) {
            anyhow::bail!("No recycle worker registered for {resource_type}");
        }
        let idle = Duration::from_secs(self.config.idle_interval_secs);
        info!(resource_type = %resource_type, idle_secs = idle.as_secs(), "Recycle loop starting");

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            if !self.leader.is_master().await {
                debug!(resource_type = %resource_type, "Not the leader, standing by");
                if !sleep_or_cancel(self.standby_sleep, &shutdown).await {
                    break;
                }
                continue;
            }

            let pass = tokio::select! {
                result = self.process_due(resource_type, Utc::now()) => result,
                _ = shutdown.cancelled() => break,
            };

            let should_idle = match pass {
                Ok(report) => {
                    if report.due > 0 {
                        info!(
                            resource_type = %resource_type,
                            due = report.due,
                            recycled = report.recycled,
                            failed = report.failed,
                            leadership_lost = report.leadership_lost,
                            "Recycle pass complete"
                        );
                    }
                    report.settled() == 0 && !report.leadership_lost
                }
                Err(e) => {
                    warn!(resource_type = %resource_type, error = %format!("{e:#}"), "Recycle pass failed");
                    true
                }
            };

            if should_idle && !sleep_or_cancel(idle, &shutdown).await {
                break;
            }
        }

        info!(resource_type = %resource_type, "Recycle loop stopped");
        Ok(())
    }

    /// Processes every record of `resource_type` due at `now`
    ///
    /// Settled records leave the due set, so each page is queried at an
    /// offset counting only the records still waiting from earlier pages.
    /// A record whose processing hits a store error is logged, counted in
    /// [`RecycleReport::errors`] and stepped over.
    pub async fn process_due(&self, resource_type: ResourceType, now: DateTime<Utc>) -> anyhow::Result<RecycleReport> {
        let worker = self
            .workers
            .get(&resource_type)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("No recycle worker registered for {resource_type}"))?;
        let mut page = Page::first(self.config.page_size.max(1));
        let mut report = RecycleReport::new(resource_type);

        loop {
            let due = self.records.list_due(resource_type, now, page).await?;
            if due.is_empty() {
                break;
            }

            for entry in &due {
                if !self.leader.is_master().await {
                    info!(resource_type = %resource_type, "Leadership lost, pausing recycle pass");
                    report.leadership_lost = true;
                    return Ok(report);
                }
                report.due += 1;
                match self.recycle_one(worker.as_ref(), entry).await {
                    Ok(Outcome::Recycled) => report.recycled += 1,
                    Ok(Outcome::Failed) => report.failed += 1,
                    Ok(Outcome::Skipped) => {}
                    Err(e) => {
                        error!(
                            record_id = %entry.id,
                            resource_type = %resource_type,
                            error = %format!("{e:#}"),
                            "Recycle record left waiting"
                        );
                        report.errors += 1;
                        page.offset = page.offset.saturating_add(1);
                    }
                }
            }

            if page.is_last(due.len()) {
                break;
            }
        }

        Ok(report)
    }

    async fn recycle_one(&self, worker: &dyn IRecycleWorker, due: &DueRecord) -> anyhow::Result<Outcome> {
        let record = match self.records.get_records(&[due.id]).await?.into_iter().next() {
            Some(r) if r.status() == RecycleStatus::WaitingRecycle && r.recycle_type() == RecycleType::Normal => r,
            _ => {
                debug!(record_id = %due.id, "Record no longer waiting, skipping");
                return Ok(Outcome::Skipped);
            }
        };
        let resource_type = record.resource_type();

        let mut policy = RetryPolicy::from_config(&self.retry);
        let info = match retry("recycle_basic_info", &mut policy, || {
            self.resources.get_basic_info(resource_type, &due.resource_id)
        })
        .await
        {
            Ok(info) => info,
            Err(e) => {
                let reason = format!("basic info lookup failed: {e:#}");
                return self.fail(&record, reason, policy.retry_count() + 1).await;
            }
        };
        if info.is_none() {
            debug!(
                record_id = %record.id(),
                cloud_id = %record.cloud_resource_id(),
                "Resource already gone from store, destroying by recorded IDs"
            );
        }

        let mut policy = RetryPolicy::from_config(&self.retry);
        let destroyed = retry("recycle_destroy", &mut policy, || worker.destroy(&record, info.as_ref())).await;

        match destroyed {
            Ok(()) => {
                let mut ids = vec![record.id()];
                let related = self.records.list_related(record.task_id()).await?;
                ids.extend(
                    related
                        .iter()
                        .filter(|r| is_dependent_of(&record, r))
                        .map(RecycleRecord::id),
                );
                let changed = self.records.mark_recycled(&ids).await?;

                info!(
                    record_id = %record.id(),
                    resource_type = %resource_type,
                    cloud_id = %record.cloud_resource_id(),
                    related = ids.len() - 1,
                    changed,
                    "Resource recycled"
                );
                if let Some(ref metrics) = self.metrics {
                    metrics.record_recycle(resource_type.as_str(), "recycled", 1);
                    metrics.record_recycle(resource_type.as_str(), "related", (ids.len() - 1) as u64);
                }
                Ok(Outcome::Recycled)
            }
            Err(e) => self.fail(&record, format!("{e:#}"), policy.retry_count() + 1).await,
        }
    }

    async fn fail(&self, record: &RecycleRecord, reason: String, attempts: u32) -> anyhow::Result<Outcome> {
        let resource_type = record.resource_type();
        error!(
            record_id = %record.id(),
            resource_type = %resource_type,
            cloud_id = %record.cloud_resource_id(),
            attempts,
            error = %reason,
            "Recycle failed, giving up"
        );
        self.records.mark_failed(record.id(), &reason).await?;
        if let Some(ref metrics) = self.metrics {
            metrics.record_recycle(resource_type.as_str(), "failed", 1);
        }
        Ok(Outcome::Failed)
    }

    /// Restores recycled resources before their deadline
    ///
    /// Every ID must name an existing `Normal` record still waiting. The
    /// related records of each parent are recovered with it. Nothing
    /// changes unless every record can be recovered.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidRecycleOperation`] when validation fails.
    pub async fn recover(&self, ids: &[RecordId]) -> anyhow::Result<u64> {
        let mut seen = HashSet::new();
        let ids: Vec<RecordId> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();
        if ids.is_empty() {
            return Err(SyncError::InvalidRecycleOperation("no record IDs given".to_string()).into());
        }

        let records = self.records.get_records(&ids).await?;
        let by_id: HashMap<RecordId, &RecycleRecord> = records.iter().map(|r| (r.id(), r)).collect();

        let mut targets = Vec::with_capacity(ids.len());
        for id in &ids {
            let record = by_id
                .get(id)
                .ok_or_else(|| SyncError::InvalidRecycleOperation(format!("record {id} not found")))?;
            if record.status() != RecycleStatus::WaitingRecycle {
                return Err(SyncError::InvalidRecycleOperation(format!(
                    "record {id} is {}",
                    record.status()
                ))
                .into());
            }
            if record.recycle_type() == RecycleType::Related {
                return Err(SyncError::InvalidRecycleOperation(format!(
                    "record {id} is a related record, recover its parent instead"
                ))
                .into());
            }
            targets.push(record.id());

            for related in self.records.list_related(record.task_id()).await? {
                if is_dependent_of(record, &related) && seen.insert(related.id()) {
                    targets.push(related.id());
                }
            }
        }

        let recovered = self.records.mark_recovered(&targets).await?;
        info!(requested = ids.len(), recovered, "Recycle records recovered");
        Ok(recovered)
    }
}

/// Sleeps for `duration`; returns false if `shutdown` fired first
async fn sleep_or_cancel(duration: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = shutdown.cancelled() => false,
    }
}
