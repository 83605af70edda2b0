//! Sync scheduler - periodic, leader-gated sweep over every account
//!
//! ## Flow
//!
//! ```text
//! Idle ──tick──→ CheckLeader ──no──→ Idle
//!                    │
//!                   yes
//!                    ↓
//!                  Sweep ──→ one task per vendor (bounded)
//!                               │
//!                               ├── page through accounts
//!                               └── per account: every driver, leader re-checked first
//! ```
//!
//! A failing scope is logged and recorded in the [`SweepReport`]; the
//! sweep moves on to the next driver and account. Losing leadership stops
//! the sweep at the next driver boundary.
//!
//! Public resource drivers (regions, zones, images) only run on the first
//! syncable account of each vendor sweep, signalled by the explicit
//! `first_pass_for_vendor` argument of [`SyncScheduler::sync_account`].

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use stratus_core::config::SyncConfig;
use stratus_core::domain::{AccountDescriptor, AccountId, Vendor};
use stratus_core::ports::{IAccountStore, ILeaderGate, Page};
use stratus_telemetry::MetricsRegistry;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::driver::DriverRegistry;
use crate::reconcile::Reconciler;
use crate::SyncError;

/// Aggregate outcome of a sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub accounts_visited: usize,
    pub scopes_succeeded: usize,
    pub scopes_failed: usize,
    /// One entry per failed scope or account listing
    pub errors: Vec<String>,
    /// True if leadership was lost part-way
    pub leadership_lost: bool,
}

impl SweepReport {
    /// Folds another report into this one
    pub fn merge(&mut self, other: SweepReport) {
        self.accounts_visited += other.accounts_visited;
        self.scopes_succeeded += other.scopes_succeeded;
        self.scopes_failed += other.scopes_failed;
        self.errors.extend(other.errors);
        self.leadership_lost |= other.leadership_lost;
    }

    /// Returns true if every scope succeeded and leadership held
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && !self.leadership_lost
    }

    fn result_label(&self) -> &'static str {
        if self.leadership_lost {
            "leadership_lost"
        } else if self.errors.is_empty() {
            "completed"
        } else {
            "partial"
        }
    }
}

/// Releases an account's sync slot on drop
struct AccountLock {
    in_progress: Arc<DashMap<AccountId, ()>>,
    account_id: AccountId,
}

impl Drop for AccountLock {
    fn drop(&mut self) {
        self.in_progress.remove(&self.account_id);
    }
}

/// Drives reconciliation across every account on an interval
#[derive(Clone)]
pub struct SyncScheduler {
    accounts: Arc<dyn IAccountStore>,
    registry: Arc<DriverRegistry>,
    leader: Arc<dyn ILeaderGate>,
    reconciler: Arc<Reconciler>,
    config: SyncConfig,
    in_progress: Arc<DashMap<AccountId, ()>>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl SyncScheduler {
    pub fn new(
        accounts: Arc<dyn IAccountStore>,
        registry: Arc<DriverRegistry>,
        leader: Arc<dyn ILeaderGate>,
        reconciler: Arc<Reconciler>,
        config: SyncConfig,
    ) -> Self {
        Self {
            accounts,
            registry,
            leader,
            reconciler,
            config,
            in_progress: Arc::new(DashMap::new()),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Runs sweeps every `sync.interval_minutes` until `shutdown` is cancelled
    ///
    /// The first tick fires immediately.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let period = Duration::from_secs(self.config.interval_minutes.max(1) * 60);
        info!(
            interval_minutes = self.config.interval_minutes,
            vendors = self.registry.vendors().len(),
            drivers = self.registry.len(),
            "Sync scheduler starting"
        );

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.cancelled() => break,
            }

            tokio::select! {
                report = self.tick() => {
                    if let Some(report) = report {
                        if !report.is_clean() {
                            warn!(
                                failed = report.scopes_failed,
                                leadership_lost = report.leadership_lost,
                                "Sweep finished with problems"
                            );
                        }
                    }
                }
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested during sweep");
                    break;
                }
            }
        }

        info!("Sync scheduler stopped");
        Ok(())
    }

    /// One scheduler tick: check leadership, then sweep
    ///
    /// Returns `None` when this instance is not the leader.
    pub async fn tick(&self) -> Option<SweepReport> {
        if !self.leader.is_master().await {
            debug!("Not the leader, skipping sweep");
            if let Some(ref metrics) = self.metrics {
                metrics.record_sweep("not_leader");
            }
            return None;
        }

        let report = self.sweep().await;
        if let Some(ref metrics) = self.metrics {
            metrics.record_sweep(report.result_label());
        }
        Some(report)
    }

    /// Sweeps every vendor with registered drivers
    ///
    /// Vendor sweeps run concurrently, at most `sync.max_concurrent_vendors`
    /// at a time.
    pub async fn sweep(&self) -> SweepReport {
        let permits = Arc::new(Semaphore::new(self.config.max_concurrent_vendors.max(1)));
        let mut tasks = JoinSet::new();

        for vendor in self.registry.vendors() {
            let scheduler = self.clone();
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                scheduler.sweep_vendor(vendor).await
            });
        }

        let mut report = SweepReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(vendor_report) => report.merge(vendor_report),
                Err(e) => {
                    error!(error = %e, "Vendor sweep task failed");
                    report.errors.push(format!("vendor sweep task: {e}"));
                }
            }
        }

        info!(
            accounts = report.accounts_visited,
            succeeded = report.scopes_succeeded,
            failed = report.scopes_failed,
            leadership_lost = report.leadership_lost,
            "Sweep complete"
        );
        report
    }

    /// Sweeps all accounts of one vendor, page by page
    pub async fn sweep_vendor(&self, vendor: Vendor) -> SweepReport {
        let mut report = SweepReport::default();
        let mut page = Page::first(self.config.account_page_size.max(1));
        let mut first_pass_for_vendor = true;

        loop {
            let accounts = match self.accounts.list_accounts(vendor, page).await {
                Ok(accounts) => accounts,
                Err(e) => {
                    error!(vendor = %vendor, offset = page.offset, error = %e, "Failed to list accounts");
                    report.errors.push(format!("{vendor}: listing accounts: {e:#}"));
                    break;
                }
            };
            let len = accounts.len();

            for account in &accounts {
                if !account.kind.is_syncable() {
                    debug!(account_id = %account.account_id, kind = %account.kind, "Skipping non-resource account");
                    continue;
                }

                // Public drivers move on to the next account if this one did not run
                match self.sync_account(account, first_pass_for_vendor).await {
                    Ok(account_report) => {
                        report.merge(account_report);
                        first_pass_for_vendor = false;
                    }
                    Err(e) => {
                        warn!(account_id = %account.account_id, error = %e, "Account skipped");
                        report.errors.push(format!("{}: {e}", account.account_id));
                    }
                }

                if report.leadership_lost {
                    info!(vendor = %vendor, "Leadership lost, stopping vendor sweep");
                    return report;
                }
            }

            if page.is_last(len) {
                break;
            }
            page = page.next();
        }

        report
    }

    /// Runs every applicable driver for one account
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::SyncInProgress`] if the account is already being
    /// synced in this process. Scope failures are reported, not returned.
    pub async fn sync_account(
        &self,
        account: &AccountDescriptor,
        first_pass_for_vendor: bool,
    ) -> Result<SweepReport, SyncError> {
        let _lock = self.lock_account(&account.account_id)?;
        let mut report = SweepReport {
            accounts_visited: 1,
            ..SweepReport::default()
        };

        for driver in self.registry.drivers_for(account.vendor) {
            if driver.is_public() && !first_pass_for_vendor {
                continue;
            }
            if !self.leader.is_master().await {
                report.leadership_lost = true;
                break;
            }

            match self.reconciler.reconcile(driver.as_ref(), account).await {
                Ok(_) => report.scopes_succeeded += 1,
                Err(e) => {
                    error!(
                        vendor = %account.vendor,
                        resource_type = %driver.resource_type(),
                        account_id = %account.account_id,
                        error = %format!("{e:#}"),
                        "Reconciliation failed"
                    );
                    report.scopes_failed += 1;
                    report.errors.push(format!(
                        "{}/{}/{}: {e:#}",
                        account.vendor,
                        driver.resource_type(),
                        account.account_id
                    ));
                }
            }
        }

        Ok(report)
    }

    /// Syncs one account on demand
    ///
    /// The account is treated as the first of its vendor, so public
    /// resources are refreshed too. Leadership and the account lock apply
    /// as in a scheduled sweep.
    pub async fn sync_account_now(&self, account_id: &AccountId) -> anyhow::Result<SweepReport> {
        let account = self
            .accounts
            .get_account(account_id)
            .await?
            .ok_or_else(|| SyncError::AccountNotFound(account_id.clone()))?;

        if !account.kind.is_syncable() {
            info!(account_id = %account_id, kind = %account.kind, "Account holds no syncable resources");
            return Ok(SweepReport::default());
        }

        info!(account_id = %account_id, vendor = %account.vendor, "On-demand sync requested");
        Ok(self.sync_account(&account, true).await?)
    }

    /// Returns true if `account_id` is being synced right now
    pub fn is_syncing(&self, account_id: &AccountId) -> bool {
        self.in_progress.contains_key(account_id)
    }

    fn lock_account(&self, account_id: &AccountId) -> Result<AccountLock, SyncError> {
        match self.in_progress.entry(account_id.clone()) {
            Entry::Occupied(_) => Err(SyncError::SyncInProgress(account_id.clone())),
            Entry::Vacant(slot) => {
                slot.insert(());
                Ok(AccountLock {
                    in_progress: Arc::clone(&self.in_progress),
                    account_id: account_id.clone(),
                })
            }
        }
    }
}
