//! DaemonService - wires stores, gateway, leader gate and control loops
//!
//! One service instance backs every `stratusd` subcommand. `run` hands the
//! long-running loops to a [`Supervisor`]; `sync_account` and `recover`
//! are single operations that return once done.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use stratus_cache::{
    DatabasePool, SqliteAccountStore, SqliteLeaseLeader, SqliteRecycleStore, SqliteResourceStore,
};
use stratus_core::config::Config;
use stratus_core::domain::{AccountId, RecordId};
use stratus_core::ports::ILeaderGate;
use stratus_gateway::HttpCloudGateway;
use stratus_sync::drivers::build_registry;
use stratus_sync::leader::{ObservedLeader, StandaloneLeader};
use stratus_sync::reconcile::Reconciler;
use stratus_sync::recycle::{GatewayRecycleWorker, RecycleManager};
use stratus_sync::scheduler::{SweepReport, SyncScheduler};
use stratus_sync::supervisor::Supervisor;
use stratus_telemetry::{MetricsRegistry, MetricsServer};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Everything the control loops run against
pub struct DaemonService {
    config: Config,
    db: DatabasePool,
    accounts: Arc<SqliteAccountStore>,
    resources: Arc<SqliteResourceStore>,
    records: Arc<SqliteRecycleStore>,
    gateway: Arc<HttpCloudGateway>,
    leader: Arc<dyn ILeaderGate>,
    /// Held so the lease can be released on shutdown
    lease: Option<Arc<SqliteLeaseLeader>>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl DaemonService {
    /// Opens the database and builds every adapter from `config`
    pub async fn new(config: Config) -> Result<Self> {
        let db = DatabasePool::new(&config.database.path)
            .await
            .with_context(|| format!("Failed to open database {}", config.database.path.display()))?;
        info!(path = %config.database.path.display(), "Database opened");

        let gateway = Arc::new(
            HttpCloudGateway::from_config(&config.gateway).context("Failed to build cloud gateway client")?,
        );

        let metrics = if config.telemetry.metrics_enabled {
            Some(Arc::new(MetricsRegistry::new()?))
        } else {
            None
        };

        let lease = match config.leader.mode.as_str() {
            "standalone" => None,
            _ => Some(Arc::new(SqliteLeaseLeader::new(
                db.pool().clone(),
                config.leader.lease_name.clone(),
                chrono::Duration::seconds(config.leader.lease_ttl_secs as i64),
            ))),
        };
        let inner: Arc<dyn ILeaderGate> = match &lease {
            Some(lease) => {
                info!(lease = %config.leader.lease_name, holder = %lease.holder(), "Using lease leader election");
                Arc::clone(lease) as Arc<dyn ILeaderGate>
            }
            None => {
                info!("Running standalone, this instance always leads");
                Arc::new(StandaloneLeader)
            }
        };
        let mut observed = ObservedLeader::new(inner);
        if let Some(ref metrics) = metrics {
            observed = observed.with_metrics(Arc::clone(metrics));
        }

        Ok(Self {
            accounts: Arc::new(SqliteAccountStore::new(db.pool().clone())),
            resources: Arc::new(SqliteResourceStore::new(db.pool().clone())),
            records: Arc::new(SqliteRecycleStore::new(db.pool().clone())),
            gateway,
            leader: Arc::new(observed),
            lease,
            metrics,
            db,
            config,
        })
    }

    /// Builds the sync scheduler over every registered driver
    pub fn scheduler(&self) -> Result<SyncScheduler> {
        let registry = build_registry(self.gateway.clone(), self.resources.clone());
        let mut reconciler = Reconciler::new(&self.config.sync, self.config.retry.clone())?;
        if let Some(ref metrics) = self.metrics {
            reconciler = reconciler.with_metrics(Arc::clone(metrics));
        }

        let mut scheduler = SyncScheduler::new(
            self.accounts.clone(),
            Arc::new(registry),
            Arc::clone(&self.leader),
            Arc::new(reconciler),
            self.config.sync.clone(),
        );
        if let Some(ref metrics) = self.metrics {
            scheduler = scheduler.with_metrics(Arc::clone(metrics));
        }
        Ok(scheduler)
    }

    /// Builds the recycle manager with a gateway worker per configured type
    pub fn recycle_manager(&self) -> RecycleManager {
        let worker = Arc::new(GatewayRecycleWorker::new(self.gateway.clone(), self.resources.clone()));
        let mut manager = RecycleManager::new(
            self.records.clone(),
            self.resources.clone(),
            Arc::clone(&self.leader),
            self.config.recycle.clone(),
            self.config.retry.clone(),
            Duration::from_secs(self.config.leader.standby_sleep_secs),
        );
        for resource_type in &self.config.recycle.resource_types {
            manager = manager.with_worker(*resource_type, worker.clone());
        }
        if let Some(ref metrics) = self.metrics {
            manager = manager.with_metrics(Arc::clone(metrics));
        }
        manager
    }

    /// Runs every control loop until `shutdown` is cancelled
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let scheduler = Arc::new(self.scheduler()?);
        let recycle = Arc::new(self.recycle_manager());
        let mut supervisor = Supervisor::new(
            shutdown.clone(),
            Duration::from_secs(self.config.supervisor.restart_delay_secs),
        );

        supervisor.spawn("sync_scheduler", move |token| {
            let scheduler = Arc::clone(&scheduler);
            async move { scheduler.run(token).await }
        });

        for resource_type in recycle.resource_types().to_vec() {
            let recycle = Arc::clone(&recycle);
            supervisor.spawn(format!("recycle_{resource_type}"), move |token| {
                let recycle = Arc::clone(&recycle);
                async move { recycle.run(resource_type, token).await }
            });
        }

        if let Some(ref metrics) = self.metrics {
            let server = Arc::new(MetricsServer::new(
                Arc::clone(metrics),
                &self.config.telemetry.metrics_endpoint,
            )?);
            supervisor.spawn("metrics_server", move |token| {
                let server = Arc::clone(&server);
                async move { server.run(token).await }
            });
        }

        info!(tasks = supervisor.len(), "Control loops running");
        shutdown.cancelled().await;

        supervisor.shutdown().await;
        self.close().await;
        Ok(())
    }

    /// Syncs one account now and returns the outcome
    pub async fn sync_account(&self, account_id: &AccountId) -> Result<SweepReport> {
        let report = self.scheduler()?.sync_account_now(account_id).await;
        self.close().await;
        let report = report?;
        if report.leadership_lost {
            warn!(account_id = %account_id, "Another instance holds leadership, sync skipped");
        }
        Ok(report)
    }

    /// Recovers recycle records before their deadline
    pub async fn recover(&self, ids: &[RecordId]) -> Result<u64> {
        let recovered = self.recycle_manager().recover(ids).await;
        self.close().await;
        recovered
    }

    async fn close(&self) {
        if let Some(ref lease) = self.lease {
            if let Err(e) = lease.release().await {
                warn!(error = %e, "Failed to release leader lease");
            }
        }
        self.db.close().await;
    }
}
