//! Sync scheduler sweeps, leader gating and per-account locking

use std::sync::Arc;

use chrono::Duration;
use serde_json::json;
use tokio::sync::Notify;

use stratus_cache::SqliteLeaseLeader;
use stratus_core::domain::{AccountId, AccountKind, CloudRegion, ResourceType, Vendor};
use stratus_core::ports::{IAccountStore, ILeaderGate};
use stratus_sync::driver::{DriverRegistry, ReconcileDriver};
use stratus_sync::drivers::build_registry;
use stratus_sync::leader::StandaloneLeader;
use stratus_sync::reconcile::Reconciler;
use stratus_sync::scheduler::SyncScheduler;
use stratus_sync::SyncError;

use crate::common::{
    account, cloud_ids, fast_retry, raw, stores, sync_config, CountdownLeader, FakeGateway,
    ScriptedDriver, Stores, ToggleLeader,
};

fn scripted_scheduler(
    stores: &Stores,
    drivers: Vec<Arc<ScriptedDriver>>,
    leader: Arc<dyn ILeaderGate>,
) -> SyncScheduler {
    let mut registry = DriverRegistry::new();
    for driver in drivers {
        registry.register(driver as Arc<dyn ReconcileDriver>);
    }
    SyncScheduler::new(
        stores.accounts.clone(),
        Arc::new(registry),
        leader,
        Arc::new(Reconciler::new(&sync_config(100), fast_retry()).unwrap()),
        sync_config(100),
    )
}

fn ids(values: &[&str]) -> Vec<AccountId> {
    values.iter().map(|v| AccountId::new(*v).unwrap()).collect()
}

#[tokio::test]
async fn test_sweep_pages_through_every_account() {
    let stores = stores().await;
    stores
        .add_accounts(Vendor::Aws, &["acct-1", "acct-2", "acct-3", "acct-4", "acct-5"])
        .await;
    let vpc = Arc::new(ScriptedDriver::new(Vendor::Aws, ResourceType::Vpc));
    let scheduler = scripted_scheduler(&stores, vec![vpc.clone()], Arc::new(StandaloneLeader));

    let report = scheduler.tick().await.expect("standalone instance leads");

    assert!(report.is_clean());
    assert_eq!(report.accounts_visited, 5);
    assert_eq!(report.scopes_succeeded, 5);
    assert_eq!(vpc.visited(), ids(&["acct-1", "acct-2", "acct-3", "acct-4", "acct-5"]));
}

#[tokio::test]
async fn test_public_drivers_run_for_first_syncable_account_only() {
    let stores = stores().await;
    stores
        .accounts
        .upsert_account(&account(Vendor::Aws, "acct-0").with_kind(AccountKind::Registration))
        .await
        .unwrap();
    stores.add_accounts(Vendor::Aws, &["acct-1", "acct-2", "acct-3"]).await;

    let regions = Arc::new(ScriptedDriver::new(Vendor::Aws, ResourceType::Region));
    let vpc = Arc::new(ScriptedDriver::new(Vendor::Aws, ResourceType::Vpc));
    let scheduler = scripted_scheduler(&stores, vec![regions.clone(), vpc.clone()], Arc::new(StandaloneLeader));

    let report = scheduler.sweep().await;

    assert_eq!(report.accounts_visited, 3);
    assert_eq!(regions.visited(), ids(&["acct-1"]));
    assert_eq!(vpc.visited(), ids(&["acct-1", "acct-2", "acct-3"]));
}

#[tokio::test]
async fn test_failing_account_does_not_stop_the_sweep() {
    let stores = stores().await;
    stores.add_accounts(Vendor::Aws, &["acct-1", "acct-2", "acct-3"]).await;
    let vpc = Arc::new(ScriptedDriver::new(Vendor::Aws, ResourceType::Vpc));
    *vpc.fail_for.lock().unwrap() = Some(AccountId::new("acct-2").unwrap());
    let scheduler = scripted_scheduler(&stores, vec![vpc.clone()], Arc::new(StandaloneLeader));

    let report = scheduler.sweep().await;

    assert_eq!(report.scopes_succeeded, 2);
    assert_eq!(report.scopes_failed, 1);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("acct-2"));
    assert!(vpc.visited().contains(&AccountId::new("acct-3").unwrap()));
}

#[tokio::test]
async fn test_follower_does_not_touch_the_cloud() {
    let stores = stores().await;
    stores.add_accounts(Vendor::Aws, &["acct-1"]).await;
    let vpc = Arc::new(ScriptedDriver::new(Vendor::Aws, ResourceType::Vpc));
    let leader = Arc::new(ToggleLeader::new(false));
    let scheduler = scripted_scheduler(&stores, vec![vpc.clone()], leader.clone());

    assert!(scheduler.tick().await.is_none());
    assert!(vpc.visited().is_empty());

    leader.set(true);
    assert!(scheduler.tick().await.is_some());
    assert_eq!(vpc.visited().len(), 1);
}

#[tokio::test]
async fn test_only_the_leading_instance_reconciles() {
    let stores = stores().await;
    stores.add_accounts(Vendor::Aws, &["acct-1"]).await;

    let leader_a = Arc::new(ToggleLeader::new(true));
    let leader_b = Arc::new(ToggleLeader::new(false));
    let driver_a = Arc::new(ScriptedDriver::new(Vendor::Aws, ResourceType::Vpc));
    let driver_b = Arc::new(ScriptedDriver::new(Vendor::Aws, ResourceType::Vpc));
    let instance_a = scripted_scheduler(&stores, vec![driver_a.clone()], leader_a.clone());
    let instance_b = scripted_scheduler(&stores, vec![driver_b.clone()], leader_b.clone());

    for round in 0..4 {
        let a_leads = round % 2 == 0;
        leader_a.set(a_leads);
        leader_b.set(!a_leads);
        let before = (driver_a.visited().len(), driver_b.visited().len());

        let (a, b) = tokio::join!(instance_a.tick(), instance_b.tick());
        assert_eq!(a.is_some(), a_leads);
        assert_eq!(b.is_some(), !a_leads);

        let after = (driver_a.visited().len(), driver_b.visited().len());
        if a_leads {
            assert_eq!(after, (before.0 + 1, before.1));
        } else {
            assert_eq!(after, (before.0, before.1 + 1));
        }
    }
}

#[tokio::test]
async fn test_lease_admits_one_of_two_instances() {
    let stores = stores().await;
    stores.add_accounts(Vendor::Aws, &["acct-1"]).await;

    let lease = || -> Arc<dyn ILeaderGate> {
        Arc::new(SqliteLeaseLeader::new(
            stores.db.pool().clone(),
            "control-loops",
            Duration::seconds(30),
        ))
    };
    let driver_a = Arc::new(ScriptedDriver::new(Vendor::Aws, ResourceType::Vpc));
    let driver_b = Arc::new(ScriptedDriver::new(Vendor::Aws, ResourceType::Vpc));
    let instance_a = scripted_scheduler(&stores, vec![driver_a.clone()], lease());
    let instance_b = scripted_scheduler(&stores, vec![driver_b.clone()], lease());

    assert!(instance_a.tick().await.is_some());
    assert!(instance_b.tick().await.is_none());
    assert_eq!(driver_a.visited().len(), 1);
    assert!(driver_b.visited().is_empty());
}

#[tokio::test]
async fn test_leadership_loss_stops_the_sweep() {
    let stores = stores().await;
    stores.add_accounts(Vendor::Aws, &["acct-1", "acct-2", "acct-3"]).await;
    let vpc = Arc::new(ScriptedDriver::new(Vendor::Aws, ResourceType::Vpc));
    // One check for the tick, one for the first account's driver
    let scheduler = scripted_scheduler(&stores, vec![vpc.clone()], Arc::new(CountdownLeader::new(2)));

    let report = scheduler.tick().await.expect("leader at tick time");

    assert!(report.leadership_lost);
    assert_eq!(report.scopes_succeeded, 1);
    assert_eq!(vpc.visited(), ids(&["acct-1"]));
}

#[tokio::test]
async fn test_concurrent_sync_of_one_account_is_rejected() {
    let stores = stores().await;
    let accounts = stores.add_accounts(Vendor::Aws, &["acct-1"]).await;
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let vpc = Arc::new(
        ScriptedDriver::new(Vendor::Aws, ResourceType::Vpc).with_pause(started.clone(), release.clone()),
    );
    let scheduler = scripted_scheduler(&stores, vec![vpc], Arc::new(StandaloneLeader));
    let acct = accounts[0].clone();

    let running = {
        let scheduler = scheduler.clone();
        let acct = acct.clone();
        tokio::spawn(async move { scheduler.sync_account(&acct, true).await })
    };
    started.notified().await;
    assert!(scheduler.is_syncing(&acct.account_id));

    let second = scheduler.sync_account(&acct, true).await;
    assert!(matches!(second, Err(SyncError::SyncInProgress(ref id)) if *id == acct.account_id));

    release.notify_one();
    let report = running.await.unwrap().unwrap();
    assert_eq!(report.scopes_succeeded, 1);
    assert!(!scheduler.is_syncing(&acct.account_id));
}

#[tokio::test]
async fn test_public_drivers_move_on_when_first_account_is_busy() {
    let stores = stores().await;
    let accounts = stores.add_accounts(Vendor::Aws, &["acct-1", "acct-2"]).await;
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let regions = Arc::new(ScriptedDriver::new(Vendor::Aws, ResourceType::Region));
    let vpc = Arc::new(ScriptedDriver::new(Vendor::Aws, ResourceType::Vpc).with_pause_for(
        accounts[0].account_id.clone(),
        started.clone(),
        release.clone(),
    ));
    let scheduler = scripted_scheduler(&stores, vec![regions.clone(), vpc], Arc::new(StandaloneLeader));

    // acct-1 is held by a sync that skips public drivers
    let running = {
        let scheduler = scheduler.clone();
        let acct = accounts[0].clone();
        tokio::spawn(async move { scheduler.sync_account(&acct, false).await })
    };
    started.notified().await;

    let report = scheduler.sweep_vendor(Vendor::Aws).await;
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("acct-1"));
    assert_eq!(regions.visited(), ids(&["acct-2"]));

    release.notify_one();
    running.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_on_demand_sync() {
    let stores = stores().await;
    stores.add_accounts(Vendor::Aws, &["acct-1", "acct-2"]).await;
    let regions = Arc::new(ScriptedDriver::new(Vendor::Aws, ResourceType::Region));
    let vpc = Arc::new(ScriptedDriver::new(Vendor::Aws, ResourceType::Vpc));
    let scheduler = scripted_scheduler(&stores, vec![regions.clone(), vpc.clone()], Arc::new(StandaloneLeader));

    let report = scheduler
        .sync_account_now(&AccountId::new("acct-2").unwrap())
        .await
        .unwrap();
    assert_eq!(report.scopes_succeeded, 2);
    assert_eq!(regions.visited(), ids(&["acct-2"]));

    let err = scheduler
        .sync_account_now(&AccountId::new("acct-404").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SyncError>(),
        Some(SyncError::AccountNotFound(_))
    ));
}

#[tokio::test]
async fn test_full_registry_sweep_mirrors_the_gateway() {
    let stores = stores().await;
    stores.add_accounts(Vendor::Aws, &["acct-1", "acct-2"]).await;

    let gateway = Arc::new(FakeGateway::new());
    gateway.add_region(CloudRegion::new("us-east-1"));
    gateway.set_items("acct-1", "us-east-1", ResourceType::Vpc, vec![raw("vpc-1", json!({"Name": "main"}))]);
    gateway.set_items("acct-2", "us-east-1", ResourceType::Cvm, vec![raw("i-1", json!({"State": "running"}))]);

    let registry = build_registry(gateway.clone(), stores.resources.clone());
    let scheduler = SyncScheduler::new(
        stores.accounts.clone(),
        Arc::new(registry),
        Arc::new(StandaloneLeader),
        Arc::new(Reconciler::new(&sync_config(100), fast_retry()).unwrap()),
        sync_config(100),
    );

    let report = scheduler.sweep().await;
    assert!(report.is_clean(), "errors: {:?}", report.errors);
    assert_eq!(report.accounts_visited, 2);

    let acct_1 = AccountId::new("acct-1").unwrap();
    let acct_2 = AccountId::new("acct-2").unwrap();
    let public = AccountId::public_scope();
    assert_eq!(cloud_ids(&stores.scope(Vendor::Aws, ResourceType::Vpc, &acct_1).await), vec!["vpc-1"]);
    assert_eq!(cloud_ids(&stores.scope(Vendor::Aws, ResourceType::Cvm, &acct_2).await), vec!["i-1"]);
    assert!(stores.scope(Vendor::Aws, ResourceType::Vpc, &acct_2).await.is_empty());
    assert_eq!(
        cloud_ids(&stores.scope(Vendor::Aws, ResourceType::Region, &public).await),
        vec!["us-east-1"]
    );

    // Nothing changed in the cloud, nothing changes in the store
    let again = scheduler.sweep().await;
    assert!(again.is_clean());
    assert_eq!(stores.scope(Vendor::Aws, ResourceType::Cvm, &acct_2).await.len(), 1);
}
