//! Reconciliation passes against the SQLite resource store

use std::sync::Arc;

use serde_json::json;

use stratus_core::domain::{AccountId, CloudItem, CloudRegion, ResourceRecord, ResourceType, Vendor};
use stratus_core::ports::{IResourceStore, ResourceFilter};
use stratus_sync::driver::ReconcileDriver;
use stratus_sync::drivers::{profile_for, GatewayDriver, REGION_STATUS};
use stratus_sync::reconcile::{diff, Reconciler};

use crate::common::{
    account, cloud_id, cloud_ids, fast_retry, raw, stores, sync_config, FakeGateway, FlakyStore,
    ScriptedDriver,
};

fn vpc_driver(gateway: &Arc<FakeGateway>, store: Arc<dyn IResourceStore>) -> GatewayDriver {
    GatewayDriver::new(profile_for(Vendor::Aws), ResourceType::Vpc, gateway.clone(), store)
}

fn reconciler(batch_size: usize) -> Reconciler {
    Reconciler::new(&sync_config(batch_size), fast_retry()).unwrap()
}

fn gateway_with_region() -> Arc<FakeGateway> {
    let gateway = Arc::new(FakeGateway::new());
    gateway.add_region(CloudRegion::new("us-east-1").with_field("opt_in_status", "opt-in-not-required"));
    gateway
}

#[tokio::test]
async fn test_single_item_is_created_then_converged() {
    let stores = stores().await;
    let gateway = gateway_with_region();
    gateway.set_items("acct-1", "us-east-1", ResourceType::Vpc, vec![raw("x1", json!({"attr": "v1"}))]);
    let driver = vpc_driver(&gateway, stores.resources.clone());
    let acct = account(Vendor::Aws, "acct-1");
    let filter = ResourceFilter::scope(Vendor::Aws, ResourceType::Vpc, acct.account_id.clone());

    let plan = diff(
        &driver,
        driver.list_cloud(&acct).await.unwrap(),
        driver.list_store(&acct, &filter).await.unwrap(),
    );
    assert_eq!(plan.to_create.len(), 1);
    assert_eq!(plan.to_create[0].cloud_native_id.as_str(), "x1");
    assert!(plan.to_update.is_empty());
    assert!(plan.to_delete.is_empty());

    let report = reconciler(100).reconcile(&driver, &acct).await.unwrap();
    assert_eq!(report.created, 1);

    let stored = stores.scope(Vendor::Aws, ResourceType::Vpc, &acct.account_id).await;
    assert_eq!(cloud_ids(&stored), vec!["x1"]);
    assert_eq!(stored[0].attribute_str("attr"), Some("v1"));
    assert_eq!(stored[0].region, "us-east-1");

    let plan = diff(
        &driver,
        driver.list_cloud(&acct).await.unwrap(),
        driver.list_store(&acct, &filter).await.unwrap(),
    );
    assert!(plan.is_empty());

    let second = reconciler(100).reconcile(&driver, &acct).await.unwrap();
    assert!(second.is_noop());
}

#[tokio::test]
async fn test_pass_creates_updates_and_deletes() {
    let stores = stores().await;
    let gateway = gateway_with_region();
    let driver = vpc_driver(&gateway, stores.resources.clone());
    let acct = account(Vendor::Aws, "acct-1");

    gateway.set_items(
        "acct-1",
        "us-east-1",
        ResourceType::Vpc,
        vec![
            raw("vpc-a", json!({"Name": "a", "CidrBlock": "10.0.0.0/16"})),
            raw("vpc-b", json!({"Name": "b", "CidrBlock": "10.1.0.0/16"})),
        ],
    );
    reconciler(100).reconcile(&driver, &acct).await.unwrap();

    gateway.set_items(
        "acct-1",
        "us-east-1",
        ResourceType::Vpc,
        vec![
            raw("vpc-b", json!({"Name": "b", "CidrBlock": "10.9.0.0/16"})),
            raw("vpc-c", json!({"Name": "c", "CidrBlock": "10.2.0.0/16"})),
        ],
    );
    let report = reconciler(100).reconcile(&driver, &acct).await.unwrap();
    assert_eq!((report.created, report.updated, report.deleted), (1, 1, 1));

    let stored = stores.scope(Vendor::Aws, ResourceType::Vpc, &acct.account_id).await;
    assert_eq!(cloud_ids(&stored), vec!["vpc-b", "vpc-c"]);
    assert_eq!(stored[0].attribute_str("cidr"), Some("10.9.0.0/16"));
}

#[tokio::test]
async fn test_non_authoritative_change_is_not_an_update() {
    let stores = stores().await;
    let gateway = gateway_with_region();
    let driver = vpc_driver(&gateway, stores.resources.clone());
    let acct = account(Vendor::Aws, "acct-1");

    gateway.set_items(
        "acct-1",
        "us-east-1",
        ResourceType::Vpc,
        vec![raw("vpc-a", json!({"Name": "a", "CidrBlock": "10.0.0.0/16", "Tags": ["x"]}))],
    );
    reconciler(100).reconcile(&driver, &acct).await.unwrap();

    gateway.set_items(
        "acct-1",
        "us-east-1",
        ResourceType::Vpc,
        vec![raw("vpc-a", json!({"Name": "a", "CidrBlock": "10.0.0.0/16", "Tags": ["y"]}))],
    );
    let report = reconciler(100).reconcile(&driver, &acct).await.unwrap();
    assert!(report.is_noop());
}

#[tokio::test]
async fn test_failed_batch_heals_on_next_pass() {
    let stores = stores().await;
    let gateway = gateway_with_region();
    let acct = account(Vendor::Aws, "acct-1");

    // A record the cloud no longer has
    let stale = ResourceRecord::from_cloud_item(
        Vendor::Aws,
        ResourceType::Vpc,
        acct.account_id.clone(),
        &CloudItem::new(cloud_id("vpc-gone"), "us-east-1"),
    );
    stores.resources.batch_create(&[stale]).await.unwrap();

    let items = (1..=5)
        .map(|n| raw(&format!("vpc-{n}"), json!({"Name": format!("net-{n}")})))
        .collect();
    gateway.set_items("acct-1", "us-east-1", ResourceType::Vpc, items);

    let flaky = Arc::new(FlakyStore::new(stores.resources.clone(), 1));
    let driver = vpc_driver(&gateway, flaky.clone());

    let err = reconciler(2).reconcile(&driver, &acct).await.unwrap_err();
    assert!(format!("{err:#}").contains("store write rejected"));

    // First batch landed, the stale record was not deleted
    let stored = stores.scope(Vendor::Aws, ResourceType::Vpc, &acct.account_id).await;
    assert_eq!(stored.len(), 3);
    assert!(cloud_ids(&stored).contains(&"vpc-gone"));

    let report = reconciler(2).reconcile(&driver, &acct).await.unwrap();
    assert_eq!(report.created, 3);
    assert_eq!(report.deleted, 1);

    let stored = stores.scope(Vendor::Aws, ResourceType::Vpc, &acct.account_id).await;
    assert_eq!(cloud_ids(&stored), vec!["vpc-1", "vpc-2", "vpc-3", "vpc-4", "vpc-5"]);
    assert!(reconciler(2).reconcile(&driver, &acct).await.unwrap().is_noop());
}

#[tokio::test]
async fn test_reappeared_candidate_is_not_deleted() {
    let acct = account(Vendor::Aws, "acct-1");
    let driver = ScriptedDriver::new(Vendor::Aws, ResourceType::Vpc);
    for id in ["vpc-a", "vpc-b"] {
        driver.store.lock().unwrap().push(ResourceRecord::from_cloud_item(
            Vendor::Aws,
            ResourceType::Vpc,
            acct.account_id.clone(),
            &CloudItem::new(cloud_id(id), "us-east-1"),
        ));
    }
    // Empty at first, vpc-a is back by the pre-delete listing
    *driver.relisted.lock().unwrap() = Some(vec![CloudItem::new(cloud_id("vpc-a"), "us-east-1")]);

    let report = reconciler(100).reconcile(&driver, &acct).await.unwrap();
    assert_eq!(report.deleted, 1);
    assert_eq!(report.skipped_deletes, 1);

    let remaining = driver.store.lock().unwrap().clone();
    assert_eq!(cloud_ids(&remaining), vec!["vpc-a"]);
}

#[tokio::test]
async fn test_duplicate_cloud_ids_create_one_record() {
    let stores = stores().await;
    let gateway = gateway_with_region();
    gateway.set_items(
        "acct-1",
        "us-east-1",
        ResourceType::Vpc,
        vec![
            raw("vpc-1", json!({"Name": "first"})),
            raw("vpc-1", json!({"Name": "second"})),
        ],
    );
    let driver = vpc_driver(&gateway, stores.resources.clone());
    let acct = account(Vendor::Aws, "acct-1");

    let report = reconciler(100).reconcile(&driver, &acct).await.unwrap();
    assert_eq!(report.created, 1);

    let stored = stores.scope(Vendor::Aws, ResourceType::Vpc, &acct.account_id).await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].attribute_str("name"), Some("first"));
}

#[tokio::test]
async fn test_listing_failure_is_retried_then_leaves_store_untouched() {
    let stores = stores().await;
    let gateway = gateway_with_region();
    gateway.fail_listings_for("acct-1");
    let driver = vpc_driver(&gateway, stores.resources.clone());
    let acct = account(Vendor::Aws, "acct-1");

    let err = reconciler(100).reconcile(&driver, &acct).await.unwrap_err();
    assert!(format!("{err:#}").contains("gateway unavailable"));
    assert_eq!(gateway.list_calls(), 3);
    assert!(stores.scope(Vendor::Aws, ResourceType::Vpc, &acct.account_id).await.is_empty());
}

#[tokio::test]
async fn test_resources_in_unavailable_regions_are_not_listed() {
    let stores = stores().await;
    let gateway = gateway_with_region();
    gateway.add_region(CloudRegion::new("ap-east-1").with_field("opt_in_status", "not-opted-in"));
    gateway.set_items("acct-1", "us-east-1", ResourceType::Vpc, vec![raw("vpc-1", json!({}))]);
    gateway.set_items("acct-1", "ap-east-1", ResourceType::Vpc, vec![raw("vpc-2", json!({}))]);
    let driver = vpc_driver(&gateway, stores.resources.clone());
    let acct = account(Vendor::Aws, "acct-1");

    reconciler(100).reconcile(&driver, &acct).await.unwrap();

    let stored = stores.scope(Vendor::Aws, ResourceType::Vpc, &acct.account_id).await;
    assert_eq!(cloud_ids(&stored), vec!["vpc-1"]);
}

#[tokio::test]
async fn test_records_survive_while_their_region_is_unavailable() {
    let stores = stores().await;
    let gateway = Arc::new(FakeGateway::new());
    gateway.set_regions(vec![
        CloudRegion::new("ap-guangzhou").with_field("state", "AVAILABLE"),
        CloudRegion::new("ap-hongkong").with_field("state", "AVAILABLE"),
    ]);
    gateway.set_items("acct-1", "ap-guangzhou", ResourceType::Vpc, vec![raw("vpc-gz", json!({}))]);
    gateway.set_items("acct-1", "ap-hongkong", ResourceType::Vpc, vec![raw("vpc-hk", json!({}))]);
    let driver = GatewayDriver::new(
        profile_for(Vendor::TCloud),
        ResourceType::Vpc,
        gateway.clone(),
        stores.resources.clone(),
    );
    let acct = account(Vendor::TCloud, "acct-1");

    reconciler(100).reconcile(&driver, &acct).await.unwrap();
    let stored = stores.scope(Vendor::TCloud, ResourceType::Vpc, &acct.account_id).await;
    assert_eq!(cloud_ids(&stored), vec!["vpc-gz", "vpc-hk"]);

    // Hong Kong cannot be listed, its VPC record stays
    gateway.set_regions(vec![
        CloudRegion::new("ap-guangzhou").with_field("state", "AVAILABLE"),
        CloudRegion::new("ap-hongkong").with_field("state", "UNAVAILABLE"),
    ]);
    let report = reconciler(100).reconcile(&driver, &acct).await.unwrap();
    assert_eq!(report.deleted, 0);
    assert_eq!(report.unlisted, 1);
    let stored = stores.scope(Vendor::TCloud, ResourceType::Vpc, &acct.account_id).await;
    assert_eq!(cloud_ids(&stored), vec!["vpc-gz", "vpc-hk"]);

    // A region without a state field is skipped the same way
    gateway.set_regions(vec![
        CloudRegion::new("ap-guangzhou").with_field("state", "AVAILABLE"),
        CloudRegion::new("ap-hongkong"),
    ]);
    let report = reconciler(100).reconcile(&driver, &acct).await.unwrap();
    assert_eq!(report.deleted, 0);

    // Once listed again, a VPC that is really gone is deleted
    gateway.set_regions(vec![
        CloudRegion::new("ap-guangzhou").with_field("state", "AVAILABLE"),
        CloudRegion::new("ap-hongkong").with_field("state", "AVAILABLE"),
    ]);
    gateway.set_items("acct-1", "ap-hongkong", ResourceType::Vpc, Vec::new());
    let report = reconciler(100).reconcile(&driver, &acct).await.unwrap();
    assert_eq!(report.deleted, 1);
    let stored = stores.scope(Vendor::TCloud, ResourceType::Vpc, &acct.account_id).await;
    assert_eq!(cloud_ids(&stored), vec!["vpc-gz"]);
}

#[tokio::test]
async fn test_regions_are_stored_once_under_the_public_scope() {
    let stores = stores().await;
    let gateway = gateway_with_region();
    gateway.add_region(CloudRegion::new("ap-east-1").with_field("opt_in_status", "not-opted-in"));
    let driver = GatewayDriver::new(
        profile_for(Vendor::Aws),
        ResourceType::Region,
        gateway.clone(),
        stores.resources.clone(),
    );

    // New unavailable regions are not created
    let report = reconciler(100)
        .reconcile(&driver, &account(Vendor::Aws, "acct-1"))
        .await
        .unwrap();
    assert_eq!(report.created, 1);
    assert!(report.account_id.is_public_scope());

    let second = reconciler(100)
        .reconcile(&driver, &account(Vendor::Aws, "acct-2"))
        .await
        .unwrap();
    assert!(second.is_noop());

    let public = AccountId::public_scope();
    let stored = stores.scope(Vendor::Aws, ResourceType::Region, &public).await;
    assert_eq!(cloud_ids(&stored), vec!["us-east-1"]);
    assert_eq!(stored[0].attribute_str(REGION_STATUS), Some("available"));

    // A stored region turning unavailable is updated, not deleted
    gateway.set_regions(vec![CloudRegion::new("us-east-1").with_field("opt_in_status", "not-opted-in")]);
    let report = reconciler(100)
        .reconcile(&driver, &account(Vendor::Aws, "acct-1"))
        .await
        .unwrap();
    assert_eq!((report.created, report.updated, report.deleted), (0, 1, 0));

    let stored = stores.scope(Vendor::Aws, ResourceType::Region, &public).await;
    assert_eq!(stored[0].attribute_str(REGION_STATUS), Some("unavailable"));
}
