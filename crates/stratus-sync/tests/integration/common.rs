//! Shared test helpers for sync integration tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use stratus_cache::{DatabasePool, SqliteAccountStore, SqliteRecycleStore, SqliteResourceStore};
use stratus_core::config::{RetryConfig, SyncConfig};
use stratus_core::domain::{
    AccountDescriptor, AccountId, CloudItem, CloudNativeId, CloudRegion, RawCloudItem,
    ResourceBasicInfo, ResourceRecord, ResourceType, StoreId, Vendor,
};
use stratus_core::ports::{ICloudGateway, ILeaderGate, IResourceStore, Page, ResourceFilter};
use stratus_sync::driver::ReconcileDriver;

// ============================================================================
// Stores
// ============================================================================

/// In-memory database with every store wired to it
pub struct Stores {
    pub db: DatabasePool,
    pub resources: Arc<SqliteResourceStore>,
    pub accounts: Arc<SqliteAccountStore>,
    pub recycle: Arc<SqliteRecycleStore>,
}

pub async fn stores() -> Stores {
    let db = DatabasePool::in_memory().await.expect("in-memory database");
    Stores {
        resources: Arc::new(SqliteResourceStore::new(db.pool().clone())),
        accounts: Arc::new(SqliteAccountStore::new(db.pool().clone())),
        recycle: Arc::new(SqliteRecycleStore::new(db.pool().clone())),
        db,
    }
}

impl Stores {
    /// Registers resource accounts and returns their descriptors
    pub async fn add_accounts(&self, vendor: Vendor, ids: &[&str]) -> Vec<AccountDescriptor> {
        let mut added = Vec::new();
        for id in ids {
            let descriptor = account(vendor, id);
            self.accounts
                .upsert_account(&descriptor)
                .await
                .expect("account upsert");
            added.push(descriptor);
        }
        added
    }

    /// Every stored record of one scope, sorted by cloud ID
    pub async fn scope(
        &self,
        vendor: Vendor,
        resource_type: ResourceType,
        account_id: &AccountId,
    ) -> Vec<ResourceRecord> {
        let filter = ResourceFilter::scope(vendor, resource_type, account_id.clone());
        let mut records = self
            .resources
            .list(&filter, Page::first(500))
            .await
            .expect("store listing");
        records.sort_by(|a, b| a.cloud_native_id.cmp(&b.cloud_native_id));
        records
    }
}

/// Cloud IDs of a list of records
pub fn cloud_ids(records: &[ResourceRecord]) -> Vec<&str> {
    records.iter().map(|r| r.cloud_native_id.as_str()).collect()
}

// ============================================================================
// Domain helpers
// ============================================================================

pub fn account(vendor: Vendor, id: &str) -> AccountDescriptor {
    AccountDescriptor::new(AccountId::new(id).expect("valid account id"), vendor)
}

pub fn cloud_id(id: &str) -> CloudNativeId {
    CloudNativeId::new(id).expect("valid cloud id")
}

pub fn raw(id: &str, fields: serde_json::Value) -> RawCloudItem {
    let fields = match fields {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    RawCloudItem {
        id: id.to_string(),
        region: None,
        fields,
    }
}

/// Sync settings with small batches
pub fn sync_config(batch_size: usize) -> SyncConfig {
    SyncConfig {
        batch_size,
        account_page_size: 2,
        call_timeout_secs: 5,
        ..SyncConfig::default()
    }
}

/// Three attempts with millisecond backoff
pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        min_backoff_ms: 1,
        max_backoff_ms: 5,
    }
}

// ============================================================================
// FakeGateway
// ============================================================================

#[derive(Default)]
struct GatewayState {
    regions: Vec<CloudRegion>,
    /// (account, region, type) -> listed items
    resources: HashMap<(String, String, ResourceType), Vec<RawCloudItem>>,
    failing_accounts: HashSet<String>,
    delete_failures: usize,
    deleted: Vec<(ResourceType, String)>,
}

/// In-process cloud gateway with scripted contents
#[derive(Default)]
pub struct FakeGateway {
    state: Mutex<GatewayState>,
    list_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_region(&self, region: CloudRegion) {
        self.state.lock().unwrap().regions.push(region);
    }

    pub fn set_regions(&self, regions: Vec<CloudRegion>) {
        self.state.lock().unwrap().regions = regions;
    }

    /// Replaces the items listed for one (account, region, type)
    pub fn set_items(&self, account: &str, region: &str, resource_type: ResourceType, items: Vec<RawCloudItem>) {
        self.state
            .lock()
            .unwrap()
            .resources
            .insert((account.to_string(), region.to_string(), resource_type), items);
    }

    /// Makes every listing for `account` fail
    pub fn fail_listings_for(&self, account: &str) {
        self.state.lock().unwrap().failing_accounts.insert(account.to_string());
    }

    /// Makes the next `count` deletes fail
    pub fn fail_next_deletes(&self, count: usize) {
        self.state.lock().unwrap().delete_failures = count;
    }

    /// Objects deleted so far, in call order
    pub fn deleted(&self) -> Vec<(ResourceType, String)> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ICloudGateway for FakeGateway {
    async fn list_regions(&self, account: &AccountDescriptor) -> anyhow::Result<Vec<CloudRegion>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        if state.failing_accounts.contains(account.account_id.as_str()) {
            anyhow::bail!("gateway unavailable for {}", account.account_id);
        }
        Ok(state.regions.clone())
    }

    async fn list_resources(
        &self,
        account: &AccountDescriptor,
        region: &str,
        resource_type: ResourceType,
    ) -> anyhow::Result<Vec<RawCloudItem>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        if state.failing_accounts.contains(account.account_id.as_str()) {
            anyhow::bail!("gateway unavailable for {}", account.account_id);
        }
        let key = (account.account_id.to_string(), region.to_string(), resource_type);
        Ok(state.resources.get(&key).cloned().unwrap_or_default())
    }

    async fn delete_resource(
        &self,
        account: &AccountDescriptor,
        region: &str,
        resource_type: ResourceType,
        cloud_id: &CloudNativeId,
    ) -> anyhow::Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if state.delete_failures > 0 {
            state.delete_failures -= 1;
            anyhow::bail!("delete of {cloud_id} rejected");
        }
        let key = (account.account_id.to_string(), region.to_string(), resource_type);
        if let Some(items) = state.resources.get_mut(&key) {
            items.retain(|item| item.id != cloud_id.as_str());
        }
        state.deleted.push((resource_type, cloud_id.to_string()));
        Ok(())
    }
}

// ============================================================================
// Leader gates
// ============================================================================

/// Leader gate flipped by the test
pub struct ToggleLeader(AtomicBool);

impl ToggleLeader {
    pub fn new(master: bool) -> Self {
        Self(AtomicBool::new(master))
    }

    pub fn set(&self, master: bool) {
        self.0.store(master, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl ILeaderGate for ToggleLeader {
    async fn is_master(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Leader for the first `checks` calls, follower afterwards
pub struct CountdownLeader(AtomicUsize);

impl CountdownLeader {
    pub fn new(checks: usize) -> Self {
        Self(AtomicUsize::new(checks))
    }
}

#[async_trait::async_trait]
impl ILeaderGate for CountdownLeader {
    async fn is_master(&self) -> bool {
        self.0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

// ============================================================================
// ScriptedDriver
// ============================================================================

/// Driver with in-memory cloud and store, recording every call
pub struct ScriptedDriver {
    vendor: Vendor,
    resource_type: ResourceType,
    pub cloud: Mutex<Vec<CloudItem>>,
    /// Cloud contents returned by listings after the first one
    pub relisted: Mutex<Option<Vec<CloudItem>>>,
    pub store: Mutex<Vec<ResourceRecord>>,
    /// Accounts this driver ran for, in order
    pub visited: Mutex<Vec<AccountId>>,
    pub fail_for: Mutex<Option<AccountId>>,
    /// When set, `list_cloud` signals `started` and waits for `release`
    pub pause: Option<(Arc<Notify>, Arc<Notify>)>,
    /// Restricts the pause to one account
    pause_account: Option<AccountId>,
    cloud_listings: AtomicUsize,
    pub deleted: Mutex<Vec<StoreId>>,
}

impl ScriptedDriver {
    pub fn new(vendor: Vendor, resource_type: ResourceType) -> Self {
        Self {
            vendor,
            resource_type,
            cloud: Mutex::new(Vec::new()),
            relisted: Mutex::new(None),
            store: Mutex::new(Vec::new()),
            visited: Mutex::new(Vec::new()),
            fail_for: Mutex::new(None),
            pause: None,
            pause_account: None,
            cloud_listings: AtomicUsize::new(0),
            deleted: Mutex::new(Vec::new()),
        }
    }

    pub fn with_pause(mut self, started: Arc<Notify>, release: Arc<Notify>) -> Self {
        self.pause = Some((started, release));
        self
    }

    pub fn with_pause_for(self, account_id: AccountId, started: Arc<Notify>, release: Arc<Notify>) -> Self {
        let mut driver = self.with_pause(started, release);
        driver.pause_account = Some(account_id);
        driver
    }

    pub fn visited(&self) -> Vec<AccountId> {
        self.visited.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ReconcileDriver for ScriptedDriver {
    fn vendor(&self) -> Vendor {
        self.vendor
    }

    fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    async fn list_cloud(&self, account: &AccountDescriptor) -> anyhow::Result<Vec<CloudItem>> {
        let listing = self.cloud_listings.fetch_add(1, Ordering::SeqCst);
        self.visited.lock().unwrap().push(account.account_id.clone());
        let paused_here = self
            .pause_account
            .as_ref()
            .map_or(true, |id| *id == account.account_id);
        if let (Some((started, release)), true) = (&self.pause, paused_here) {
            started.notify_one();
            release.notified().await;
        }
        if self.fail_for.lock().unwrap().as_ref() == Some(&account.account_id) {
            anyhow::bail!("listing {} failed", account.account_id);
        }
        if listing > 0 {
            if let Some(items) = self.relisted.lock().unwrap().clone() {
                return Ok(items);
            }
        }
        Ok(self.cloud.lock().unwrap().clone())
    }

    async fn list_store(
        &self,
        _account: &AccountDescriptor,
        _filter: &ResourceFilter,
    ) -> anyhow::Result<Vec<ResourceRecord>> {
        Ok(self.store.lock().unwrap().clone())
    }

    async fn create(&self, owner: &AccountId, items: &[CloudItem]) -> anyhow::Result<()> {
        let mut store = self.store.lock().unwrap();
        for item in items {
            store.push(ResourceRecord::from_cloud_item(
                self.vendor,
                self.resource_type,
                owner.clone(),
                item,
            ));
        }
        Ok(())
    }

    async fn update(&self, pairs: &[(ResourceRecord, CloudItem)]) -> anyhow::Result<()> {
        let mut store = self.store.lock().unwrap();
        for (record, item) in pairs {
            if let Some(stored) = store.iter_mut().find(|r| r.store_id == record.store_id) {
                stored.apply_cloud_item(item);
            }
        }
        Ok(())
    }

    async fn delete(&self, ids: &[StoreId]) -> anyhow::Result<()> {
        self.store.lock().unwrap().retain(|r| !ids.contains(&r.store_id));
        self.deleted.lock().unwrap().extend_from_slice(ids);
        Ok(())
    }
}

// ============================================================================
// FlakyStore
// ============================================================================

/// Resource store whose `batch_create` call number `fail_on_call` fails once
///
/// Basic info lookups of the IDs in `broken_rows` always fail.
pub struct FlakyStore {
    inner: Arc<SqliteResourceStore>,
    fail_on_call: usize,
    creates: AtomicUsize,
    broken_rows: Mutex<HashSet<StoreId>>,
    lookups: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: Arc<SqliteResourceStore>, fail_on_call: usize) -> Self {
        Self {
            inner,
            fail_on_call,
            creates: AtomicUsize::new(0),
            broken_rows: Mutex::new(HashSet::new()),
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn break_row(&self, id: StoreId) {
        self.broken_rows.lock().unwrap().insert(id);
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IResourceStore for FlakyStore {
    async fn list(&self, filter: &ResourceFilter, page: Page) -> anyhow::Result<Vec<ResourceRecord>> {
        self.inner.list(filter, page).await
    }

    async fn batch_create(&self, records: &[ResourceRecord]) -> anyhow::Result<()> {
        if self.creates.fetch_add(1, Ordering::SeqCst) == self.fail_on_call {
            anyhow::bail!("store write rejected");
        }
        self.inner.batch_create(records).await
    }

    async fn batch_update(&self, records: &[ResourceRecord]) -> anyhow::Result<()> {
        self.inner.batch_update(records).await
    }

    async fn batch_delete(&self, ids: &[StoreId]) -> anyhow::Result<()> {
        self.inner.batch_delete(ids).await
    }

    async fn get_basic_info(
        &self,
        resource_type: ResourceType,
        id: &StoreId,
    ) -> anyhow::Result<Option<ResourceBasicInfo>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.broken_rows.lock().unwrap().contains(id) {
            anyhow::bail!("corrupt row for {id}");
        }
        self.inner.get_basic_info(resource_type, id).await
    }
}
