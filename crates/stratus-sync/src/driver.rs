//! Reconciliation driver contract
//!
//! A driver adapts one (vendor, resource type) pair to the reconciliation
//! algorithm: it lists cloud truth, lists store truth and applies batched
//! store mutations. The algorithm itself never branches on vendor.
//!
//! Drivers are collected in a [`DriverRegistry`]. Registration order is
//! dependency order (public types, then network, then compute), and the
//! scheduler runs them in that order for every account.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use stratus_core::domain::{
    AccountDescriptor, AccountId, CloudItem, ResourceRecord, ResourceType, StoreId, Vendor,
};
use stratus_core::ports::ResourceFilter;

use crate::reconcile::ReconcilePlan;

/// Cloud truth for one scope, with the regions the listing did not cover
#[derive(Debug, Clone, Default)]
pub struct CloudListing {
    pub items: Vec<CloudItem>,
    /// Regions left unlisted; store records there are never deleted
    pub skipped_regions: HashSet<String>,
}

impl CloudListing {
    /// A listing that covered every region
    pub fn complete(items: Vec<CloudItem>) -> Self {
        Self {
            items,
            skipped_regions: HashSet::new(),
        }
    }

    /// Returns true if `region` was not listed
    pub fn skipped(&self, region: &str) -> bool {
        self.skipped_regions.contains(region)
    }
}

/// Per-(vendor, resource type) reconciliation adapter
#[async_trait::async_trait]
pub trait ReconcileDriver: Send + Sync {
    /// Vendor served by this driver
    fn vendor(&self) -> Vendor;

    /// Resource type served by this driver
    fn resource_type(&self) -> ResourceType;

    /// True for vendor-wide resources not owned by a single account
    fn is_public(&self) -> bool {
        self.resource_type().is_public()
    }

    /// Attributes whose change makes a record stale
    ///
    /// An empty list means every attribute is authoritative.
    fn authoritative_fields(&self) -> &[&'static str] {
        &[]
    }

    /// Returns true if `record` no longer matches `item`
    fn is_changed(&self, record: &ResourceRecord, item: &CloudItem) -> bool {
        if record.region != item.region {
            return true;
        }
        let fields = self.authoritative_fields();
        if fields.is_empty() {
            return record.attributes != item.attributes;
        }
        fields
            .iter()
            .any(|field| record.attributes.get(*field) != item.attributes.get(*field))
    }

    /// Adjusts a computed plan before it is applied
    fn refine_plan(&self, _plan: &mut ReconcilePlan) {}

    /// Account under which records of this driver are stored
    fn store_account(&self, account: &AccountDescriptor) -> AccountId {
        if self.is_public() {
            AccountId::public_scope()
        } else {
            account.account_id.clone()
        }
    }

    /// Lists every live cloud object of this type visible to `account`
    ///
    /// Must be exhaustive: a failure on any page fails the call.
    async fn list_cloud(&self, account: &AccountDescriptor) -> anyhow::Result<Vec<CloudItem>>;

    /// Lists cloud truth along with the regions the listing skipped
    ///
    /// The default covers every region.
    async fn list_cloud_scoped(&self, account: &AccountDescriptor) -> anyhow::Result<CloudListing> {
        Ok(CloudListing::complete(self.list_cloud(account).await?))
    }

    /// Lists every store record matching `filter`
    async fn list_store(
        &self,
        account: &AccountDescriptor,
        filter: &ResourceFilter,
    ) -> anyhow::Result<Vec<ResourceRecord>>;

    /// Inserts one batch of new records owned by `owner`
    async fn create(&self, owner: &AccountId, items: &[CloudItem]) -> anyhow::Result<()>;

    /// Rewrites one batch of records with their cloud state
    async fn update(&self, pairs: &[(ResourceRecord, CloudItem)]) -> anyhow::Result<()>;

    /// Deletes one batch of records
    async fn delete(&self, ids: &[StoreId]) -> anyhow::Result<()>;
}

/// Drivers keyed by (vendor, resource type)
#[derive(Default)]
pub struct DriverRegistry {
    drivers: HashMap<Vendor, Vec<Arc<dyn ReconcileDriver>>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a driver, replacing any earlier driver for the same key
    ///
    /// A replacement keeps the original position.
    pub fn register(&mut self, driver: Arc<dyn ReconcileDriver>) {
        let list = self.drivers.entry(driver.vendor()).or_default();
        match list
            .iter_mut()
            .find(|d| d.resource_type() == driver.resource_type())
        {
            Some(slot) => *slot = driver,
            None => list.push(driver),
        }
    }

    /// Drivers of one vendor in registration order
    pub fn drivers_for(&self, vendor: Vendor) -> &[Arc<dyn ReconcileDriver>] {
        self.drivers.get(&vendor).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Looks up one driver
    pub fn get(&self, vendor: Vendor, resource_type: ResourceType) -> Option<Arc<dyn ReconcileDriver>> {
        self.drivers_for(vendor)
            .iter()
            .find(|d| d.resource_type() == resource_type)
            .cloned()
    }

    /// Vendors with at least one driver, in [`Vendor::ALL`] order
    pub fn vendors(&self) -> Vec<Vendor> {
        Vendor::ALL
            .into_iter()
            .filter(|v| !self.drivers_for(*v).is_empty())
            .collect()
    }

    /// Total number of registered drivers
    pub fn len(&self) -> usize {
        self.drivers.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
