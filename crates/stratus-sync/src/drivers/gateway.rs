//! GatewayDriver - ReconcileDriver over the cloud gateway and resource store
//!
//! Cloud listing:
//!
//! - `Region`: one `list_regions` call. Unavailable regions are listed too,
//!   so stored regions that became unavailable are updated rather than
//!   deleted; [`refine_plan`](GatewayDriver::refine_plan) keeps them out of
//!   the creates.
//! - Every other type: `list_regions`, then `list_resources` in each
//!   available region. Any failing region fails the whole listing.
//!   Unavailable regions are reported as skipped, so records stored there
//!   survive until the region can be listed again.

use std::sync::Arc;

use anyhow::Context;
use stratus_core::domain::{
    AccountDescriptor, AccountId, CloudItem, ResourceRecord, ResourceType, StoreId, Vendor,
};
use stratus_core::ports::{ICloudGateway, IResourceStore, Page, ResourceFilter, MAX_BATCH_SIZE};
use tracing::debug;

use super::{authoritative_fields, VendorProfile};
use crate::driver::{CloudListing, ReconcileDriver};
use crate::reconcile::ReconcilePlan;

/// Reconciliation driver for one (vendor, resource type) pair
pub struct GatewayDriver {
    profile: Arc<dyn VendorProfile>,
    resource_type: ResourceType,
    gateway: Arc<dyn ICloudGateway>,
    store: Arc<dyn IResourceStore>,
    store_page_size: u32,
}

impl GatewayDriver {
    pub fn new(
        profile: Arc<dyn VendorProfile>,
        resource_type: ResourceType,
        gateway: Arc<dyn ICloudGateway>,
        store: Arc<dyn IResourceStore>,
    ) -> Self {
        Self {
            profile,
            resource_type,
            gateway,
            store,
            store_page_size: MAX_BATCH_SIZE as u32,
        }
    }

    /// Overrides the page size used when reading the store
    pub fn with_store_page_size(mut self, page_size: u32) -> Self {
        self.store_page_size = page_size.max(1);
        self
    }
}

#[async_trait::async_trait]
impl ReconcileDriver for GatewayDriver {
    fn vendor(&self) -> Vendor {
        self.profile.vendor()
    }

    fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    fn authoritative_fields(&self) -> &[&'static str] {
        authoritative_fields(self.resource_type)
    }

    fn refine_plan(&self, plan: &mut ReconcilePlan) {
        if self.resource_type == ResourceType::Region {
            plan.to_create.retain(|item| item.available);
        }
    }

    async fn list_cloud(&self, account: &AccountDescriptor) -> anyhow::Result<Vec<CloudItem>> {
        Ok(self.list_cloud_scoped(account).await?.items)
    }

    async fn list_cloud_scoped(&self, account: &AccountDescriptor) -> anyhow::Result<CloudListing> {
        let regions = self.gateway.list_regions(account).await?;

        if self.resource_type == ResourceType::Region {
            let items = regions
                .into_iter()
                .map(|region| self.profile.map_region(region))
                .collect::<anyhow::Result<Vec<_>>>()?;
            return Ok(CloudListing::complete(items));
        }

        let mut listing = CloudListing::default();
        for region in regions {
            if !self.profile.region_available(&region) {
                debug!(vendor = %self.vendor(), region = %region.id, "Skipping unavailable region");
                listing.skipped_regions.insert(region.id);
                continue;
            }
            let raw = self
                .gateway
                .list_resources(account, &region.id, self.resource_type)
                .await
                .with_context(|| format!("Listing {} in {}", self.resource_type, region.id))?;
            for entry in raw {
                listing.items.push(self.profile.map_item(entry, &region.id, self.resource_type)?);
            }
        }
        Ok(listing)
    }

    async fn list_store(
        &self,
        _account: &AccountDescriptor,
        filter: &ResourceFilter,
    ) -> anyhow::Result<Vec<ResourceRecord>> {
        let mut records = Vec::new();
        let mut page = Page::first(self.store_page_size);
        loop {
            let batch = self.store.list(filter, page).await?;
            let len = batch.len();
            records.extend(batch);
            if page.is_last(len) {
                break;
            }
            page = page.next();
        }
        Ok(records)
    }

    async fn create(&self, owner: &AccountId, items: &[CloudItem]) -> anyhow::Result<()> {
        let records: Vec<ResourceRecord> = items
            .iter()
            .map(|item| {
                ResourceRecord::from_cloud_item(self.vendor(), self.resource_type, owner.clone(), item)
            })
            .collect();
        self.store.batch_create(&records).await
    }

    async fn update(&self, pairs: &[(ResourceRecord, CloudItem)]) -> anyhow::Result<()> {
        let records: Vec<ResourceRecord> = pairs
            .iter()
            .map(|(record, item)| {
                let mut record = record.clone();
                record.apply_cloud_item(item);
                record
            })
            .collect();
        self.store.batch_update(&records).await
    }

    async fn delete(&self, ids: &[StoreId]) -> anyhow::Result<()> {
        self.store.batch_delete(ids).await
    }
}
