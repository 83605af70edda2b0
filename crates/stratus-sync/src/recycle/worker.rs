//! GatewayRecycleWorker - destroys recycled resources through the cloud gateway
//!
//! Steps, each safe to repeat:
//!
//! 1. Delete the cloud object (already gone counts as deleted).
//! 2. Delete the dependents the record asks for: disks when `with_disk`,
//!    elastic IPs when `with_eip`.
//! 3. Delete the store records of the object and its dependents.

use std::sync::Arc;

use anyhow::Context;
use stratus_core::domain::{
    AccountDescriptor, CloudNativeId, RecycleRecord, ResourceBasicInfo, ResourceType, StoreId,
};
use stratus_core::ports::{ICloudGateway, IRecycleWorker, IResourceStore, Page, ResourceFilter, MAX_BATCH_SIZE};
use tracing::debug;

/// Recycle worker backed by the cloud gateway and the resource store
pub struct GatewayRecycleWorker {
    gateway: Arc<dyn ICloudGateway>,
    resources: Arc<dyn IResourceStore>,
}

impl GatewayRecycleWorker {
    pub fn new(gateway: Arc<dyn ICloudGateway>, resources: Arc<dyn IResourceStore>) -> Self {
        Self { gateway, resources }
    }

    async fn delete_dependents(
        &self,
        account: &AccountDescriptor,
        region: &str,
        resource_type: ResourceType,
        ids: &[CloudNativeId],
    ) -> anyhow::Result<Vec<StoreId>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        for id in ids {
            self.gateway
                .delete_resource(account, region, resource_type, id)
                .await
                .with_context(|| format!("Deleting dependent {resource_type} {id}"))?;
        }

        let filter = ResourceFilter::scope(account.vendor, resource_type, account.account_id.clone())
            .with_cloud_native_ids(ids.to_vec());
        let stored = self
            .resources
            .list(&filter, Page::first(MAX_BATCH_SIZE as u32))
            .await?;
        Ok(stored.into_iter().map(|r| r.store_id).collect())
    }
}

#[async_trait::async_trait]
impl IRecycleWorker for GatewayRecycleWorker {
    async fn destroy(&self, record: &RecycleRecord, info: Option<&ResourceBasicInfo>) -> anyhow::Result<()> {
        let account = AccountDescriptor::new(record.account_id().clone(), record.vendor());
        let region = info.map_or(record.region(), |i| i.region.as_str());
        let cloud_id = info.map_or(record.cloud_resource_id(), |i| &i.cloud_native_id);

        self.gateway
            .delete_resource(&account, region, record.resource_type(), cloud_id)
            .await
            .with_context(|| format!("Deleting {} {}", record.resource_type(), cloud_id))?;

        let detail = record.detail();
        let mut store_ids = vec![record.resource_id()];
        if detail.with_disk {
            store_ids.extend(
                self.delete_dependents(&account, region, ResourceType::Disk, &detail.disks)
                    .await?,
            );
        }
        if detail.with_eip {
            store_ids.extend(
                self.delete_dependents(&account, region, ResourceType::Eip, &detail.eips)
                    .await?,
            );
        }

        self.resources.batch_delete(&store_ids).await?;
        debug!(
            record_id = %record.id(),
            cloud_id = %cloud_id,
            store_records = store_ids.len(),
            "Destroyed recycled resource"
        );
        Ok(())
    }
}
