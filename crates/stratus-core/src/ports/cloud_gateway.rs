//! Cloud gateway port (driven/secondary port)
//!
//! This module defines the interface for talking to a cloud provider. One
//! implementation serves every vendor; the vendor is carried by the
//! [`AccountDescriptor`].
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are adapter-specific
//!   and don't need domain-level classification.
//! - Listing calls are exhaustive: implementations follow pagination
//!   internally and fail the whole call if any page fails. A truncated
//!   listing would make reconciliation delete live records.
//! - Deleting an object that no longer exists must succeed, so destruction
//!   can be retried safely.

use crate::domain::{AccountDescriptor, CloudNativeId, CloudRegion, RawCloudItem, ResourceType};

/// Port trait for cloud provider access
#[async_trait::async_trait]
pub trait ICloudGateway: Send + Sync {
    /// Lists every region visible to the account, available or not
    async fn list_regions(&self, account: &AccountDescriptor) -> anyhow::Result<Vec<CloudRegion>>;

    /// Lists every object of `resource_type` in one region
    ///
    /// Public resource types (regions, zones, images) ignore the account's
    /// ownership but still use its credentials.
    async fn list_resources(
        &self,
        account: &AccountDescriptor,
        region: &str,
        resource_type: ResourceType,
    ) -> anyhow::Result<Vec<RawCloudItem>>;

    /// Deletes one object; succeeds if it is already gone
    async fn delete_resource(
        &self,
        account: &AccountDescriptor,
        region: &str,
        resource_type: ResourceType,
        cloud_id: &CloudNativeId,
    ) -> anyhow::Result<()>;
}
