//! Gateway-backed reconciliation drivers
//!
//! Every (vendor, resource type) pair is served by one [`GatewayDriver`].
//! What differs between vendors lives in a [`VendorProfile`]:
//!
//! - which resource types the vendor exposes;
//! - when a listed region counts as available;
//! - how raw gateway fields map to stored attributes.
//!
//! [`build_registry`] assembles the full registry for the daemon.

mod gateway;
mod vendors;

pub use gateway::GatewayDriver;
pub use vendors::{AwsProfile, AzureProfile, GcpProfile, HuaWeiProfile, TCloudProfile};

use std::sync::Arc;

use stratus_core::domain::{
    Attributes, CloudItem, CloudNativeId, CloudRegion, RawCloudItem, ResourceType, Vendor,
};
use stratus_core::ports::{ICloudGateway, IResourceStore};

use crate::driver::DriverRegistry;

/// Attribute recording whether a region is usable
pub const REGION_STATUS: &str = "status";

/// Attribute fields compared when deciding whether a record is stale
pub fn authoritative_fields(resource_type: ResourceType) -> &'static [&'static str] {
    match resource_type {
        ResourceType::Region => &["name", REGION_STATUS],
        ResourceType::Zone => &["name", "state"],
        ResourceType::Image => &["name", "state", "platform"],
        ResourceType::Vpc => &["name", "cidr"],
        ResourceType::Subnet => &["name", "cidr", "vpc_id", "zone"],
        ResourceType::SecurityGroup => &["name", "description"],
        ResourceType::RouteTable => &["name", "vpc_id"],
        ResourceType::NetworkInterface => &["name", "subnet_id", "private_ip", "instance_id"],
        ResourceType::Disk => &["name", "size", "state", "instance_id"],
        ResourceType::Eip => &["public_ip", "state", "instance_id"],
        ResourceType::Cvm => &["name", "state", "instance_type", "zone", "private_ip", "public_ip"],
    }
}

/// Vendor-specific knowledge used by [`GatewayDriver`]
pub trait VendorProfile: Send + Sync {
    fn vendor(&self) -> Vendor;

    /// Resource types in dependency order
    fn resource_types(&self) -> &'static [ResourceType];

    /// Returns true if resources should be listed in `region`
    fn region_available(&self, region: &CloudRegion) -> bool;

    /// Raw field names renamed to normalized attribute names
    fn field_aliases(&self) -> &'static [(&'static str, &'static str)] {
        &[]
    }

    /// Renames that only apply to `resource_type`, checked before
    /// [`VendorProfile::field_aliases`]
    fn type_aliases(&self, _resource_type: ResourceType) -> &'static [(&'static str, &'static str)] {
        &[]
    }

    /// Maps a listed region to a cloud item
    fn map_region(&self, region: CloudRegion) -> anyhow::Result<CloudItem> {
        let available = self.region_available(&region);
        let cloud_native_id = CloudNativeId::new(region.id.clone())?;
        let mut attributes = self.normalize(region.fields, ResourceType::Region);
        attributes.insert(
            REGION_STATUS.to_string(),
            serde_json::Value::from(if available { "available" } else { "unavailable" }),
        );

        Ok(CloudItem {
            cloud_native_id,
            region: region.id,
            attributes,
            available,
        })
    }

    /// Maps a listed resource to a cloud item
    ///
    /// `region` is the region the listing ran in, used when the raw item
    /// does not carry one.
    fn map_item(
        &self,
        raw: RawCloudItem,
        region: &str,
        resource_type: ResourceType,
    ) -> anyhow::Result<CloudItem> {
        let cloud_native_id = CloudNativeId::new(raw.id)?;
        Ok(CloudItem {
            cloud_native_id,
            region: raw.region.unwrap_or_else(|| region.to_string()),
            attributes: self.normalize(raw.fields, resource_type),
            available: true,
        })
    }

    /// Applies the alias tables of `resource_type` to a raw field map
    fn normalize(
        &self,
        fields: serde_json::Map<String, serde_json::Value>,
        resource_type: ResourceType,
    ) -> Attributes {
        let own = self.type_aliases(resource_type);
        let shared = self.field_aliases();
        fields
            .into_iter()
            .map(|(key, value)| {
                let key = own
                    .iter()
                    .chain(shared)
                    .find(|(raw, _)| *raw == key)
                    .map(|(_, normalized)| (*normalized).to_string())
                    .unwrap_or(key);
                (key, value)
            })
            .collect()
    }
}

/// Returns the profile of `vendor`
pub fn profile_for(vendor: Vendor) -> Arc<dyn VendorProfile> {
    match vendor {
        Vendor::Aws => Arc::new(AwsProfile),
        Vendor::TCloud => Arc::new(TCloudProfile),
        Vendor::HuaWei => Arc::new(HuaWeiProfile),
        Vendor::Gcp => Arc::new(GcpProfile),
        Vendor::Azure => Arc::new(AzureProfile),
    }
}

/// Builds a registry holding a driver for every supported (vendor, type)
pub fn build_registry(
    gateway: Arc<dyn ICloudGateway>,
    store: Arc<dyn IResourceStore>,
) -> DriverRegistry {
    let mut registry = DriverRegistry::new();
    for vendor in Vendor::ALL {
        let profile = profile_for(vendor);
        for resource_type in profile.resource_types() {
            registry.register(Arc::new(GatewayDriver::new(
                Arc::clone(&profile),
                *resource_type,
                Arc::clone(&gateway),
                Arc::clone(&store),
            )));
        }
    }
    registry
}
