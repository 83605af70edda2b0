//! Resource records and cloud items
//!
//! A [`ResourceRecord`] is the store's mirror of one cloud object. A
//! [`CloudItem`] is the driver-normalised view of the same object as the
//! cloud provider currently reports it. Reconciliation joins the two on
//! [`CloudNativeId`].
//!
//! [`RawCloudItem`] and [`CloudRegion`] are the untyped shapes returned by a
//! cloud gateway before any vendor-specific mapping is applied.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    newtypes::{AccountId, CloudNativeId, StoreId},
    vendor::{ResourceType, Vendor},
};

/// Attribute bag of a resource, ordered by key so equality is stable
pub type Attributes = BTreeMap<String, serde_json::Value>;

// ============================================================================
// CloudItem
// ============================================================================

/// A live cloud object, normalised by a driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudItem {
    /// Provider-assigned identifier (join key)
    pub cloud_native_id: CloudNativeId,
    /// Region the object lives in; empty for global objects
    pub region: String,
    /// Driver-mapped attributes
    pub attributes: Attributes,
    /// False when the provider lists the object but reports it unusable
    pub available: bool,
}

impl CloudItem {
    /// Creates an available item with no attributes
    pub fn new(cloud_native_id: CloudNativeId, region: impl Into<String>) -> Self {
        Self {
            cloud_native_id,
            region: region.into(),
            attributes: Attributes::new(),
            available: true,
        }
    }

    /// Sets one attribute (builder style)
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Marks the item as unavailable (builder style)
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }
}

// ============================================================================
// ResourceRecord
// ============================================================================

/// The store's mirror of one cloud object
///
/// Within one (vendor, resource_type, account_id) scope, `cloud_native_id`
/// is unique. Records are only ever created, updated and deleted through
/// the store's batch calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Internal handle used by every other subsystem
    pub store_id: StoreId,
    /// Owning cloud provider
    pub vendor: Vendor,
    /// Kind of object
    pub resource_type: ResourceType,
    /// Provider-assigned identifier (join key)
    pub cloud_native_id: CloudNativeId,
    /// Owning account
    pub account_id: AccountId,
    /// Region the object lives in; empty for global objects
    pub region: String,
    /// Mirrored attributes
    pub attributes: Attributes,
    /// When the record last matched cloud truth
    pub last_synced_at: DateTime<Utc>,
}

impl ResourceRecord {
    /// Builds a new record for a cloud item discovered in the given scope
    ///
    /// A fresh [`StoreId`] is generated; the store persists it as-is.
    pub fn from_cloud_item(
        vendor: Vendor,
        resource_type: ResourceType,
        account_id: AccountId,
        item: &CloudItem,
    ) -> Self {
        Self {
            store_id: StoreId::new(),
            vendor,
            resource_type,
            cloud_native_id: item.cloud_native_id.clone(),
            account_id,
            region: item.region.clone(),
            attributes: item.attributes.clone(),
            last_synced_at: Utc::now(),
        }
    }

    /// Overwrites the mirrored state with the cloud item's state
    pub fn apply_cloud_item(&mut self, item: &CloudItem) {
        self.region = item.region.clone();
        self.attributes = item.attributes.clone();
        self.last_synced_at = Utc::now();
    }

    /// Returns an attribute as a string slice, if present and a string
    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|v| v.as_str())
    }
}

// ============================================================================
// ResourceBasicInfo
// ============================================================================

/// Minimal projection of a resource, used by the recycle workers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceBasicInfo {
    pub store_id: StoreId,
    pub vendor: Vendor,
    pub resource_type: ResourceType,
    pub account_id: AccountId,
    pub cloud_native_id: CloudNativeId,
    pub region: String,
}

impl From<&ResourceRecord> for ResourceBasicInfo {
    fn from(record: &ResourceRecord) -> Self {
        Self {
            store_id: record.store_id,
            vendor: record.vendor,
            resource_type: record.resource_type,
            account_id: record.account_id.clone(),
            cloud_native_id: record.cloud_native_id.clone(),
            region: record.region.clone(),
        }
    }
}

// ============================================================================
// Gateway shapes
// ============================================================================

/// A resource as listed by a cloud gateway, before vendor mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCloudItem {
    /// Provider-assigned identifier
    pub id: String,
    /// Region reported by the provider, if any
    #[serde(default)]
    pub region: Option<String>,
    /// Every other field, untouched
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl RawCloudItem {
    /// Returns a field as a string slice, if present and a string
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(|v| v.as_str())
    }
}

/// A region as listed by a cloud gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudRegion {
    /// Region identifier (e.g. `ap-guangzhou`, `us-east-1`)
    pub id: String,
    /// Provider-specific status fields
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl CloudRegion {
    /// Creates a region with no status fields
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: serde_json::Map::new(),
        }
    }

    /// Sets one status field (builder style)
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Returns a field as a string slice, if present and a string
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(|v| v.as_str())
    }
}
