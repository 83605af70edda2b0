//! Resource store port (driven/secondary port)
//!
//! This module defines the interface of the persistent mirror of cloud
//! resources.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific
//!   and don't need domain-level classification.
//! - Every batch call is bounded by [`MAX_BATCH_SIZE`] and is atomic on its
//!   own. There are no cross-batch transactions; callers must tolerate a
//!   partially applied sequence of batches.
//! - The [`ResourceFilter`] struct provides a composable query mechanism
//!   without exposing storage implementation details.

use crate::domain::{
    AccountId, CloudNativeId, ResourceBasicInfo, ResourceRecord, ResourceType, StoreId, Vendor,
};

/// Upper bound on the number of items in one batch call
pub const MAX_BATCH_SIZE: usize = 500;

// ============================================================================
// Page
// ============================================================================

/// Offset-based page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: u32,
    pub limit: u32,
}

impl Page {
    /// Creates the first page with the given size
    pub fn first(limit: u32) -> Self {
        Self { offset: 0, limit }
    }

    /// Returns the page following this one
    pub fn next(self) -> Self {
        Self {
            offset: self.offset.saturating_add(self.limit),
            limit: self.limit,
        }
    }

    /// Returns true if a page holding `len` items was the last one
    pub fn is_last(&self, len: usize) -> bool {
        len < self.limit as usize
    }
}

// ============================================================================
// ResourceFilter
// ============================================================================

/// Filter criteria for querying resource records
///
/// All fields are optional; when `None`, no filtering is applied for that
/// field. Multiple filters are combined with AND logic.
///
/// # Example
///
/// ```
/// use stratus_core::domain::{ResourceType, Vendor};
/// use stratus_core::ports::ResourceFilter;
///
/// let filter = ResourceFilter::new()
///     .with_vendor(Vendor::Aws)
///     .with_resource_type(ResourceType::Vpc);
/// assert!(!filter.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ResourceFilter {
    /// Filter by vendor
    pub vendor: Option<Vendor>,
    /// Filter by resource type
    pub resource_type: Option<ResourceType>,
    /// Filter by owning account
    pub account_id: Option<AccountId>,
    /// Filter by region
    pub region: Option<String>,
    /// Restrict to these cloud IDs
    pub cloud_native_ids: Option<Vec<CloudNativeId>>,
}

impl ResourceFilter {
    /// Creates a new empty filter (matches all records)
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter matching exactly one (vendor, resource_type, account) scope
    pub fn scope(vendor: Vendor, resource_type: ResourceType, account_id: AccountId) -> Self {
        Self::new()
            .with_vendor(vendor)
            .with_resource_type(resource_type)
            .with_account_id(account_id)
    }

    /// Sets the vendor filter
    pub fn with_vendor(mut self, vendor: Vendor) -> Self {
        self.vendor = Some(vendor);
        self
    }

    /// Sets the resource type filter
    pub fn with_resource_type(mut self, resource_type: ResourceType) -> Self {
        self.resource_type = Some(resource_type);
        self
    }

    /// Sets the account filter
    pub fn with_account_id(mut self, account_id: AccountId) -> Self {
        self.account_id = Some(account_id);
        self
    }

    /// Sets the region filter
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Restricts the query to the given cloud IDs
    pub fn with_cloud_native_ids(mut self, ids: Vec<CloudNativeId>) -> Self {
        self.cloud_native_ids = Some(ids);
        self
    }

    /// Returns true if no filters are set
    pub fn is_empty(&self) -> bool {
        self.vendor.is_none()
            && self.resource_type.is_none()
            && self.account_id.is_none()
            && self.region.is_none()
            && self.cloud_native_ids.is_none()
    }
}

// ============================================================================
// IResourceStore trait
// ============================================================================

/// Port trait for the resource mirror
///
/// ## Implementation Notes
///
/// - Batches larger than [`MAX_BATCH_SIZE`] must be rejected, not split.
/// - `batch_create` must reject a record whose `cloud_native_id` already
///   exists in its (vendor, resource_type, account_id) scope.
/// - `batch_update` matches records by `store_id`.
/// - `batch_delete` ignores IDs that do not exist.
#[async_trait::async_trait]
pub trait IResourceStore: Send + Sync {
    /// Lists records matching `filter`, ordered by cloud ID
    async fn list(&self, filter: &ResourceFilter, page: Page) -> anyhow::Result<Vec<ResourceRecord>>;

    /// Inserts new records in one atomic batch
    async fn batch_create(&self, records: &[ResourceRecord]) -> anyhow::Result<()>;

    /// Overwrites region, attributes and sync time of existing records
    async fn batch_update(&self, records: &[ResourceRecord]) -> anyhow::Result<()>;

    /// Deletes records by store ID in one atomic batch
    async fn batch_delete(&self, ids: &[StoreId]) -> anyhow::Result<()>;

    /// Retrieves the basic projection of one record
    async fn get_basic_info(
        &self,
        resource_type: ResourceType,
        id: &StoreId,
    ) -> anyhow::Result<Option<ResourceBasicInfo>>;
}
