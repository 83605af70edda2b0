//! Diff between cloud truth and store truth
//!
//! Both sides are joined on `cloud_native_id`:
//!
//! | Cloud | Store | Outcome                              |
//! |-------|-------|--------------------------------------|
//! | yes   | no    | `to_create`                          |
//! | yes   | yes   | `to_update` if the driver says so    |
//! | no    | yes   | `to_delete`                          |
//!
//! The plan preserves the cloud listing order for creates and updates and
//! the store order for deletes.

use std::collections::{HashMap, HashSet};

use stratus_core::domain::{CloudItem, CloudNativeId, ResourceRecord};
use tracing::warn;

use crate::driver::ReconcileDriver;

/// Create/update/delete sets for one scope
#[derive(Debug, Clone, Default)]
pub struct ReconcilePlan {
    /// Cloud items without a store record
    pub to_create: Vec<CloudItem>,
    /// Store records whose cloud item changed, paired with that item
    pub to_update: Vec<(ResourceRecord, CloudItem)>,
    /// Store records whose cloud item is gone
    pub to_delete: Vec<ResourceRecord>,
}

impl ReconcilePlan {
    /// Returns true if nothing needs to change
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }

    /// Total number of planned mutations
    pub fn len(&self) -> usize {
        self.to_create.len() + self.to_update.len() + self.to_delete.len()
    }
}

/// Drops repeated cloud IDs from a listing, keeping the first occurrence
pub fn dedup_cloud_items(items: Vec<CloudItem>) -> Vec<CloudItem> {
    let mut seen: HashSet<CloudNativeId> = HashSet::with_capacity(items.len());
    let mut unique = Vec::with_capacity(items.len());
    for item in items {
        if seen.insert(item.cloud_native_id.clone()) {
            unique.push(item);
        } else {
            warn!(cloud_id = %item.cloud_native_id, "Duplicate cloud ID in listing, keeping first");
        }
    }
    unique
}

/// Computes the plan turning `store` into a mirror of `cloud`
///
/// `cloud` may contain duplicates; the first occurrence wins.
pub fn diff(
    driver: &dyn ReconcileDriver,
    cloud: Vec<CloudItem>,
    store: Vec<ResourceRecord>,
) -> ReconcilePlan {
    let cloud = dedup_cloud_items(cloud);
    let cloud_ids: HashSet<&CloudNativeId> = cloud.iter().map(|c| &c.cloud_native_id).collect();

    let mut plan = ReconcilePlan::default();
    let mut stored: HashMap<CloudNativeId, ResourceRecord> = HashMap::with_capacity(store.len());
    for record in store {
        if cloud_ids.contains(&record.cloud_native_id) {
            stored.insert(record.cloud_native_id.clone(), record);
        } else {
            plan.to_delete.push(record);
        }
    }

    for item in cloud {
        match stored.remove(&item.cloud_native_id) {
            Some(record) => {
                if driver.is_changed(&record, &item) {
                    plan.to_update.push((record, item));
                }
            }
            None => plan.to_create.push(item),
        }
    }

    plan
}
