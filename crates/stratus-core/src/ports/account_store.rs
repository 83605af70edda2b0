//! Account store port
//!
//! Registered cloud accounts are managed outside the control plane. The
//! sync sweep only reads them, one page at a time.

use crate::domain::{AccountDescriptor, AccountId, Vendor};

use super::resource_store::Page;

/// Port trait for reading registered cloud accounts
#[async_trait::async_trait]
pub trait IAccountStore: Send + Sync {
    /// Lists accounts of one vendor, ordered by account ID
    ///
    /// A page shorter than `page.limit` is the last one.
    async fn list_accounts(&self, vendor: Vendor, page: Page) -> anyhow::Result<Vec<AccountDescriptor>>;

    /// Retrieves one account by ID
    async fn get_account(&self, id: &AccountId) -> anyhow::Result<Option<AccountDescriptor>>;
}
