//! Account descriptors
//!
//! An [`AccountDescriptor`] identifies one cloud account the sync sweep
//! visits. It is read from the account store at the start of a sweep page
//! and treated as immutable for the duration of that pass.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{errors::DomainError, newtypes::AccountId, vendor::Vendor};

/// Purpose of a registered cloud account
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    /// Holds managed resources; the only kind that is synced
    #[default]
    Resource,
    /// Used only to register sub-accounts
    Registration,
    /// Read-only account for security audit tooling
    SecurityAudit,
}

impl AccountKind {
    /// Returns true if resources in this account are mirrored into the store
    pub fn is_syncable(&self) -> bool {
        matches!(self, AccountKind::Resource)
    }

    /// Returns the canonical string form
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKind::Resource => "resource",
            AccountKind::Registration => "registration",
            AccountKind::SecurityAudit => "security_audit",
        }
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "resource" => Ok(AccountKind::Resource),
            "registration" => Ok(AccountKind::Registration),
            "security_audit" => Ok(AccountKind::SecurityAudit),
            other => Err(DomainError::ValidationFailed(format!(
                "Unknown account kind: {other}"
            ))),
        }
    }
}

/// One cloud account, as seen by the sync sweep
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountDescriptor {
    pub account_id: AccountId,
    pub vendor: Vendor,
    pub kind: AccountKind,
}

impl AccountDescriptor {
    /// Creates a resource account descriptor
    pub fn new(account_id: AccountId, vendor: Vendor) -> Self {
        Self {
            account_id,
            vendor,
            kind: AccountKind::Resource,
        }
    }

    /// Overrides the account kind (builder style)
    pub fn with_kind(mut self, kind: AccountKind) -> Self {
        self.kind = kind;
        self
    }
}
