//! Recycle records and their lifecycle
//!
//! A [`RecycleRecord`] is a deferred-destruction ticket. It is created in
//! [`RecycleStatus::WaitingRecycle`] by the recycle trigger with a
//! `retention_deadline`, and is then owned by the lifecycle manager.
//!
//! ## State machine
//!
//! ```text
//!                    ┌──────────────┐
//!          ┌────────►│   Recycled   │ (terminal)
//!          │         └──────────────┘
//! ┌────────┴───────┐ ┌──────────────┐
//! │ WaitingRecycle ├►│    Failed    │ (terminal, carries failure reason)
//! └────────┬───────┘ └──────────────┘
//!          │         ┌──────────────┐
//!          └────────►│  Recovered   │ (terminal, user restored the resource)
//!                    └──────────────┘
//! ```
//!
//! Terminal states are never left.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{
    errors::DomainError,
    newtypes::{AccountId, CloudNativeId, RecordId, StoreId, TaskId},
    vendor::{ResourceType, Vendor},
};

/// Lifecycle status of a recycle record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecycleStatus {
    /// In the recycle bin, waiting for its retention deadline
    #[default]
    WaitingRecycle,
    /// The resource was destroyed
    Recycled,
    /// Destruction kept failing and was abandoned
    Failed,
    /// The user restored the resource before destruction
    Recovered,
}

impl RecycleStatus {
    /// Returns the canonical string form
    pub fn as_str(&self) -> &'static str {
        match self {
            RecycleStatus::WaitingRecycle => "wait_recycle",
            RecycleStatus::Recycled => "recycled",
            RecycleStatus::Failed => "failed",
            RecycleStatus::Recovered => "recovered",
        }
    }

    /// Returns true if no further transition is allowed
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RecycleStatus::WaitingRecycle)
    }
}

impl fmt::Display for RecycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecycleStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wait_recycle" => Ok(RecycleStatus::WaitingRecycle),
            "recycled" => Ok(RecycleStatus::Recycled),
            "failed" => Ok(RecycleStatus::Failed),
            "recovered" => Ok(RecycleStatus::Recovered),
            other => Err(DomainError::ValidationFailed(format!(
                "Unknown recycle status: {other}"
            ))),
        }
    }
}

/// Whether a record was recycled directly or as a dependent of another one
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecycleType {
    /// Recycled directly by a user
    #[default]
    Normal,
    /// Recycled together with a parent (e.g. a disk attached to a VM)
    Related,
}

impl RecycleType {
    /// Returns the canonical string form
    pub fn as_str(&self) -> &'static str {
        match self {
            RecycleType::Normal => "normal",
            RecycleType::Related => "related",
        }
    }
}

impl FromStr for RecycleType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(RecycleType::Normal),
            "related" => Ok(RecycleType::Related),
            other => Err(DomainError::ValidationFailed(format!(
                "Unknown recycle type: {other}"
            ))),
        }
    }
}

/// Recovery snapshot captured when the resource entered the recycle bin
///
/// Lists the dependents that were attached at that moment, so destruction
/// can tear them down too and recovery can re-attach them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecycleDetail {
    /// Cloud IDs of attached disks
    #[serde(default)]
    pub disks: Vec<CloudNativeId>,
    /// Cloud IDs of associated elastic IPs
    #[serde(default)]
    pub eips: Vec<CloudNativeId>,
    /// Destroy attached disks together with the resource
    #[serde(default)]
    pub with_disk: bool,
    /// Release associated elastic IPs together with the resource
    #[serde(default)]
    pub with_eip: bool,
}

/// A deferred-destruction ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecycleRecord {
    id: RecordId,
    task_id: TaskId,
    vendor: Vendor,
    resource_type: ResourceType,
    resource_id: StoreId,
    cloud_resource_id: CloudNativeId,
    account_id: AccountId,
    region: String,
    recycle_type: RecycleType,
    status: RecycleStatus,
    detail: RecycleDetail,
    failure_reason: Option<String>,
    created_at: DateTime<Utc>,
    retention_deadline: DateTime<Utc>,
}

impl RecycleRecord {
    /// Creates a record in `WaitingRecycle` for the given resource
    ///
    /// # Arguments
    /// * `task_id` - Recycle request this record belongs to
    /// * `resource` - Basic info of the recycled resource
    /// * `retention` - How long the resource stays recoverable
    pub fn new(
        task_id: TaskId,
        resource: &super::ResourceBasicInfo,
        retention: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: RecordId::new(),
            task_id,
            vendor: resource.vendor,
            resource_type: resource.resource_type,
            resource_id: resource.store_id,
            cloud_resource_id: resource.cloud_native_id.clone(),
            account_id: resource.account_id.clone(),
            region: resource.region.clone(),
            recycle_type: RecycleType::Normal,
            status: RecycleStatus::WaitingRecycle,
            detail: RecycleDetail::default(),
            failure_reason: None,
            created_at: now,
            retention_deadline: now + retention,
        }
    }

    /// Reconstitutes a record from storage
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: RecordId,
        task_id: TaskId,
        vendor: Vendor,
        resource_type: ResourceType,
        resource_id: StoreId,
        cloud_resource_id: CloudNativeId,
        account_id: AccountId,
        region: String,
        recycle_type: RecycleType,
        status: RecycleStatus,
        detail: RecycleDetail,
        failure_reason: Option<String>,
        created_at: DateTime<Utc>,
        retention_deadline: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            task_id,
            vendor,
            resource_type,
            resource_id,
            cloud_resource_id,
            account_id,
            region,
            recycle_type,
            status,
            detail,
            failure_reason,
            created_at,
            retention_deadline,
        }
    }

    /// Sets the recovery snapshot (builder style)
    pub fn with_detail(mut self, detail: RecycleDetail) -> Self {
        self.detail = detail;
        self
    }

    /// Marks the record as a dependent of another one (builder style)
    pub fn related(mut self) -> Self {
        self.recycle_type = RecycleType::Related;
        self
    }

    /// Overrides the retention deadline (builder style)
    pub fn with_retention_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.retention_deadline = deadline;
        self
    }

    // --- Accessors ---

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn vendor(&self) -> Vendor {
        self.vendor
    }

    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    pub fn resource_id(&self) -> StoreId {
        self.resource_id
    }

    pub fn cloud_resource_id(&self) -> &CloudNativeId {
        &self.cloud_resource_id
    }

    pub fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn recycle_type(&self) -> RecycleType {
        self.recycle_type
    }

    pub fn status(&self) -> RecycleStatus {
        self.status
    }

    pub fn detail(&self) -> &RecycleDetail {
        &self.detail
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn retention_deadline(&self) -> DateTime<Utc> {
        self.retention_deadline
    }

    /// Returns true if the record may be destroyed at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == RecycleStatus::WaitingRecycle && self.retention_deadline <= now
    }

    // --- Transitions ---

    /// Checks whether moving to `target` is allowed
    pub fn can_transition_to(&self, target: RecycleStatus) -> bool {
        self.status == RecycleStatus::WaitingRecycle && target != RecycleStatus::WaitingRecycle
    }

    /// Moves the record to a new status
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` if the record is already terminal
    /// or the target is `WaitingRecycle`.
    pub fn transition_to(&mut self, target: RecycleStatus) -> Result<(), DomainError> {
        if !self.can_transition_to(target) {
            return Err(DomainError::InvalidState {
                from: self.status.to_string(),
                to: target.to_string(),
            });
        }
        self.status = target;
        Ok(())
    }

    /// Moves the record to `Failed`, keeping the causing error
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` if the record is already terminal.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), DomainError> {
        self.transition_to(RecycleStatus::Failed)?;
        self.failure_reason = Some(reason.into());
        Ok(())
    }
}
