//! Stratus Sync - Background control loops
//!
//! Provides:
//! - A shared retry policy with randomized backoff
//! - The vendor-agnostic reconciliation algorithm
//! - Per-vendor reconciliation drivers over the cloud gateway
//! - The leader-gated sync scheduler
//! - The recycle-bin lifecycle manager
//! - Supervision of long-running background tasks
//!
//! ## Modules
//!
//! - [`retry`] - Bounded retry with jittered backoff, per-call timeouts
//! - [`driver`] - The [`ReconcileDriver`](driver::ReconcileDriver) trait and its registry
//! - [`reconcile`] - Diff and apply of one (vendor, resource type, account) scope
//! - [`drivers`] - Gateway-backed drivers and vendor profiles
//! - [`scheduler`] - Periodic sweep over every account and vendor
//! - [`recycle`] - TTL-based destruction of recycled resources
//! - [`leader`] - Leader gate helpers
//! - [`supervisor`] - Restarting task supervisor

pub mod driver;
pub mod drivers;
pub mod leader;
pub mod reconcile;
pub mod recycle;
pub mod retry;
pub mod scheduler;
pub mod supervisor;

use stratus_core::domain::{AccountId, DomainError};
use thiserror::Error;

/// Errors raised by the control loops
#[derive(Debug, Error)]
pub enum SyncError {
    /// Another sync of the same account is already running in this process
    #[error("Sync already in progress for account {0}")]
    SyncInProgress(AccountId),

    /// A cloud or store call exceeded its time limit
    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    /// A recycle bin request was rejected before anything changed
    #[error("Invalid recycle operation: {0}")]
    InvalidRecycleOperation(String),

    /// A configured batch size exceeds what the store accepts
    #[error("Batch size {size} exceeds the limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },

    /// The requested account is not registered
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// A domain-level error propagated from stratus-core
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}
