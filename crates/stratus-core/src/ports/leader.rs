//! Leader gate port
//!
//! At most one process instance in a fleet should run a given control loop.
//! The gate is advisory: callers ask before every unit of work and never
//! hold the answer across operations.

/// Port trait for the singleton-executor check
#[async_trait::async_trait]
pub trait ILeaderGate: Send + Sync {
    /// Returns true if this instance is currently the leader
    ///
    /// Implementations report coordination failures as `false`.
    async fn is_master(&self) -> bool;
}
