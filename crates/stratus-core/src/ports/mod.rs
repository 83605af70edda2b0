//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the control loops
//! depend on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`ICloudGateway`] - Cloud provider listing and deletion, one gateway per vendor
//! - [`IResourceStore`] - Persistent mirror of cloud resources
//! - [`IAccountStore`] - Registered cloud accounts
//! - [`IRecycleStore`] - Recycle bin records
//! - [`ILeaderGate`] - Singleton-executor check
//! - [`IRecycleWorker`] - Resource-type-specific destructive action

pub mod account_store;
pub mod cloud_gateway;
pub mod leader;
pub mod recycle_store;
pub mod recycle_worker;
pub mod resource_store;

pub use account_store::IAccountStore;
pub use cloud_gateway::ICloudGateway;
pub use leader::ILeaderGate;
pub use recycle_store::{DueRecord, IRecycleStore};
pub use recycle_worker::IRecycleWorker;
pub use resource_store::{IResourceStore, Page, ResourceFilter, MAX_BATCH_SIZE};
