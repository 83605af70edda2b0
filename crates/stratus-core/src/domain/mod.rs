//! Domain entities and business rules
//!
//! This module contains the core domain types for Stratus:
//! - Newtypes for type-safe identifiers
//! - Vendor and resource type enumerations
//! - Resource records mirrored from the cloud, and raw cloud items
//! - Account descriptors driving the sync sweep
//! - Recycle records and their lifecycle state machine
//! - Domain-specific error types

pub mod account;
pub mod errors;
pub mod newtypes;
pub mod recycle;
pub mod resource;
pub mod vendor;

// Re-export commonly used types
pub use account::{AccountDescriptor, AccountKind};
pub use errors::DomainError;
pub use newtypes::*;
pub use recycle::{RecycleDetail, RecycleRecord, RecycleStatus, RecycleType};
pub use resource::{Attributes, CloudItem, CloudRegion, RawCloudItem, ResourceBasicInfo, ResourceRecord};
pub use vendor::{ResourceType, Vendor};
