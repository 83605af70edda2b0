//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including validation failures, invalid state transitions and
//! unknown enumeration values.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid state transition attempt
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// Vendor name not recognised
    #[error("Unknown vendor: {0}")]
    UnknownVendor(String),

    /// Resource type name not recognised
    #[error("Unknown resource type: {0}")]
    UnknownResourceType(String),
}
