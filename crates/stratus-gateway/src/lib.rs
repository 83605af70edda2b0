//! Stratus Gateway - HTTP cloud gateway client
//!
//! Provides an async client for the cloud gateway service that fronts every
//! vendor API:
//! - Region listing per account
//! - Paginated resource listing per region
//! - Idempotent resource deletion
//!
//! ## Modules
//!
//! - [`client`] - Authenticated HTTP client with 429 handling
//! - [`listing`] - Page-token pagination over resource listings
//! - [`provider`] - `ICloudGateway` implementation
//! - [`rate_limit`] - Token bucket request throttling

pub mod client;
pub mod listing;
pub mod provider;
pub mod rate_limit;

pub use client::GatewayClient;
pub use provider::HttpCloudGateway;

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when communicating with the cloud gateway
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The bearer token is missing, invalid or expired
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The token lacks permission for the requested account
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The requested account or resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limit still exceeded after every retry
    #[error("Too many requests, last retry after {retry_after:?}")]
    TooManyRequests {
        /// Delay the server asked for on the last attempt
        retry_after: Duration,
    },

    /// A server-side error occurred (5xx)
    #[error("Server error: {0}")]
    ServerError(String),

    /// Any other unexpected HTTP status
    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
        /// Response body, possibly truncated
        body: String,
    },

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The configured base URL or a built URL is invalid
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl GatewayError {
    /// Returns true if retrying the same call later may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GatewayError::TooManyRequests { .. }
                | GatewayError::ServerError(_)
                | GatewayError::NetworkError(_)
        )
    }
}
