//! HttpCloudGateway - ICloudGateway implementation over the gateway service
//!
//! Wraps the [`GatewayClient`] and the [`listing`](crate::listing) helpers
//! to fulfil the [`ICloudGateway`] port contract.
//!
//! ## Endpoints
//!
//! | Operation         | Request                                                             |
//! |-------------------|---------------------------------------------------------------------|
//! | `list_regions`    | `GET {base}/{vendor}/accounts/{account}/regions`                    |
//! | `list_resources`  | `GET {base}/{vendor}/accounts/{account}/resources/{type}?region=`   |
//! | `delete_resource` | `DELETE {base}/{vendor}/accounts/{account}/resources/{type}/{id}?region=` |
//!
//! Deleting a resource that is already gone (404) is reported as success.

use std::sync::Arc;

use anyhow::Context;
use reqwest::Method;
use tracing::debug;

use stratus_core::config::GatewayConfig;
use stratus_core::domain::{AccountDescriptor, CloudNativeId, CloudRegion, RawCloudItem, ResourceType};
use stratus_core::ports::ICloudGateway;

use crate::client::GatewayClient;
use crate::listing::{list_all, ListRequest};
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use crate::GatewayError;

/// Cloud gateway port backed by the HTTP gateway service
pub struct HttpCloudGateway {
    client: GatewayClient,
    page_size: u32,
}

impl HttpCloudGateway {
    /// Creates a gateway from an existing client
    pub fn new(client: GatewayClient, page_size: u32) -> Self {
        Self { client, page_size }
    }

    /// Creates a gateway from configuration
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::InvalidUrl` if `base_url` is invalid.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let limiter = Arc::new(RateLimiter::new(RateLimitConfig::per_second(
            config.requests_per_second,
            config.max_retries,
        )));

        let mut client = GatewayClient::new(&config.base_url)?.with_rate_limiter(limiter);
        if let Some(ref token) = config.token {
            client = client.with_token(token.clone());
        }

        Ok(Self::new(client, config.page_size))
    }

    /// Returns the underlying client
    pub fn client(&self) -> &GatewayClient {
        &self.client
    }
}

#[async_trait::async_trait]
impl ICloudGateway for HttpCloudGateway {
    async fn list_regions(&self, account: &AccountDescriptor) -> anyhow::Result<Vec<CloudRegion>> {
        let vendor = account.vendor.as_str();
        let request = ListRequest {
            segments: vec![vendor, "accounts", account.account_id.as_str(), "regions"],
            query: Vec::new(),
            page_size: self.page_size,
            limit_key: vendor,
        };

        let regions: Vec<CloudRegion> = list_all(&self.client, &request)
            .await
            .with_context(|| format!("Failed to list {} regions for {}", vendor, account.account_id))?;

        debug!(
            vendor,
            account_id = %account.account_id,
            count = regions.len(),
            "Listed regions"
        );
        Ok(regions)
    }

    async fn list_resources(
        &self,
        account: &AccountDescriptor,
        region: &str,
        resource_type: ResourceType,
    ) -> anyhow::Result<Vec<RawCloudItem>> {
        let vendor = account.vendor.as_str();
        let mut query = Vec::new();
        if !region.is_empty() {
            query.push(("region", region.to_string()));
        }
        let request = ListRequest {
            segments: vec![
                vendor,
                "accounts",
                account.account_id.as_str(),
                "resources",
                resource_type.as_str(),
            ],
            query,
            page_size: self.page_size,
            limit_key: vendor,
        };

        let mut items: Vec<RawCloudItem> = list_all(&self.client, &request).await.with_context(|| {
            format!(
                "Failed to list {} {} in {} for {}",
                vendor, resource_type, region, account.account_id
            )
        })?;

        // Items listed under a region belong to it unless they say otherwise
        for item in &mut items {
            if item.region.is_none() && !region.is_empty() {
                item.region = Some(region.to_string());
            }
        }

        debug!(
            vendor,
            resource_type = %resource_type,
            region,
            account_id = %account.account_id,
            count = items.len(),
            "Listed resources"
        );
        Ok(items)
    }

    async fn delete_resource(
        &self,
        account: &AccountDescriptor,
        region: &str,
        resource_type: ResourceType,
        cloud_id: &CloudNativeId,
    ) -> anyhow::Result<()> {
        let vendor = account.vendor.as_str();
        let segments = [
            vendor,
            "accounts",
            account.account_id.as_str(),
            "resources",
            resource_type.as_str(),
            cloud_id.as_str(),
        ];
        let mut query = Vec::new();
        if !region.is_empty() {
            query.push(("region", region.to_string()));
        }

        match self
            .client
            .execute_with_retry(Method::DELETE, &segments, &query, vendor)
            .await
        {
            Ok(_) => {
                debug!(vendor, resource_type = %resource_type, cloud_id = %cloud_id, "Deleted resource");
                Ok(())
            }
            Err(GatewayError::NotFound(_)) => {
                debug!(
                    vendor,
                    resource_type = %resource_type,
                    cloud_id = %cloud_id,
                    "Resource already gone"
                );
                Ok(())
            }
            Err(e) => Err(anyhow::Error::new(e).context(format!(
                "Failed to delete {} {} {}",
                vendor, resource_type, cloud_id
            ))),
        }
    }
}
