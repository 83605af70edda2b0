//! Cloud gateway HTTP client
//!
//! Provides a typed HTTP client for the cloud gateway service. Handles the
//! bearer token header, URL construction from path segments, status mapping
//! and HTTP 429 back-off.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use reqwest::Method;
//! use stratus_gateway::client::GatewayClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = GatewayClient::new("https://gateway.internal/api/v1")?.with_token("secret");
//! let response = client
//!     .execute_with_retry(Method::GET, &["aws", "accounts", "123", "regions"], &[], "aws")
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::{sync::Arc, time::Duration};

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use tracing::{debug, info, warn};
use url::Url;

use crate::rate_limit::{parse_retry_after, RateLimitConfig, RateLimiter};
use crate::GatewayError;

/// Retry-After used when a 429 response carries no usable header
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(5);

/// Longest response body kept in an error message
const MAX_ERROR_BODY: usize = 512;

/// HTTP client for cloud gateway calls
///
/// Wraps `reqwest::Client` with the bearer token and base URL, and
/// integrates a shared [`RateLimiter`] for proactive throttling and
/// automatic 429 retry handling.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: Client,
    base_url: Url,
    token: Option<String>,
    rate_limiter: Arc<RateLimiter>,
}

impl GatewayClient {
    /// Creates a client for the gateway at `base_url` with default throttling
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::InvalidUrl` if `base_url` cannot be parsed or
    /// cannot carry path segments.
    pub fn new(base_url: &str) -> Result<Self, GatewayError> {
        let base_url =
            Url::parse(base_url).map_err(|e| GatewayError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::InvalidUrl(format!(
                "{base_url} cannot be used as a base URL"
            )));
        }

        Ok(Self {
            client: Client::new(),
            base_url,
            token: None,
            rate_limiter: Arc::new(RateLimiter::new(RateLimitConfig::default())),
        })
    }

    /// Sets the bearer token sent with every request
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Replaces the rate limiter
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = limiter;
        self
    }

    /// Returns the configured base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns the shared rate limiter
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    /// Builds the URL for `segments` below the base URL
    ///
    /// Each segment is percent-encoded, so cloud IDs containing `/` stay a
    /// single path segment.
    pub fn url(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Creates an authenticated request builder
    ///
    /// # Arguments
    /// * `method` - HTTP method
    /// * `segments` - Path segments appended to the base URL
    /// * `query` - Query parameters
    pub fn request(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<RequestBuilder, GatewayError> {
        let mut builder = self.client.request(method, self.url(segments)?);
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(ref token) = self.token {
            builder = builder.bearer_auth(token);
        }
        Ok(builder)
    }

    /// Executes a request with rate limiting and automatic 429 retry.
    ///
    /// 1. Acquires a token from the rate limiter bucket for `limit_key`.
    /// 2. On HTTP 429, honors `Retry-After`, halves the bucket, and retries
    ///    up to the limiter's `max_retries`.
    /// 3. Maps every other non-success status to a [`GatewayError`].
    ///
    /// # Arguments
    /// * `limit_key` - Rate limiting key, normally the vendor
    pub async fn execute_with_retry(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, String)],
        limit_key: &str,
    ) -> Result<Response, GatewayError> {
        let max_retries = self.rate_limiter.max_retries();
        let mut attempt: u32 = 0;

        loop {
            self.rate_limiter.acquire(limit_key).await;

            let response = self.request(method.clone(), segments, query)?.send().await?;

            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .map(|v| parse_retry_after(v, DEFAULT_RETRY_AFTER))
                    .unwrap_or(DEFAULT_RETRY_AFTER);

                self.rate_limiter.on_throttle(limit_key);

                if attempt >= max_retries {
                    warn!(
                        url = %response.url(),
                        attempts = attempt + 1,
                        "429 retry limit exhausted"
                    );
                    return Err(GatewayError::TooManyRequests { retry_after });
                }

                info!(
                    url = %response.url(),
                    attempt,
                    retry_after_ms = retry_after.as_millis() as u64,
                    "Received 429, backing off"
                );
                attempt += 1;
                tokio::time::sleep(retry_after).await;
                continue;
            }

            let response = check_status(response).await?;
            self.rate_limiter.on_success(limit_key);

            if attempt > 0 {
                debug!(attempt, "Request succeeded after retry");
            }
            return Ok(response);
        }
    }
}

/// Maps a non-success response to the matching [`GatewayError`]
pub(crate) async fn check_status(response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }

    Err(match status {
        StatusCode::UNAUTHORIZED => GatewayError::Unauthorized(url),
        StatusCode::FORBIDDEN => GatewayError::Forbidden(url),
        StatusCode::NOT_FOUND => GatewayError::NotFound(url),
        s if s.is_server_error() => GatewayError::ServerError(format!("{s} from {url}: {body}")),
        s => GatewayError::UnexpectedStatus {
            status: s.as_u16(),
            body,
        },
    })
}
