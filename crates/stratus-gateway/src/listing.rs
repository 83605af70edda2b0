//! Paginated listings
//!
//! Resource listings are returned one page at a time. Each page carries a
//! `next_page_token`; the listing is complete when the token is absent.
//!
//! ## Response Shape
//!
//! ```json
//! {
//!   "items": [{ "id": "vpc-1", "region": "us-east-1", "...": "..." }],
//!   "next_page_token": "opaque-cursor"
//! }
//! ```
//!
//! A listing is exhaustive or it fails: an error on any page discards the
//! pages already received, so callers never reconcile against a partial view.

use std::collections::HashSet;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::client::GatewayClient;
use crate::GatewayError;

/// One page of a gateway listing
#[derive(Debug, Deserialize)]
pub struct ListPage<T> {
    /// Items on this page
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    /// Cursor for the following page, absent on the last one
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Parameters of a paginated listing
#[derive(Debug, Clone)]
pub struct ListRequest<'a> {
    /// Path segments below the gateway base URL
    pub segments: Vec<&'a str>,
    /// Query parameters sent with every page
    pub query: Vec<(&'a str, String)>,
    /// Items requested per page
    pub page_size: u32,
    /// Rate limiting key
    pub limit_key: &'a str,
}

/// Fetches a single page
///
/// # Errors
///
/// Returns the client's error on transport or status failures and
/// `GatewayError::InvalidResponse` if the body does not parse.
pub async fn get_page<T: DeserializeOwned>(
    client: &GatewayClient,
    request: &ListRequest<'_>,
    page_token: Option<&str>,
) -> Result<ListPage<T>, GatewayError> {
    let mut query = request.query.clone();
    query.push(("limit", request.page_size.to_string()));
    if let Some(token) = page_token {
        query.push(("page_token", token.to_string()));
    }

    let response = client
        .execute_with_retry(Method::GET, &request.segments, &query, request.limit_key)
        .await?;

    response
        .json::<ListPage<T>>()
        .await
        .map_err(|e| GatewayError::InvalidResponse(format!("Failed to parse listing page: {e}")))
}

/// Follows `next_page_token` until the listing is exhausted
///
/// # Errors
///
/// Fails on the first failing page. Also fails with
/// `GatewayError::InvalidResponse` if the server repeats a page token,
/// which would otherwise loop forever.
pub async fn list_all<T: DeserializeOwned>(
    client: &GatewayClient,
    request: &ListRequest<'_>,
) -> Result<Vec<T>, GatewayError> {
    let mut items = Vec::new();
    let mut seen_tokens: HashSet<String> = HashSet::new();
    let mut token: Option<String> = None;
    let mut page_count: u32 = 0;

    loop {
        let page: ListPage<T> = get_page(client, request, token.as_deref()).await?;
        page_count += 1;

        debug!(
            page = page_count,
            items = page.items.len(),
            has_next = page.next_page_token.is_some(),
            "Received listing page"
        );
        items.extend(page.items);

        match page.next_page_token {
            Some(next) if !next.is_empty() => {
                if !seen_tokens.insert(next.clone()) {
                    return Err(GatewayError::InvalidResponse(format!(
                        "Page token '{next}' repeated after {page_count} pages"
                    )));
                }
                token = Some(next);
            }
            _ => break,
        }
    }

    debug!(
        total_items = items.len(),
        pages = page_count,
        "Listing complete"
    );
    Ok(items)
}
