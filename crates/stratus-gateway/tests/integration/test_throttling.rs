//! HTTP 429 handling

use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use stratus_core::domain::Vendor;
use stratus_core::ports::ICloudGateway;

use crate::common;

#[tokio::test]
async fn test_429_is_retried_after_retry_after() {
    let (server, gateway) = common::setup_gateway(100, 2).await;
    let regions_path = "/api/v1/gcp/accounts/proj/regions";

    Mock::given(method("GET"))
        .and(path(regions_path))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(regions_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [{ "id": "us-central1", "status": "UP" }]
        })))
        .with_priority(2)
        .mount(&server)
        .await;

    let regions = gateway
        .list_regions(&common::account(Vendor::Gcp, "proj"))
        .await
        .expect("retry after 429");
    assert_eq!(regions.len(), 1);

    let requests = server.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 2);
}

#[tokio::test]
async fn test_429_gives_up_after_max_retries() {
    let (server, gateway) = common::setup_gateway(100, 2).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/aws/accounts/111/regions"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .expect(3)
        .mount(&server)
        .await;

    let err = gateway
        .list_regions(&common::account(Vendor::Aws, "111"))
        .await
        .expect_err("429 forever must fail");
    assert!(format!("{err:#}").contains("Too many requests"));
}
