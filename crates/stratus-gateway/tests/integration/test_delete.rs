//! Deletion tests

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use stratus_core::domain::{CloudNativeId, ResourceType, Vendor};
use stratus_core::ports::ICloudGateway;

use crate::common;

#[tokio::test]
async fn test_delete_sends_region_and_succeeds() {
    let (server, gateway) = common::setup_gateway(100, 0).await;

    Mock::given(method("DELETE"))
        .and(path("/api/v1/tcloud/accounts/acct-1/resources/cvm/ins-001"))
        .and(query_param("region", "ap-guangzhou"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    gateway
        .delete_resource(
            &common::account(Vendor::TCloud, "acct-1"),
            "ap-guangzhou",
            ResourceType::Cvm,
            &CloudNativeId::new("ins-001").unwrap(),
        )
        .await
        .expect("delete");
}

#[tokio::test]
async fn test_delete_of_missing_resource_is_success() {
    let (server, gateway) = common::setup_gateway(100, 0).await;

    Mock::given(method("DELETE"))
        .and(path("/api/v1/aws/accounts/111/resources/eip/eipalloc-1"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    gateway
        .delete_resource(
            &common::account(Vendor::Aws, "111"),
            "us-east-1",
            ResourceType::Eip,
            &CloudNativeId::new("eipalloc-1").unwrap(),
        )
        .await
        .expect("404 counts as deleted");
}

#[tokio::test]
async fn test_delete_server_error_is_reported() {
    let (server, gateway) = common::setup_gateway(100, 0).await;

    Mock::given(method("DELETE"))
        .and(path("/api/v1/gcp/accounts/proj/resources/disk/d-1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("quota"))
        .mount(&server)
        .await;

    let err = gateway
        .delete_resource(
            &common::account(Vendor::Gcp, "proj"),
            "us-central1",
            ResourceType::Disk,
            &CloudNativeId::new("d-1").unwrap(),
        )
        .await
        .expect_err("500 must fail");
    assert!(format!("{err:#}").contains("quota"));
}
