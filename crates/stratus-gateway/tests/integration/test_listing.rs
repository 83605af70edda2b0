//! Listing tests: regions, resource pagination and failure propagation

use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, ResponseTemplate};

use stratus_core::domain::{ResourceType, Vendor};
use stratus_core::ports::ICloudGateway;

use crate::common;

#[tokio::test]
async fn test_list_regions_sends_bearer_and_parses_fields() {
    let (server, gateway) = common::setup_gateway(100, 0).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/aws/accounts/111/regions"))
        .and(header("authorization", format!("Bearer {}", common::TOKEN).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [
                { "id": "us-east-1", "opt_in_status": "opt-in-not-required" },
                { "id": "af-south-1", "opt_in_status": "not-opted-in" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let regions = gateway
        .list_regions(&common::account(Vendor::Aws, "111"))
        .await
        .expect("list regions");

    assert_eq!(regions.len(), 2);
    assert_eq!(regions[0].id, "us-east-1");
    assert_eq!(regions[1].field_str("opt_in_status"), Some("not-opted-in"));
}

#[tokio::test]
async fn test_list_resources_follows_page_tokens() {
    let (server, gateway) = common::setup_gateway(2, 0).await;
    let resource_path = "/api/v1/tcloud/accounts/acct-1/resources/vpc";

    Mock::given(method("GET"))
        .and(path(resource_path))
        .and(query_param("region", "ap-guangzhou"))
        .and(query_param("limit", "2"))
        .and(query_param_is_missing("page_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [{ "id": "vpc-1", "CidrBlock": "10.0.0.0/16" }, { "id": "vpc-2" }],
            "next_page_token": "p2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(resource_path))
        .and(query_param("page_token", "p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [{ "id": "vpc-3", "region": "ap-shanghai" }],
            "next_page_token": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let items = gateway
        .list_resources(
            &common::account(Vendor::TCloud, "acct-1"),
            "ap-guangzhou",
            ResourceType::Vpc,
        )
        .await
        .expect("list resources");

    let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["vpc-1", "vpc-2", "vpc-3"]);
    assert_eq!(items[0].field_str("CidrBlock"), Some("10.0.0.0/16"));
    // Missing regions are filled from the request; explicit ones are kept
    assert_eq!(items[0].region.as_deref(), Some("ap-guangzhou"));
    assert_eq!(items[2].region.as_deref(), Some("ap-shanghai"));
}

#[tokio::test]
async fn test_failed_page_fails_whole_listing() {
    let (server, gateway) = common::setup_gateway(1, 0).await;
    let resource_path = "/api/v1/gcp/accounts/proj-1/resources/disk";

    Mock::given(method("GET"))
        .and(path(resource_path))
        .and(query_param_is_missing("page_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [{ "id": "disk-1" }],
            "next_page_token": "p2"
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(resource_path))
        .and(query_param("page_token", "p2"))
        .respond_with(ResponseTemplate::new(503).set_body_string("backend unavailable"))
        .mount(&server)
        .await;

    let result = gateway
        .list_resources(&common::account(Vendor::Gcp, "proj-1"), "us-central1", ResourceType::Disk)
        .await;

    let err = result.expect_err("partial listing must fail");
    assert!(format!("{err:#}").contains("Server error"));
}

#[tokio::test]
async fn test_repeated_page_token_is_rejected() {
    let (server, gateway) = common::setup_gateway(1, 0).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/azure/accounts/sub-1/resources/eip"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [{ "id": "ip-1" }],
            "next_page_token": "same"
        })))
        .mount(&server)
        .await;

    let result = gateway
        .list_resources(&common::account(Vendor::Azure, "sub-1"), "", ResourceType::Eip)
        .await;

    let err = result.expect_err("looping pagination must fail");
    assert!(format!("{err:#}").contains("repeated"));
}

#[tokio::test]
async fn test_unauthorized_is_not_retried() {
    let (server, gateway) = common::setup_gateway(100, 3).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/huawei/accounts/hw-1/regions"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let err = gateway
        .list_regions(&common::account(Vendor::HuaWei, "hw-1"))
        .await
        .expect_err("401 must fail");
    assert!(format!("{err:#}").contains("Unauthorized"));
}
