//! Integration tests for the Infoblox address store using wiremock.

use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use provisio_connector_infoblox::{InfobloxConfig, InfobloxStore};
use provisio_core::prelude::*;

// =============================================================================
// Test Helpers
// =============================================================================

const CONTAINER_REF: &str = "networkcontainer/ZG5zLm5ldHdvcmtfY29udGFpbmVy:10.0.0.0/16/prod";
const NETWORK_REF: &str = "network/ZG5zLm5ldHdvcmskMTAuMC4xLjAvMjY:10.0.1.0/26/prod";

fn create_store(server: &MockServer) -> Arc<InfobloxStore> {
    let config = InfobloxConfig::new(format!("{}/wapi/v2.11", server.uri()))
        .with_credentials("svc-ipam", "hunter2")
        .with_timeout_secs(5);
    Arc::new(InfobloxStore::new(config).unwrap())
}

fn prod() -> NetworkView {
    NetworkView::new("prod").unwrap()
}

async fn mount_container(server: &MockServer, utilization: u64) {
    Mock::given(method("GET"))
        .and(path("/wapi/v2.11/networkcontainer"))
        .and(query_param("network", "10.0.0.0/16"))
        .and(query_param("network_view", "prod"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"_ref": CONTAINER_REF, "network": "10.0.0.0/16", "network_view": "prod", "utilization": utilization}
        ])))
        .mount(server)
        .await;
}

fn reserve_intent() -> AddressIntent {
    AddressIntent::Reserve {
        view: prod(),
        supernet: parse_cidr("10.0.0.0/16").unwrap(),
        prefix_length: 26,
        label: "team-x".to_string(),
        site_attribute: "GCP".to_string(),
    }
}

// =============================================================================
// Containers and allocation
// =============================================================================

#[tokio::test]
async fn test_find_container_reports_utilization() {
    let server = MockServer::start().await;
    mount_container(&server, 425).await;

    let store = create_store(&server);
    let info = store
        .find_container(&prod(), parse_cidr("10.0.0.0/16").unwrap())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(info.reference.as_str(), CONTAINER_REF);
    assert_eq!(info.utilization_percent, Some(42.5));
}

#[tokio::test]
async fn test_find_container_absent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wapi/v2.11/networkcontainer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let store = create_store(&server);
    let info = store
        .find_container(&prod(), parse_cidr("10.9.0.0/16").unwrap())
        .await
        .unwrap();
    assert!(info.is_none());
}

#[tokio::test]
async fn test_allocate_calls_next_available_on_container_ref() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/wapi/v2.11/{CONTAINER_REF}")))
        .and(query_param("_function", "next_available_network"))
        .and(body_partial_json(json!({"cidr": 26, "num": 1})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"networks": ["10.0.1.0/26"]})))
        .expect(1)
        .mount(&server)
        .await;

    let store = create_store(&server);
    let parent = ParentBlock::Container {
        reference: BlockRef::new(CONTAINER_REF),
        network: parse_cidr("10.0.0.0/16").unwrap(),
    };
    let proposed = store.allocate_next(&prod(), &parent, 26).await.unwrap();

    assert_eq!(proposed, Some(parse_cidr("10.0.1.0/26").unwrap()));
}

#[tokio::test]
async fn test_allocate_on_literal_queries_supernet_directly() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wapi/v2.11/network"))
        .and(query_param("network_view", "prod"))
        .and(query_param("network", "10.0.0.0/16"))
        .and(query_param("cidr", "26"))
        .and(query_param("num", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["10.0.4.0/26"])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/wapi/v2.11/networkcontainer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let store = create_store(&server);
    let parent = ParentBlock::Network {
        network: parse_cidr("10.0.0.0/16").unwrap(),
    };
    let proposed = store.allocate_next(&prod(), &parent, 26).await.unwrap();

    assert_eq!(proposed, Some(parse_cidr("10.0.4.0/26").unwrap()));
}

#[tokio::test]
async fn test_allocate_on_literal_empty_answer_is_none() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wapi/v2.11/network"))
        .and(query_param("cidr", "26"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let store = create_store(&server);
    let parent = ParentBlock::Network {
        network: parse_cidr("10.0.0.0/16").unwrap(),
    };
    assert_eq!(store.allocate_next(&prod(), &parent, 26).await.unwrap(), None);
}

#[tokio::test]
async fn test_exhausted_container_is_no_capacity_without_create() {
    let server = MockServer::start().await;
    mount_container(&server, 1000).await;

    Mock::given(method("POST"))
        .and(path(format!("/wapi/v2.11/{CONTAINER_REF}")))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "Error": "AdmConProtoError: Cannot find 1 available network(s) in network container 10.0.0.0/16",
            "code": "Client.Ibap.Proto",
            "text": "Cannot find 1 available network(s) in network container 10.0.0.0/16"
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/wapi/v2.11/network"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let store = create_store(&server);
    let diff = AddressDiff::new(store, reserve_intent(), AddressSettings::default()).unwrap();
    let err = ReconcileWorkflow::new(diff, Mode::Apply).run().await.unwrap_err();

    assert!(matches!(err, ReconcileError::NoCapacity { prefix_length: 26, .. }));
}

// =============================================================================
// Create
// =============================================================================

#[tokio::test]
async fn test_reserve_apply_creates_network_with_site_attribute() {
    let server = MockServer::start().await;
    mount_container(&server, 120).await;

    Mock::given(method("POST"))
        .and(path(format!("/wapi/v2.11/{CONTAINER_REF}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"networks": ["10.0.1.0/26"]})))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/wapi/v2.11/network"))
        .and(body_partial_json(json!({
            "network": "10.0.1.0/26",
            "network_view": "prod",
            "comment": "team-x",
            "extattrs": {"Site Code": {"value": "GCP"}}
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "_ref": NETWORK_REF,
            "network": "10.0.1.0/26",
            "network_view": "prod",
            "comment": "team-x",
            "extattrs": {"Site Code": {"value": "GCP"}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = create_store(&server);
    let diff = AddressDiff::new(store, reserve_intent(), AddressSettings::default()).unwrap();
    let outcome = ReconcileWorkflow::new(diff, Mode::Apply).run().await.unwrap();

    let Outcome::Applied { result: AddressApplied::Reserved { block }, .. } = outcome else {
        panic!("expected a reserved block");
    };
    assert_eq!(block.network, parse_cidr("10.0.1.0/26").unwrap());
    assert_eq!(block.reference, Some(BlockRef::new(NETWORK_REF)));
}

#[tokio::test]
async fn test_reserve_dry_run_makes_no_create_call() {
    let server = MockServer::start().await;
    mount_container(&server, 120).await;

    Mock::given(method("POST"))
        .and(path(format!("/wapi/v2.11/{CONTAINER_REF}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"networks": ["10.0.1.0/26"]})))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/wapi/v2.11/network"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let store = create_store(&server);
    let diff = AddressDiff::new(store, reserve_intent(), AddressSettings::default()).unwrap();
    let outcome = ReconcileWorkflow::new(diff, Mode::DryRun).run().await.unwrap();

    let Outcome::Planned { plan: AddressPlan::Reserve { proposed, utilization_percent, .. } } = outcome
    else {
        panic!("expected a planned reservation");
    };
    assert_eq!(proposed.network, parse_cidr("10.0.1.0/26").unwrap());
    assert_eq!(utilization_percent, Some(12.0));
}

#[tokio::test]
async fn test_create_conflict_is_already_exists() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/wapi/v2.11/network"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "Error": "AdmConDataError: None (IBDataConflictError: IB.Data.Conflict:The network 10.0.1.0/26 already exists.  Select another network.)",
            "code": "Client.Ibap.Data.Conflict",
            "text": "The network 10.0.1.0/26 already exists.  Select another network."
        })))
        .mount(&server)
        .await;

    let store = create_store(&server);
    let err = store
        .create_network(&NewReservation {
            view: prod(),
            network: parse_cidr("10.0.1.0/26").unwrap(),
            label: "team-x".to_string(),
            site_attribute: "GCP".to_string(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ReconcileError::AlreadyExists { .. }));
    assert!(err.to_string().contains("10.0.1.0/26 already exists"));
}

// =============================================================================
// Query and delete
// =============================================================================

#[tokio::test]
async fn test_release_deletes_exact_match() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wapi/v2.11/network"))
        .and(query_param("network_view", "prod"))
        .and(query_param("network", "10.0.1.0/26"))
        .and(query_param("comment", "team-x"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"_ref": NETWORK_REF, "network": "10.0.1.0/26", "network_view": "prod", "comment": "team-x"}
        ])))
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path(format!("/wapi/v2.11/{NETWORK_REF}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(NETWORK_REF)))
        .expect(1)
        .mount(&server)
        .await;

    let store = create_store(&server);
    let diff = AddressDiff::new(
        store,
        AddressIntent::Release {
            view: prod(),
            network: parse_cidr("10.0.1.0/26").unwrap(),
            label: "team-x".to_string(),
        },
        AddressSettings::default(),
    )
    .unwrap();
    let outcome = ReconcileWorkflow::new(diff, Mode::Apply).run().await.unwrap();

    let Outcome::Applied { result: AddressApplied::Released { outcome, .. }, .. } = outcome else {
        panic!("expected a released block");
    };
    assert_eq!(outcome, DeleteOutcome::Deleted);
}

#[tokio::test]
async fn test_release_with_two_matches_is_ambiguous() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wapi/v2.11/network"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"_ref": NETWORK_REF, "network": "10.0.1.0/26", "network_view": "prod", "comment": "team-x"},
            {"_ref": "network/other:10.0.1.0/26/prod", "network": "10.0.1.0/26", "network_view": "prod", "comment": "team-x"}
        ])))
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let store = create_store(&server);
    let diff = AddressDiff::new(
        store,
        AddressIntent::Release {
            view: prod(),
            network: parse_cidr("10.0.1.0/26").unwrap(),
            label: "team-x".to_string(),
        },
        AddressSettings::default(),
    )
    .unwrap();
    let err = ReconcileWorkflow::new(diff, Mode::Apply).run().await.unwrap_err();

    assert!(matches!(err, ReconcileError::Ambiguous { count: 2, .. }));
}

#[tokio::test]
async fn test_delete_missing_object_is_not_found_outcome() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path(format!("/wapi/v2.11/{NETWORK_REF}")))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "Error": "AdmConDataNotFoundError: Reference not found",
            "code": "Client.Ibap.Data.NotFound",
            "text": "Reference not found"
        })))
        .mount(&server)
        .await;

    let store = create_store(&server);
    let outcome = store.delete_network(&BlockRef::new(NETWORK_REF)).await.unwrap();
    assert_eq!(outcome, DeleteOutcome::NotFound);
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_server_error_keeps_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wapi/v2.11/network"))
        .respond_with(ResponseTemplate::new(502).set_body_string("grid master unreachable"))
        .mount(&server)
        .await;

    let store = create_store(&server);
    let err = store
        .query_networks(&NetworkQuery::exact(&prod(), parse_cidr("10.0.1.0/26").unwrap(), "team-x"))
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "STORE_UNAVAILABLE");
    assert!(err.to_string().contains("grid master unreachable"));
}

#[tokio::test]
async fn test_unauthorized_is_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wapi/v2.11/networkcontainer"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Authorization Required"))
        .mount(&server)
        .await;

    let store = create_store(&server);
    let err = store
        .find_container(&prod(), parse_cidr("10.0.0.0/16").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, ReconcileError::StoreUnavailable { .. }));
}

#[tokio::test]
async fn test_non_json_body_is_malformed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wapi/v2.11/network"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let store = create_store(&server);
    let err = store
        .query_networks(&NetworkQuery::exact(&prod(), parse_cidr("10.0.1.0/26").unwrap(), "team-x"))
        .await
        .unwrap_err();

    assert!(matches!(err, ReconcileError::MalformedResponse { ref raw, .. } if raw == "<html>login</html>"));
}

#[test]
fn test_new_rejects_missing_credentials() {
    let err = InfobloxStore::new(InfobloxConfig::new("https://ib.example.com/wapi/v2.11")).unwrap_err();
    assert_eq!(err.error_code(), "INVALID_CONFIG");
}
