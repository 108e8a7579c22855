use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use weaver_catalog::{CatalogError, LiveCatalogCache, LiveCatalogSource, RemoteLiveCatalog, RemoteLiveCatalogConfig};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper function to start a mock server and create a client pointing to it
async fn setup_test_client(team_id: Option<&str>) -> (MockServer, RemoteLiveCatalog) {
    let mock_server = MockServer::start().await;
    let client = RemoteLiveCatalog::new(RemoteLiveCatalogConfig {
        url: format!("{}/api/v2/modules", mock_server.uri()),
        api_token: Some("secret".to_string()),
        team_id: team_id.map(str::to_string),
        timeout_secs: 5,
    })
    .unwrap();
    (mock_server, client)
}

#[tokio::test]
async fn test_fetch_step_ids_success() {
    let (mock_server, client) = setup_test_client(Some("42")).await;

    Mock::given(method("GET"))
        .and(path("/api/v2/modules"))
        .and(header("Authorization", "Token secret"))
        .and(query_param("teamId", "42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "modules": [
                { "id": "slack:ActionPostMessage" },
                { "id": "json:ParseJSON" }
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let ids = client.fetch_step_ids().await.unwrap();
    assert_eq!(ids, vec!["slack:ActionPostMessage".to_string(), "json:ParseJSON".to_string()]);
}

#[tokio::test]
async fn test_fetch_step_ids_unauthorized() {
    let (mock_server, client) = setup_test_client(None).await;

    Mock::given(method("GET"))
        .and(path("/api/v2/modules"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid token"))
        .mount(&mock_server)
        .await;

    match client.fetch_step_ids().await.unwrap_err() {
        CatalogError::UnexpectedResponse { status, body } => {
            assert_eq!(status, 401);
            assert_eq!(body, "invalid token");
        }
        other => panic!("Expected UnexpectedResponse, got {:?}", other),
    }
}

#[tokio::test]
async fn test_cache_over_failing_endpoint_reports_unknown() {
    let (mock_server, client) = setup_test_client(None).await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let cache = LiveCatalogCache::new(Arc::new(client), Duration::from_secs(60));
    assert!(cache.get_or_refresh().await.is_none());
}

#[tokio::test]
async fn test_cache_fetches_once_for_concurrent_readers() {
    let (mock_server, client) = setup_test_client(None).await;

    Mock::given(method("GET"))
        .and(path("/api/v2/modules"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!(["http:ActionSendData"]))
                .set_delay(Duration::from_millis(50)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let cache = Arc::new(LiveCatalogCache::new(Arc::new(client), Duration::from_secs(60)));
    let (a, b) = tokio::join!(cache.get_or_refresh(), cache.get_or_refresh());

    assert!(a.unwrap().contains("http:ActionSendData"));
    assert!(b.unwrap().contains("http:ActionSendData"));
}
