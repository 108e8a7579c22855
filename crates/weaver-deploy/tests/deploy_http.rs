use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use weaver_blueprint::Registries;
use weaver_catalog::StaticCatalog;
use weaver_deploy::{
    CancellationToken, DeployError, DeploymentEngine, FailureReason, HttpPlatformConfig, HttpScenarioPlatform,
    ModuleRemap, WeaverConfig,
};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper function to start a mock platform and an engine pointing to it
async fn setup_engine(max_attempts: u32) -> (MockServer, DeploymentEngine) {
    let mock_server = MockServer::start().await;
    let config = WeaverConfig {
        api_url: Some(mock_server.uri()),
        api_token: Some("secret".to_string()),
        team_id: Some("7".to_string()),
        request_timeout_secs: 5,
        max_deploy_attempts: max_attempts,
        ..Default::default()
    };
    let engine = DeploymentEngine::from_config(&config).unwrap();
    (mock_server, engine)
}

async fn mount_live_catalog(server: &MockServer, ids: &[&str]) {
    Mock::given(method("GET"))
        .and(path("/modules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "modules": ids })))
        .mount(server)
        .await;
}

fn webhook_to_slack() -> Value {
    json!({
        "name": "notify",
        "flow": [
            { "id": 1, "module": "gateway:CustomWebHook", "parameters": { "name": "incoming" } },
            { "id": 2, "module": "slack:ActionPostMessage", "version": 1,
              "parameters": { "channel": "C1" }, "mapper": { "text": "{{1.body}}" } }
        ]
    })
}

#[test_log::test(tokio::test)]
async fn test_deploy_succeeds_first_time() {
    let (server, engine) = setup_engine(5).await;

    Mock::given(method("POST"))
        .and(path("/scenarios"))
        .and(header("Authorization", "Token secret"))
        .and(query_param("confirmed", "true"))
        .and(body_string_contains("\"teamId\":7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "scenario": { "id": 1001, "name": "notify", "isinvalid": true }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = engine.deploy(&webhook_to_slack(), &CancellationToken::new()).await.unwrap();

    assert!(result.success);
    assert_eq!(result.attempts, 1);
    assert_eq!(result.scenario["id"], json!(1001));
    assert!(result.remapped_modules.is_empty());
    assert!(result.warnings.iter().any(|w| w.contains("flagged it as invalid")));
    // The pinned slack revision disagrees with the registry
    assert!(result.warnings.iter().any(|w| w.contains("pins version 1")));
}

#[tokio::test]
async fn test_healed_blueprint_is_submitted() {
    let (server, engine) = setup_engine(5).await;

    // Registry revision 4 replaces the pinned 1 before the first submission
    Mock::given(method("POST"))
        .and(path("/scenarios"))
        .and(body_string_contains(r#"\"version\":4"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "scenario": { "id": 5 } })))
        .expect(1)
        .mount(&server)
        .await;

    let result = engine.deploy(&webhook_to_slack(), &CancellationToken::new()).await.unwrap();
    assert_eq!(result.scenario, json!({ "id": 5 }));
}

#[tokio::test]
async fn test_denylisted_module_fails_after_one_attempt() {
    let (server, engine) = setup_engine(5).await;

    Mock::given(method("POST"))
        .and(path("/scenarios"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": "IM005",
            "message": "Module not found: openai-gpt-3:CreateCompletion"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let blueprint = json!({
        "flow": [
            { "id": 1, "module": "gateway:CustomWebHook", "parameters": { "name": "in" } },
            { "id": 2, "module": "openai-gpt-3:CreateCompletion",
              "parameters": { "model": "gpt-4" }, "mapper": { "messages": "{{1.text}}" } }
        ]
    });

    match engine.deploy(&blueprint, &CancellationToken::new()).await.unwrap_err() {
        DeployError::DeploymentFailed { reason, attempts, history } => {
            assert_eq!(attempts, 1);
            assert!(history.is_empty());
            assert!(matches!(reason, FailureReason::Denylisted { .. }));
        }
        other => panic!("Expected DeploymentFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_rejection_repaired_then_accepted() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/scenarios"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": "IM007",
            "message": "Invalid module",
            "detail": "crm:CreateDeal version 3 is not supported"
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/scenarios"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "scenario": { "id": 8 } })))
        .expect(1)
        .mount(&server)
        .await;

    let catalog_json = json!([
        { "id": "gateway:CustomWebHook", "name": "Webhook", "app": "gateway", "kind": "trigger" },
        { "id": "crm:CreateDeal", "name": "Create a deal", "app": "crm", "kind": "action" }
    ]);
    let catalog = StaticCatalog::from_json_str(&catalog_json.to_string()).unwrap();
    let engine = engine_with_catalog(catalog, &server);

    let blueprint = json!({
        "flow": [
            { "id": 1, "module": "gateway:CustomWebHook" },
            { "id": 2, "module": "crm:CreateDeal", "version": 3 }
        ]
    });

    let result = engine.deploy(&blueprint, &CancellationToken::new()).await.unwrap();
    assert_eq!(result.attempts, 2);
    assert_eq!(result.repairs.len(), 1);
    assert!(result.repairs[0].to_string().contains("lowered 'crm:CreateDeal' from version 3 to 2"));
}

/// Engine over a custom catalog and empty registries, without a live catalog
fn engine_with_catalog(catalog: StaticCatalog, server: &MockServer) -> DeploymentEngine {
    let platform = HttpScenarioPlatform::new(HttpPlatformConfig {
        api_url: server.uri(),
        api_token: "secret".to_string(),
        team_id: None,
        timeout_secs: 5,
    })
    .unwrap();
    DeploymentEngine::new(Arc::new(catalog), Arc::new(Registries::default())).with_platform(Arc::new(platform))
}

#[tokio::test]
async fn test_live_substitute_applied_before_submission() {
    let (server, engine) = setup_engine(5).await;
    mount_live_catalog(
        &server,
        &["gateway:CustomWebHook", "airtable:ActionCreateRecordV2"],
    )
    .await;

    Mock::given(method("POST"))
        .and(path("/scenarios"))
        .and(body_string_contains("airtable:ActionCreateRecordV2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "scenario": { "id": 3 } })))
        .expect(1)
        .mount(&server)
        .await;

    let blueprint = json!({
        "flow": [
            { "id": 1, "module": "gateway:CustomWebHook", "parameters": { "name": "in" } },
            { "id": 2, "module": "airtable:ActionCreateRecord", "parameters": { "base": "app1", "table": "t1" } }
        ]
    });

    let result = engine.deploy(&blueprint, &CancellationToken::new()).await.unwrap();
    assert_eq!(
        result.remapped_modules,
        vec![ModuleRemap {
            from: "airtable:ActionCreateRecord".to_string(),
            to: "airtable:ActionCreateRecordV2".to_string()
        }]
    );
}

#[tokio::test]
async fn test_incompatible_module_without_substitute_is_not_submitted() {
    let (server, engine) = setup_engine(5).await;
    mount_live_catalog(&server, &["gateway:CustomWebHook"]).await;

    Mock::given(method("POST"))
        .and(path("/scenarios"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = engine.deploy(&webhook_to_slack(), &CancellationToken::new()).await.unwrap_err();
    match err {
        DeployError::IncompatibleModules(modules) => assert_eq!(modules, vec!["slack:ActionPostMessage"]),
        other => panic!("Expected IncompatibleModules, got {:?}", other),
    }
}

#[tokio::test]
async fn test_invalid_blueprint_is_not_submitted() {
    let (server, engine) = setup_engine(5).await;

    Mock::given(method("POST"))
        .and(path("/scenarios"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = engine
        .deploy(&json!({ "flow": [] }), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "ERR_DEPLOY_INVALID_BLUEPRINT");
    assert!(err.to_string().contains("Flow array is empty."));
}

#[tokio::test]
async fn test_exhausted_attempts_report_history() {
    let (server, engine) = setup_engine(2).await;

    Mock::given(method("POST"))
        .and(path("/scenarios"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "message": "Module rejected",
            "module": "slack:ActionPostMessage"
        })))
        .expect(2)
        .mount(&server)
        .await;

    let err = engine.deploy(&webhook_to_slack(), &CancellationToken::new()).await.unwrap_err();
    let text = err.to_string();

    assert_eq!(err.error_code(), "ERR_DEPLOY_ATTEMPTS_EXHAUSTED");
    assert!(text.starts_with("Deployment failed after 2 attempt(s)"));
    assert!(text.contains("pinned 'slack:ActionPostMessage' to known version 4"));
}

#[tokio::test]
async fn test_unauthorized_is_terminal() {
    let (server, engine) = setup_engine(5).await;

    Mock::given(method("POST"))
        .and(path("/scenarios"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "Invalid token" })))
        .expect(1)
        .mount(&server)
        .await;

    let err = engine.deploy(&webhook_to_slack(), &CancellationToken::new()).await.unwrap_err();
    assert_eq!(err.error_code(), "ERR_DEPLOY_UNAUTHORIZED");
}
