//! End-to-end deployment tests against an in-process platform
//!
//! Tests components: DeploymentEngine, RetryController, Healer
//! Tests APIs: deploy
//! Tests features: pre-flight substitution, known-revision repair, denylist, cancellation

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;

use weaver_blueprint::{parser, Scheduling};
use weaver_deploy::{CancellationToken, DeployError, FailureReason, ModuleRemap, RepairAction, SubmitError};
use weaver_integration_tests::{created, engine_with, rejected, FixedLiveSource, ScriptedPlatform, SHEETS_TO_SLACK_YAML};

fn airtable_swapped() -> Arc<FixedLiveSource> {
    Arc::new(FixedLiveSource::bundled_with_swap(
        "airtable:ActionCreateRecord",
        "airtable:ActionCreateRecordV2",
    ))
}

#[test_log::test(tokio::test)]
async fn test_fixture_deploys_after_one_repair() {
    let platform = Arc::new(ScriptedPlatform::new(vec![
        rejected(json!({
            "code": "IM007",
            "message": "Invalid module version",
            "suberrors": [{ "message": "google-sheets:watchRows is not available in this version" }]
        })),
        created(42),
    ]));
    let live = airtable_swapped();
    let engine = engine_with(live.clone(), platform.clone()).unwrap();
    let document = parser::parse_document(SHEETS_TO_SLACK_YAML).unwrap();

    let result = engine.deploy(&document, &CancellationToken::new()).await.unwrap();

    assert!(result.success);
    assert_eq!(result.attempts, 2);
    assert_eq!(result.scenario["id"], json!(42));
    assert_eq!(
        result.remapped_modules,
        vec![ModuleRemap {
            from: "airtable:ActionCreateRecord".to_string(),
            to: "airtable:ActionCreateRecordV2".to_string(),
        }]
    );
    assert_eq!(
        result.repairs[0].action,
        RepairAction::ForceRevision {
            step_id: "google-sheets:watchRows".to_string(),
            revision: 2,
        }
    );
    assert_eq!(live.fetches(), 1);

    let submissions = platform.submissions();
    assert_eq!(submissions.len(), 2);
    let first = &submissions[0];
    assert_eq!(first.name, "Untitled scenario");
    assert_eq!(first.scheduling, Scheduling::Indefinitely { interval: 3600 });
    let wire = first.blueprint.to_string();
    assert!(!wire.contains("builtin:BasicScheduler"));
    assert!(!wire.contains("\"filter\""));
    assert!(!wire.contains("\"airtable:ActionCreateRecord\""));
    assert_eq!(first.blueprint["flow"][1]["routes"][1]["flow"][0]["module"], json!("airtable:ActionCreateRecordV2"));
}

#[tokio::test]
async fn test_scheduler_missing_from_live_catalog_is_not_remapped() {
    let platform = Arc::new(ScriptedPlatform::new(vec![created(7)]));
    let live = Arc::new(FixedLiveSource::bundled_with_swap(
        "builtin:BasicScheduler",
        "util:SetVariable2",
    ));
    let engine = engine_with(live, platform.clone()).unwrap();
    let document = parser::parse_document(SHEETS_TO_SLACK_YAML).unwrap();

    let result = engine.deploy(&document, &CancellationToken::new()).await.unwrap();

    assert!(result.success);
    assert_eq!(result.attempts, 1);
    assert!(result.remapped_modules.is_empty());
    assert!(result.warnings.iter().all(|w| !w.contains("builtin:BasicScheduler")));
    let wire = platform.submissions()[0].blueprint.to_string();
    assert!(!wire.contains("builtin:BasicScheduler"));
    assert!(!wire.contains("util:SetVariable2"));
}

#[tokio::test]
async fn test_denylisted_rejection_stops_immediately() {
    let platform = Arc::new(ScriptedPlatform::new(vec![rejected(json!({
        "message": "Module datastore:SearchRecord failed validation"
    }))]));
    let engine = engine_with(airtable_swapped(), platform.clone()).unwrap();
    let document = json!({
        "name": "lookup",
        "flow": [
            { "id": 1, "module": "gateway:CustomWebHook", "parameters": { "name": "in" } },
            { "id": 2, "module": "datastore:SearchRecord", "parameters": { "datastore": 17 } }
        ]
    });

    let err = engine.deploy(&document, &CancellationToken::new()).await.unwrap_err();

    match err {
        DeployError::DeploymentFailed { reason, attempts, .. } => {
            assert_eq!(attempts, 1);
            match reason {
                FailureReason::Denylisted {
                    step_id, alternative, ..
                } => {
                    assert_eq!(step_id, "datastore:SearchRecord");
                    assert_eq!(alternative.as_deref(), Some("util:SetVariable2"));
                }
                other => panic!("Expected Denylisted, got {:?}", other),
            }
        }
        other => panic!("Expected DeploymentFailed, got {:?}", other),
    }
    assert_eq!(platform.submissions().len(), 1);
}

#[tokio::test]
async fn test_cancelled_deployment_submits_nothing() {
    let platform = Arc::new(ScriptedPlatform::new(vec![created(1)]));
    let engine = engine_with(airtable_swapped(), platform.clone()).unwrap();
    let document = parser::parse_document(SHEETS_TO_SLACK_YAML).unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = engine.deploy(&document, &cancel).await.unwrap_err();

    assert_eq!(err.error_code(), "ERR_DEPLOY_CANCELLED");
    assert!(platform.submissions().is_empty());
}

#[tokio::test]
async fn test_transport_failure_is_not_retried() {
    let platform = Arc::new(ScriptedPlatform::new(vec![Err(SubmitError::Transport(
        "Connection error: refused".to_string(),
    ))]));
    let engine = engine_with(airtable_swapped(), platform.clone()).unwrap();
    let document = parser::parse_document(SHEETS_TO_SLACK_YAML).unwrap();

    let err = engine.deploy(&document, &CancellationToken::new()).await.unwrap_err();

    assert_eq!(err.error_code(), "ERR_DEPLOY_TRANSPORT");
    assert_eq!(platform.submissions().len(), 1);
}
