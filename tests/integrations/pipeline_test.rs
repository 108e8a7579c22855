//! End-to-end tests for validation, healing and resolution through the engine
//!
//! Tests components: DeploymentEngine, LiveCatalogCache, Healer, CompatibilityResolver
//! Tests APIs: validate, heal, resolve, live_snapshot

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;

use weaver_blueprint::{parser, MatchStage, Scheduling};
use weaver_integration_tests::{engine_with, FixedLiveSource, ScriptedPlatform, SHEETS_TO_SLACK_YAML};

fn fixture() -> serde_json::Value {
    parser::parse_document(SHEETS_TO_SLACK_YAML).unwrap()
}

#[tokio::test]
async fn test_yaml_fixture_is_valid_without_live_check() {
    let live = Arc::new(FixedLiveSource::bundled_with_swap("airtable:ActionCreateRecord", "airtable:ActionCreateRecordV2"));
    let engine = engine_with(live.clone(), Arc::new(ScriptedPlatform::new(vec![]))).unwrap();

    let report = engine.validate(&fixture(), false).await;

    assert!(report.valid, "unexpected errors: {:?}", report.errors);
    assert!(!report.account_compatibility.live_catalog_checked);
    assert_eq!(live.fetches(), 0);
    // The scheduler and the Airtable step carry no id
    assert_eq!(report.warnings.iter().filter(|w| w.contains("has no id")).count(), 2);
    assert!(report
        .warnings
        .iter()
        .any(|w| w.contains("'google-sheets:watchRows' pins version 1 but version 2")));
}

#[tokio::test]
async fn test_live_check_reports_substitute_with_path() {
    let live = Arc::new(FixedLiveSource::bundled_with_swap("airtable:ActionCreateRecord", "airtable:ActionCreateRecordV2"));
    let engine = engine_with(live.clone(), Arc::new(ScriptedPlatform::new(vec![]))).unwrap();

    let report = engine.validate(&fixture(), true).await;

    assert!(report.valid);
    assert!(report.account_compatibility.live_catalog_checked);
    let incompatible = &report.account_compatibility.incompatible_modules;
    assert_eq!(incompatible.len(), 1);
    assert_eq!(incompatible[0].module, "airtable:ActionCreateRecord");
    assert_eq!(incompatible[0].suggestion.as_deref(), Some("airtable:ActionCreateRecordV2"));
    assert_eq!(incompatible[0].paths, vec!["Flow[2].routes[1][0]"]);
}

#[tokio::test]
async fn test_live_check_ignores_schedulers() {
    let live = Arc::new(FixedLiveSource::bundled_with_swap("builtin:BasicScheduler", "util:SetVariable2"));
    let engine = engine_with(live, Arc::new(ScriptedPlatform::new(vec![]))).unwrap();

    let report = engine.validate(&fixture(), true).await;

    assert!(report.valid, "unexpected errors: {:?}", report.errors);
    assert!(report.account_compatibility.live_catalog_checked);
    assert!(report.account_compatibility.incompatible_modules.is_empty());
}

#[tokio::test]
async fn test_snapshot_is_shared_across_operations() {
    let live = Arc::new(FixedLiveSource::new(["slack:ActionPostMessage", "gateway:CustomWebHook"]));
    let engine = engine_with(live.clone(), Arc::new(ScriptedPlatform::new(vec![]))).unwrap();

    engine.validate(&fixture(), true).await;
    engine.resolve("slack:ActionPostMessage", true).await;
    engine.resolve("slack:actionpostmessage", true).await;

    assert_eq!(live.fetches(), 1);
}

#[tokio::test]
async fn test_heal_fixture() {
    let live = Arc::new(FixedLiveSource::new(Vec::<String>::new()));
    let engine = engine_with(live, Arc::new(ScriptedPlatform::new(vec![]))).unwrap();
    let blueprint = parser::parse_blueprint(&fixture()).unwrap();

    let (healed, report) = engine.heal(&blueprint);

    assert_eq!(healed.name, "Untitled scenario");
    assert_eq!(healed.scheduling, Scheduling::Indefinitely { interval: 3600 });
    assert_eq!(report.schedulers_removed, 1);
    assert_eq!(report.filters_stripped, 1);
    assert_eq!(report.ordinals_assigned, 1);
    assert_eq!(
        report.versions.injected,
        vec!["google-sheets:watchRows", "builtin:BasicRouter", "slack:ActionPostMessage"]
    );
    assert!(report.versions.stripped.is_empty());

    let wire = healed.to_value();
    assert_eq!(wire["flow"][0]["module"], json!("google-sheets:watchRows"));
    assert_eq!(wire["flow"][0]["version"], json!(2));
    assert_eq!(wire["flow"][1]["routes"][0].get("filter"), None);
    assert_eq!(wire["flow"][1]["routes"][0]["flow"][0]["version"], json!(4));
    assert_eq!(wire["flow"][1]["routes"][1]["flow"][0]["id"], json!(5));
    assert_eq!(wire["metadata"]["scenario"]["maxErrors"], json!(3));
    assert_eq!(wire["flow"][0]["metadata"]["designer"], json!({ "x": 0, "y": 0 }));

    // Healing a healed blueprint changes nothing
    let (again, _) = engine.heal(&healed);
    assert_eq!(again, healed);
}

#[tokio::test]
async fn test_resolve_against_live_and_static_catalogs() {
    let live = Arc::new(FixedLiveSource::new(["airtable:ActionCreateRecordV2", "slack:ActionPostMessage"]));
    let engine = engine_with(live, Arc::new(ScriptedPlatform::new(vec![]))).unwrap();

    let live_resolution = engine.resolve("airtable:ActionCreateRecord", true).await;
    assert!(!live_resolution.available);
    assert_eq!(live_resolution.suggestion.as_deref(), Some("airtable:ActionCreateRecordV2"));
    assert!(matches!(live_resolution.matched_by, Some(MatchStage::TokenOverlap { .. })));

    let static_resolution = engine.resolve("airtable:ActionCreateRecord", false).await;
    assert!(static_resolution.available);
    assert_eq!(static_resolution.matched_by, Some(MatchStage::Exact));
}
