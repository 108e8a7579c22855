//! Weaver Integration Tests
//!
//! Shared fixtures and in-process fakes for the end-to-end tests: a live
//! catalog source with a fixed step list and a platform that answers from a
//! script while recording what it was sent.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use weaver_blueprint::Registries;
use weaver_catalog::{CatalogResult, LiveCatalogCache, LiveCatalogSource, StaticCatalog, StepCatalog};
use weaver_deploy::{DeploymentEngine, PlatformRejection, ScenarioPlatform, ScenarioSubmission, SubmitError};

/// Hourly sheet watcher with a filtered Slack route and an Airtable route
pub const SHEETS_TO_SLACK_YAML: &str = include_str!("fixtures/sheets_to_slack.yaml");

/// Live catalog source returning a fixed list and counting fetches
#[derive(Debug, Default)]
pub struct FixedLiveSource {
    ids: Vec<String>,
    fetches: AtomicUsize,
}

impl FixedLiveSource {
    pub fn new(ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Every bundled step id, with `replaced` swapped for `replacement`
    pub fn bundled_with_swap(replaced: &str, replacement: &str) -> Self {
        let mut ids: Vec<String> = StaticCatalog::bundled()
            .map(|catalog| catalog.step_ids().into_iter().collect())
            .unwrap_or_default();
        ids.retain(|id| id != replaced);
        ids.push(replacement.to_string());
        Self::new(ids)
    }

    /// Number of fetches served
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LiveCatalogSource for FixedLiveSource {
    async fn fetch_step_ids(&self) -> CatalogResult<Vec<String>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.ids.clone())
    }
}

/// Platform answering from a script; the last answer repeats
#[derive(Debug)]
pub struct ScriptedPlatform {
    answers: Mutex<VecDeque<Result<Value, SubmitError>>>,
    submissions: Mutex<Vec<ScenarioSubmission>>,
}

impl ScriptedPlatform {
    pub fn new(answers: Vec<Result<Value, SubmitError>>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            submissions: Mutex::new(Vec::new()),
        }
    }

    /// Everything submitted so far, in order
    pub fn submissions(&self) -> Vec<ScenarioSubmission> {
        self.submissions.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ScenarioPlatform for ScriptedPlatform {
    async fn create_scenario(&self, submission: &ScenarioSubmission) -> Result<Value, SubmitError> {
        if let Ok(mut submissions) = self.submissions.lock() {
            submissions.push(submission.clone());
        }
        let mut answers = self
            .answers
            .lock()
            .map_err(|_| SubmitError::Transport("script poisoned".to_string()))?;
        let answer = if answers.len() > 1 { answers.pop_front() } else { answers.front().cloned() };
        answer.unwrap_or_else(|| Err(SubmitError::Transport("script is empty".to_string())))
    }
}

/// A 400 rejection built from a JSON body
pub fn rejected(body: Value) -> Result<Value, SubmitError> {
    Err(SubmitError::Rejected(PlatformRejection::from_response(400, &body.to_string())))
}

/// A created scenario
pub fn created(id: u64) -> Result<Value, SubmitError> {
    Ok(json!({ "scenario": { "id": id, "isinvalid": false } }))
}

/// Engine over the bundled catalog and registries with in-process fakes
pub fn engine_with(live: Arc<FixedLiveSource>, platform: Arc<ScriptedPlatform>) -> anyhow::Result<DeploymentEngine> {
    let engine = DeploymentEngine::new(Arc::new(StaticCatalog::bundled()?), Arc::new(Registries::bundled()?))
        .with_live_catalog(Arc::new(LiveCatalogCache::new(live, Duration::from_secs(300))))
        .with_platform(platform);
    Ok(engine)
}
