//! Scenario platform integration
//!
//! This module contains the deployment endpoint client and the submission type.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt::Debug;
use thiserror::Error;

use weaver_blueprint::{Blueprint, Scheduling};

use crate::rejection::PlatformRejection;

pub mod http;

pub use http::{HttpPlatformConfig, HttpScenarioPlatform};

/// What gets submitted for one attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioSubmission {
    /// Scenario name
    pub name: String,
    /// Blueprint wire value
    pub blueprint: Value,
    /// Scenario scheduling
    pub scheduling: Scheduling,
}

impl ScenarioSubmission {
    /// Snapshot a blueprint for submission
    pub fn from_blueprint(blueprint: &Blueprint) -> Self {
        Self {
            name: blueprint.name.clone(),
            blueprint: blueprint.to_value(),
            scheduling: blueprint.scheduling.clone(),
        }
    }

    /// Request body; blueprint and scheduling travel as serialized strings
    pub fn request_body(&self, team_id: Option<&str>) -> Value {
        let scheduling = serde_json::to_string(&self.scheduling).unwrap_or_else(|_| r#"{"type":"on-demand"}"#.to_string());
        let mut body = json!({
            "name": self.name,
            "blueprint": self.blueprint.to_string(),
            "scheduling": scheduling,
        });
        if let (Some(team_id), Some(map)) = (team_id, body.as_object_mut()) {
            let team = team_id
                .parse::<u64>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::String(team_id.to_string()));
            map.insert("teamId".to_string(), team);
        }
        body
    }
}

/// Why a submission did not create a scenario
#[derive(Debug, Clone, Error)]
pub enum SubmitError {
    /// The platform answered with an error
    #[error("Platform rejected the scenario: {0}")]
    Rejected(PlatformRejection),

    /// The platform could not be reached
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Interface for scenario deployment
#[async_trait]
pub trait ScenarioPlatform: Send + Sync + Debug {
    /// Create a scenario; returns the platform's success payload
    async fn create_scenario(&self, submission: &ScenarioSubmission) -> Result<Value, SubmitError>;
}
