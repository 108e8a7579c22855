//! HTTP implementation of the ScenarioPlatform

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info, instrument};

use super::{ScenarioPlatform, ScenarioSubmission, SubmitError};
use crate::error::{DeployError, DeployResult};
use crate::rejection::PlatformRejection;

/// Connection settings for the platform API
#[derive(Debug, Clone)]
pub struct HttpPlatformConfig {
    /// Base URL, e.g. `https://eu1.example.com/api/v2`
    pub api_url: String,
    /// API token
    pub api_token: String,
    /// Team owning created scenarios
    pub team_id: Option<String>,
    /// Per-request timeout
    pub timeout_secs: u64,
}

/// Platform client creating scenarios over HTTP
#[derive(Debug, Clone)]
pub struct HttpScenarioPlatform {
    config: HttpPlatformConfig,
    client: Client,
}

impl HttpScenarioPlatform {
    /// Create a new client
    pub fn new(config: HttpPlatformConfig) -> DeployResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DeployError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn scenarios_url(&self) -> String {
        format!("{}/scenarios", self.config.api_url.trim_end_matches('/'))
    }

    fn map_http_error(error: reqwest::Error) -> SubmitError {
        if error.is_timeout() {
            SubmitError::Transport(format!("Request timeout: {}", error))
        } else if error.is_connect() {
            SubmitError::Transport(format!("Connection error: {}", error))
        } else {
            SubmitError::Transport(format!("HTTP error: {}", error))
        }
    }
}

#[async_trait]
impl ScenarioPlatform for HttpScenarioPlatform {
    #[instrument(skip(self, submission), fields(name = %submission.name))]
    async fn create_scenario(&self, submission: &ScenarioSubmission) -> Result<Value, SubmitError> {
        let body = submission.request_body(self.config.team_id.as_deref());

        let response = self
            .client
            .post(self.scenarios_url())
            .query(&[("confirmed", "true")])
            .header("Authorization", format!("Token {}", self.config.api_token))
            .json(&body)
            .send()
            .await
            .map_err(Self::map_http_error)?;

        let status = response.status();
        let text = response.text().await.map_err(Self::map_http_error)?;

        if status.is_success() {
            info!(status = status.as_u16(), "Scenario created");
            return serde_json::from_str(&text)
                .map_err(|e| SubmitError::Transport(format!("Failed to parse response: {}", e)));
        }

        let rejection = PlatformRejection::from_response(status.as_u16(), &text);
        if rejection.is_auth_failure() {
            error!(status = status.as_u16(), "Platform refused the API token");
        } else {
            debug!(%rejection, step_id = ?rejection.step_id, "Scenario rejected");
        }
        Err(SubmitError::Rejected(rejection))
    }
}
