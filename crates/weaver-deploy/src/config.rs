//! Configuration for validation and deployment
//!
//! Values come from the environment, after an optional `.env` file has been
//! loaded. Unparsable values are logged and replaced by their defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use tracing::{info, warn};

use weaver_blueprint::DEFAULT_MATCH_THRESHOLD;
use weaver_catalog::RemoteLiveCatalogConfig;

use crate::error::{DeployError, DeployResult};

/// Weaver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeaverConfig {
    /// Base URL of the platform API
    #[serde(default)]
    pub api_url: Option<String>,

    /// API token
    #[serde(default)]
    pub api_token: Option<String>,

    /// Team that owns created scenarios
    #[serde(default)]
    pub team_id: Option<String>,

    /// Live catalog endpoint; `<api_url>/modules` when unset
    #[serde(default)]
    pub live_catalog_url: Option<String>,

    /// How long a live catalog snapshot stays fresh
    #[serde(default = "default_live_catalog_ttl")]
    pub live_catalog_ttl_secs: u64,

    /// Per-request timeout for platform calls
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Submission attempts per deployment
    #[serde(default = "default_max_deploy_attempts")]
    pub max_deploy_attempts: u32,

    /// Token overlap needed for a substitute suggestion
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f64,

    /// Step catalog file replacing the bundled one
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,

    /// Registry file replacing the bundled one
    #[serde(default)]
    pub registry_path: Option<PathBuf>,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON logs
    #[serde(default)]
    pub log_json: bool,
}

fn default_live_catalog_ttl() -> u64 {
    300
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_deploy_attempts() -> u32 {
    5
}

fn default_match_threshold() -> f64 {
    DEFAULT_MATCH_THRESHOLD
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for WeaverConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            api_token: None,
            team_id: None,
            live_catalog_url: None,
            live_catalog_ttl_secs: default_live_catalog_ttl(),
            request_timeout_secs: default_request_timeout(),
            max_deploy_attempts: default_max_deploy_attempts(),
            match_threshold: default_match_threshold(),
            catalog_path: None,
            registry_path: None,
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

impl WeaverConfig {
    /// Load configuration from the process environment and an optional `.env` file
    pub fn load() -> DeployResult<Self> {
        if dotenv::dotenv().is_ok() {
            info!("Loaded .env file");
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> DeployResult<Self> {
        let mut config = Self::default();

        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(api_url) = non_empty("WEAVER_API_URL") {
            if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
                return Err(DeployError::ConfigError(format!(
                    "WEAVER_API_URL must be an http(s) URL, got '{}'",
                    api_url
                )));
            }
            config.api_url = Some(api_url.trim_end_matches('/').to_string());
        }

        config.api_token = non_empty("WEAVER_API_TOKEN");
        config.team_id = non_empty("WEAVER_TEAM_ID");
        config.live_catalog_url = non_empty("WEAVER_LIVE_CATALOG_URL");
        config.catalog_path = non_empty("WEAVER_CATALOG_PATH").map(PathBuf::from);
        config.registry_path = non_empty("WEAVER_REGISTRY_PATH").map(PathBuf::from);

        if let Some(ttl) = non_empty("WEAVER_LIVE_CATALOG_TTL_SECS") {
            match ttl.parse::<u64>() {
                Ok(ttl) => config.live_catalog_ttl_secs = ttl,
                Err(_) => warn!("Invalid WEAVER_LIVE_CATALOG_TTL_SECS value: {}", ttl),
            }
        }

        if let Some(timeout) = non_empty("WEAVER_REQUEST_TIMEOUT_SECS") {
            match timeout.parse::<u64>() {
                Ok(timeout) if timeout > 0 => config.request_timeout_secs = timeout,
                _ => warn!("Invalid WEAVER_REQUEST_TIMEOUT_SECS value: {}", timeout),
            }
        }

        if let Some(attempts) = non_empty("WEAVER_MAX_DEPLOY_ATTEMPTS") {
            match attempts.parse::<u32>() {
                Ok(attempts) if attempts > 0 => config.max_deploy_attempts = attempts,
                _ => warn!("Invalid WEAVER_MAX_DEPLOY_ATTEMPTS value: {}", attempts),
            }
        }

        if let Some(threshold) = non_empty("WEAVER_MATCH_THRESHOLD") {
            match threshold.parse::<f64>() {
                Ok(value) if (0.0..=1.0).contains(&value) => config.match_threshold = value,
                _ => warn!("Invalid WEAVER_MATCH_THRESHOLD value: {}", threshold),
            }
        }

        if let Some(log_level) = non_empty("LOG_LEVEL") {
            config.log_level = log_level;
        }

        if let Some(log_json) = non_empty("WEAVER_LOG_JSON") {
            config.log_json = log_json.eq_ignore_ascii_case("true") || log_json == "1";
        }

        if config.api_url.is_some() && config.api_token.is_none() {
            warn!("WEAVER_API_URL is set but WEAVER_API_TOKEN is not; live checks and deployment are disabled");
        }

        Ok(config)
    }

    /// Live catalog endpoint, explicit or derived from the API URL
    pub fn live_catalog_endpoint(&self) -> Option<String> {
        self.live_catalog_url
            .clone()
            .or_else(|| self.api_url.as_ref().map(|api| format!("{}/modules", api)))
    }

    /// Live catalog client settings; `None` when no endpoint is known
    pub fn live_catalog_config(&self) -> Option<RemoteLiveCatalogConfig> {
        Some(RemoteLiveCatalogConfig {
            url: self.live_catalog_endpoint()?,
            api_token: self.api_token.clone(),
            team_id: self.team_id.clone(),
            timeout_secs: self.request_timeout_secs,
        })
    }

    /// API URL and token, both required for deployment
    pub fn platform_credentials(&self) -> DeployResult<(&str, &str)> {
        let api_url = self
            .api_url
            .as_deref()
            .ok_or_else(|| DeployError::ConfigError("WEAVER_API_URL is required for deployment".to_string()))?;
        let api_token = self
            .api_token
            .as_deref()
            .ok_or_else(|| DeployError::ConfigError("WEAVER_API_TOKEN is required for deployment".to_string()))?;
        Ok((api_url, api_token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> DeployResult<WeaverConfig> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        WeaverConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.live_catalog_ttl_secs, 300);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.max_deploy_attempts, 5);
        assert_eq!(config.match_threshold, 0.5);
        assert_eq!(config.log_level, "info");
        assert!(config.live_catalog_config().is_none());
        assert_eq!(config.platform_credentials().unwrap_err().error_code(), "ERR_DEPLOY_CONFIG");
    }

    #[test]
    fn test_api_settings() {
        let config = config_from(&[
            ("WEAVER_API_URL", "https://eu1.example.com/api/v2/"),
            ("WEAVER_API_TOKEN", "secret"),
            ("WEAVER_TEAM_ID", "42"),
        ])
        .unwrap();

        assert_eq!(config.api_url.as_deref(), Some("https://eu1.example.com/api/v2"));
        assert_eq!(config.platform_credentials().unwrap(), ("https://eu1.example.com/api/v2", "secret"));

        let live = config.live_catalog_config().unwrap();
        assert_eq!(live.url, "https://eu1.example.com/api/v2/modules");
        assert_eq!(live.team_id.as_deref(), Some("42"));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_from(&[
            ("WEAVER_MAX_DEPLOY_ATTEMPTS", "0"),
            ("WEAVER_MATCH_THRESHOLD", "1.5"),
            ("WEAVER_LIVE_CATALOG_TTL_SECS", "soon"),
            ("WEAVER_LOG_JSON", "TRUE"),
        ])
        .unwrap();

        assert_eq!(config.max_deploy_attempts, 5);
        assert_eq!(config.match_threshold, 0.5);
        assert_eq!(config.live_catalog_ttl_secs, 300);
        assert!(config.log_json);
    }

    #[test]
    fn test_non_http_api_url_is_rejected() {
        let err = config_from(&[("WEAVER_API_URL", "ftp://example.com")]).unwrap_err();
        assert!(matches!(err, DeployError::ConfigError(_)));
    }
}
