//! Validation and deployment entry points
//!
//! The engine owns the frozen catalog and registries, the optional live
//! catalog cache and the optional platform client. Every operation takes the
//! live snapshot once and uses it for its whole duration.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use weaver_blueprint::repair::{apply_known_versions, substitute_step};
use weaver_blueprint::validation::{check_account_compatibility, validate_value, ValidationWarning};
use weaver_blueprint::{
    parser, Blueprint, CompatibilityResolver, HealReport, Healer, IntervalMapping, Registries, Resolution,
    ValidationContext, ValidationReport,
};
use weaver_catalog::{LiveCatalogCache, LiveCatalogSnapshot, RemoteLiveCatalog, StaticCatalog, StepCatalog};

use crate::config::WeaverConfig;
use crate::error::{DeployError, DeployResult};
use crate::platform::{HttpPlatformConfig, HttpScenarioPlatform, ScenarioPlatform};
use crate::retry::{DeploymentOutcome, ModuleRemap, RepairRecord, RetryController, RetryPolicy};

/// Successful deployment
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentResult {
    pub success: bool,
    /// Created scenario as returned by the platform
    pub scenario: Value,
    /// Steps replaced before or during deployment
    pub remapped_modules: Vec<ModuleRemap>,
    pub warnings: Vec<String>,
    /// Submissions made
    pub attempts: u32,
    /// Repairs applied between submissions
    pub repairs: Vec<RepairRecord>,
}

/// Validation, healing, resolution and deployment over shared registries
#[derive(Debug)]
pub struct DeploymentEngine {
    catalog: Arc<dyn StepCatalog>,
    registries: Arc<Registries>,
    resolver: CompatibilityResolver,
    intervals: IntervalMapping,
    live_catalog: Option<Arc<LiveCatalogCache>>,
    platform: Option<Arc<dyn ScenarioPlatform>>,
    policy: RetryPolicy,
}

impl DeploymentEngine {
    /// Create an engine without live catalog or platform access
    pub fn new(catalog: Arc<dyn StepCatalog>, registries: Arc<Registries>) -> Self {
        Self {
            catalog,
            registries,
            resolver: CompatibilityResolver::default(),
            intervals: IntervalMapping::default(),
            live_catalog: None,
            platform: None,
            policy: RetryPolicy::default(),
        }
    }

    /// Build an engine from configuration
    pub fn from_config(config: &WeaverConfig) -> DeployResult<Self> {
        let catalog = match &config.catalog_path {
            Some(path) => StaticCatalog::from_path(path)?,
            None => StaticCatalog::bundled()?,
        };
        let registries = match &config.registry_path {
            Some(path) => Registries::from_path(path)?,
            None => Registries::bundled()?,
        };

        let mut engine = Self::new(Arc::new(catalog), Arc::new(registries))
            .with_resolver(CompatibilityResolver::with_threshold(config.match_threshold))
            .with_retry_policy(RetryPolicy::new(config.max_deploy_attempts));

        if let Some(live_config) = config.live_catalog_config() {
            let source = RemoteLiveCatalog::new(live_config)?;
            engine = engine.with_live_catalog(Arc::new(LiveCatalogCache::new(
                Arc::new(source),
                Duration::from_secs(config.live_catalog_ttl_secs),
            )));
        }

        if let (Some(api_url), Some(api_token)) = (&config.api_url, &config.api_token) {
            let platform = HttpScenarioPlatform::new(HttpPlatformConfig {
                api_url: api_url.clone(),
                api_token: api_token.clone(),
                team_id: config.team_id.clone(),
                timeout_secs: config.request_timeout_secs,
            })?;
            engine = engine.with_platform(Arc::new(platform));
        }

        Ok(engine)
    }

    pub fn with_resolver(mut self, resolver: CompatibilityResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_intervals(mut self, intervals: IntervalMapping) -> Self {
        self.intervals = intervals;
        self
    }

    pub fn with_live_catalog(mut self, cache: Arc<LiveCatalogCache>) -> Self {
        self.live_catalog = Some(cache);
        self
    }

    pub fn with_platform(mut self, platform: Arc<dyn ScenarioPlatform>) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Static step catalog
    pub fn catalog(&self) -> &dyn StepCatalog {
        self.catalog.as_ref()
    }

    /// Current live snapshot, refreshed when stale; `None` when unavailable
    pub async fn live_snapshot(&self) -> Option<Arc<LiveCatalogSnapshot>> {
        match &self.live_catalog {
            Some(cache) => cache.get_or_refresh().await,
            None => None,
        }
    }

    /// Validate raw blueprint JSON, optionally against the live catalog
    pub async fn validate(&self, blueprint: &Value, live: bool) -> ValidationReport {
        let snapshot = if live { self.live_snapshot().await } else { None };
        self.validate_with(blueprint, snapshot.as_deref())
    }

    fn validate_with(&self, blueprint: &Value, snapshot: Option<&LiveCatalogSnapshot>) -> ValidationReport {
        let ctx = ValidationContext {
            catalog: self.catalog.as_ref(),
            registries: &self.registries,
            live_catalog: snapshot,
            resolver: &self.resolver,
        };
        validate_value(blueprint, &ctx)
    }

    /// Heal a blueprint with the engine's registries
    pub fn heal(&self, blueprint: &Blueprint) -> (Blueprint, HealReport) {
        Healer::new(&self.registries)
            .with_intervals(self.intervals.clone())
            .heal_with_report(blueprint)
    }

    /// Resolve a step id against the live catalog, or the static catalog
    /// when `live` is false or no snapshot is available
    pub async fn resolve(&self, step_id: &str, live: bool) -> Resolution {
        if live {
            if let Some(snapshot) = self.live_snapshot().await {
                return self.resolver.resolve(step_id, snapshot.ids());
            }
            warn!(step_id, "Live catalog unavailable; resolving against the static catalog");
        }
        self.resolver.resolve(step_id, &self.catalog.step_ids())
    }

    /// Validate, heal and deploy a blueprint.
    ///
    /// Steps the live catalog cannot install are replaced up front when a
    /// substitute exists; without one nothing is submitted.
    #[instrument(skip(self, blueprint, cancel))]
    pub async fn deploy(&self, blueprint: &Value, cancel: &CancellationToken) -> DeployResult<DeploymentResult> {
        let platform = self
            .platform
            .as_deref()
            .ok_or_else(|| DeployError::ConfigError("No platform configured for deployment".to_string()))?;

        let snapshot = self.live_snapshot().await;
        // Live compatibility is checked on the healed tree below
        let report = self.validate_with(blueprint, None);
        if !report.valid {
            return Err(DeployError::InvalidBlueprint(report.errors));
        }

        let parsed = parser::parse_blueprint(blueprint)?;
        let (mut healed, heal_report) = self.heal(&parsed);
        info!(
            name = %healed.name,
            filters_stripped = heal_report.filters_stripped,
            ordinals_assigned = heal_report.ordinals_assigned,
            "Blueprint prepared for deployment"
        );

        let mut warnings = report.warnings;
        let mut incompatible_modules = Vec::new();
        if let Some(snapshot) = snapshot.as_deref() {
            let (compatibility, live_warnings) = check_account_compatibility(
                &healed,
                &parser::SourcePaths::default(),
                snapshot,
                &self.registries,
                &self.resolver,
            );
            incompatible_modules = compatibility.incompatible_modules;
            warnings.extend(live_warnings.iter().map(ValidationWarning::describe));
        }

        let mut remapped_modules = Vec::new();
        let mut unresolved = Vec::new();
        for module in &incompatible_modules {
            match &module.suggestion {
                Some(suggestion) => {
                    substitute_step(&mut healed.flow, &module.module, suggestion);
                    remapped_modules.push(ModuleRemap {
                        from: module.module.clone(),
                        to: suggestion.clone(),
                    });
                }
                None => unresolved.push(module.module.clone()),
            }
        }
        if !unresolved.is_empty() {
            return Err(DeployError::IncompatibleModules(unresolved));
        }
        if !remapped_modules.is_empty() {
            // Substitutes carry no pin; reconcile them with the registry
            apply_known_versions(&mut healed.flow, &self.registries.versions);
        }

        let run = RetryController::new(platform, &self.registries, &self.resolver)
            .with_live_catalog(snapshot.as_deref())
            .with_policy(self.policy)
            .run(healed, cancel)
            .await;

        match run.outcome {
            DeploymentOutcome::Succeeded { payload } => {
                let scenario = payload.get("scenario").cloned().unwrap_or(payload);
                if scenario.get("isinvalid").and_then(Value::as_bool) == Some(true) {
                    warnings.push("The platform created the scenario but flagged it as invalid".to_string());
                }
                remapped_modules.extend(run.remapped);

                Ok(DeploymentResult {
                    success: true,
                    scenario,
                    remapped_modules,
                    warnings,
                    attempts: run.attempts,
                    repairs: run.history,
                })
            }
            DeploymentOutcome::Failed { reason } => Err(DeployError::DeploymentFailed {
                reason,
                attempts: run.attempts,
                history: run.history,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn engine() -> DeploymentEngine {
        DeploymentEngine::new(
            Arc::new(StaticCatalog::bundled().unwrap()),
            Arc::new(Registries::bundled().unwrap()),
        )
    }

    #[tokio::test]
    async fn test_deploy_without_platform_is_a_config_error() {
        let err = engine()
            .deploy(&json!({ "flow": [] }), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "ERR_DEPLOY_CONFIG");
    }

    #[tokio::test]
    async fn test_validate_without_live_catalog() {
        let report = engine().validate(&json!({ "flow": [] }), true).await;
        assert!(!report.valid);
        assert!(!report.account_compatibility.live_catalog_checked);
    }

    #[tokio::test]
    async fn test_resolve_falls_back_to_static_catalog() {
        let resolution = engine().resolve("slack:ActionPostMesage", true).await;
        assert!(!resolution.available);
        assert_eq!(resolution.suggestion.as_deref(), Some("slack:ActionPostMessage"));
    }
}
