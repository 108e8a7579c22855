//! Bounded repair-and-retry deployment
//!
//! Each attempt submits the current blueprint. A rejection is matched against
//! the repair strategies in priority order; the first one that applies
//! changes the blueprint and the loop submits again. Every strategy runs at
//! most once per step id, and the number of submissions never exceeds the
//! policy's `max_attempts`.

mod strategy;

pub use strategy::{FailureReason, ModuleRemap, RepairAction, RepairRecord, RepairStrategy};

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use weaver_blueprint::repair::{force_revision, has_revision_pins, strip_revisions, substitute_step};
use weaver_blueprint::{Blueprint, CompatibilityResolver, Registries};
use weaver_catalog::LiveCatalogSnapshot;

use crate::platform::{ScenarioPlatform, ScenarioSubmission, SubmitError};
use crate::rejection::PlatformRejection;
use strategy::TriedRepairs;

/// Default number of submissions per deployment
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Retry limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Submissions per deployment, at least one
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }
}

/// Terminal state of a deployment
#[derive(Debug, Clone, PartialEq)]
pub enum DeploymentOutcome {
    /// The platform created the scenario
    Succeeded {
        /// Platform success payload
        payload: Value,
    },
    /// The controller gave up
    Failed {
        /// Why
        reason: FailureReason,
    },
}

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct RetryRun {
    /// Terminal state
    pub outcome: DeploymentOutcome,
    /// Submissions made
    pub attempts: u32,
    /// Repairs applied, in order
    pub history: Vec<RepairRecord>,
    /// Steps replaced by live substitutes
    pub remapped: Vec<ModuleRemap>,
    /// Blueprint as last submitted
    pub blueprint: Blueprint,
}

/// Drives submissions and repairs against one platform
#[derive(Debug, Clone, Copy)]
pub struct RetryController<'a> {
    platform: &'a dyn ScenarioPlatform,
    registries: &'a Registries,
    resolver: &'a CompatibilityResolver,
    live_catalog: Option<&'a LiveCatalogSnapshot>,
    policy: RetryPolicy,
}

impl<'a> RetryController<'a> {
    pub fn new(platform: &'a dyn ScenarioPlatform, registries: &'a Registries, resolver: &'a CompatibilityResolver) -> Self {
        Self {
            platform,
            registries,
            resolver,
            live_catalog: None,
            policy: RetryPolicy::default(),
        }
    }

    /// Use a live catalog snapshot for substitutes
    pub fn with_live_catalog(mut self, snapshot: Option<&'a LiveCatalogSnapshot>) -> Self {
        self.live_catalog = snapshot;
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Submit until the platform accepts, a terminal failure occurs, the
    /// attempts run out, or `cancel` fires between attempts
    pub async fn run(&self, mut blueprint: Blueprint, cancel: &CancellationToken) -> RetryRun {
        let mut tried = TriedRepairs::default();
        let mut history = Vec::new();
        let mut remapped = Vec::new();
        let mut attempts = 0;

        let outcome = loop {
            if cancel.is_cancelled() {
                warn!(attempts, "Deployment cancelled");
                break DeploymentOutcome::Failed {
                    reason: FailureReason::Cancelled,
                };
            }

            attempts += 1;
            info!(attempt = attempts, max_attempts = self.policy.max_attempts, "Submitting scenario");

            let submission = ScenarioSubmission::from_blueprint(&blueprint);
            let rejection = match self.platform.create_scenario(&submission).await {
                Ok(payload) => {
                    info!(attempts, "Deployment succeeded");
                    break DeploymentOutcome::Succeeded { payload };
                }
                Err(SubmitError::Transport(message)) => {
                    error!(attempt = attempts, %message, "Platform unreachable");
                    break DeploymentOutcome::Failed {
                        reason: FailureReason::Transport { message },
                    };
                }
                Err(SubmitError::Rejected(rejection)) => rejection,
            };

            if rejection.is_auth_failure() {
                break DeploymentOutcome::Failed {
                    reason: FailureReason::Unauthorized { rejection },
                };
            }

            if attempts >= self.policy.max_attempts {
                // Denylisted steps fail as such even on the last attempt
                let reason = match self.denylisted(&rejection) {
                    Some(reason) => reason,
                    None => FailureReason::AttemptsExhausted { rejection },
                };
                error!(attempts, %reason, "Deployment attempts exhausted");
                break DeploymentOutcome::Failed { reason };
            }

            match self.repair(&rejection, &mut blueprint, &mut tried) {
                Ok(action) => {
                    warn!(attempt = attempts, %action, %rejection, "Repairing blueprint before retry");
                    if let RepairAction::Substitute { from, to } = &action {
                        remapped.push(ModuleRemap {
                            from: from.clone(),
                            to: to.clone(),
                        });
                    }
                    history.push(RepairRecord {
                        attempt: attempts,
                        error: rejection.to_string(),
                        action,
                    });
                }
                Err(reason) => {
                    error!(attempt = attempts, %reason, "Deployment failed");
                    break DeploymentOutcome::Failed { reason };
                }
            }
        };

        RetryRun {
            outcome,
            attempts,
            history,
            remapped,
            blueprint,
        }
    }

    /// Apply the first strategy that fits the rejection
    fn repair(
        &self,
        rejection: &PlatformRejection,
        blueprint: &mut Blueprint,
        tried: &mut TriedRepairs,
    ) -> Result<RepairAction, FailureReason> {
        for strategy in RepairStrategy::ORDER {
            if let Some(result) = self.try_strategy(strategy, rejection, blueprint, tried) {
                return result;
            }
        }
        Err(FailureReason::NoApplicableRepair {
            rejection: rejection.clone(),
        })
    }

    /// Terminal failure when the rejected step is on the problematic list
    fn denylisted(&self, rejection: &PlatformRejection) -> Option<FailureReason> {
        let step_id = rejection.step_id.as_deref()?;
        let problem = self.registries.problematic.lookup(step_id)?;
        Some(FailureReason::Denylisted {
            step_id: step_id.to_string(),
            detail: problem.reason.clone(),
            alternative: problem.alternative.clone(),
        })
    }

    /// `None` when the strategy does not apply
    fn try_strategy(
        &self,
        strategy: RepairStrategy,
        rejection: &PlatformRejection,
        blueprint: &mut Blueprint,
        tried: &mut TriedRepairs,
    ) -> Option<Result<RepairAction, FailureReason>> {
        if strategy == RepairStrategy::StripRevisions {
            if !has_revision_pins(&blueprint.flow) || !tried.mark(strategy, "*") {
                return None;
            }
            let removed = strip_revisions(&mut blueprint.flow);
            return Some(Ok(RepairAction::StripRevisions { removed }));
        }

        let step_id = rejection.step_id.as_deref()?;

        match strategy {
            RepairStrategy::KnownRevision => {
                let revision = self.registries.versions.get(step_id)?;
                if !blueprint.contains_step(step_id) || !tried.mark(strategy, step_id) {
                    return None;
                }
                force_revision(&mut blueprint.flow, step_id, revision);
                Some(Ok(RepairAction::ForceRevision {
                    step_id: step_id.to_string(),
                    revision,
                }))
            }
            RepairStrategy::Denylist => self.denylisted(rejection).map(Err),
            RepairStrategy::LiveSubstitute => {
                let snapshot = self.live_catalog?;
                if !blueprint.contains_step(step_id) {
                    return None;
                }
                let substitute = self.resolver.resolve(step_id, snapshot.ids()).suggestion?;
                if substitute == step_id || !tried.mark(strategy, step_id) {
                    return None;
                }
                substitute_step(&mut blueprint.flow, step_id, &substitute);
                Some(Ok(RepairAction::Substitute {
                    from: step_id.to_string(),
                    to: substitute,
                }))
            }
            RepairStrategy::RevisionDowngrade => {
                let reported = rejection.revision.filter(|revision| *revision > 1)?;
                if !blueprint.contains_step(step_id) || !tried.mark(strategy, step_id) {
                    return None;
                }
                force_revision(&mut blueprint.flow, step_id, reported - 1);
                Some(Ok(RepairAction::DowngradeRevision {
                    step_id: step_id.to_string(),
                    from: reported,
                    to: reported - 1,
                }))
            }
            RepairStrategy::StripRevisions => None,
        }
    }
}
