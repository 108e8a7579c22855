use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::rejection::PlatformRejection;

/// Repairs in the order they are considered after a rejection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RepairStrategy {
    /// Force the registry revision of the offending step
    KnownRevision,
    /// Stop when the offending step is denylisted
    Denylist,
    /// Swap the offending step for a live-catalog substitute
    LiveSubstitute,
    /// Retry with the reported revision minus one
    RevisionDowngrade,
    /// Drop every revision pin
    StripRevisions,
}

impl RepairStrategy {
    /// Priority order
    pub const ORDER: [RepairStrategy; 5] = [
        RepairStrategy::KnownRevision,
        RepairStrategy::Denylist,
        RepairStrategy::LiveSubstitute,
        RepairStrategy::RevisionDowngrade,
        RepairStrategy::StripRevisions,
    ];
}

/// A change applied to the blueprint between attempts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum RepairAction {
    /// Revision set from the registry
    #[serde(rename_all = "camelCase")]
    ForceRevision { step_id: String, revision: u32 },
    /// Step replaced by an installable substitute
    Substitute { from: String, to: String },
    /// Revision lowered by one
    #[serde(rename_all = "camelCase")]
    DowngradeRevision { step_id: String, from: u32, to: u32 },
    /// All revision pins removed
    StripRevisions { removed: usize },
}

impl RepairAction {
    /// Strategy that produced this action
    pub fn strategy(&self) -> RepairStrategy {
        match self {
            RepairAction::ForceRevision { .. } => RepairStrategy::KnownRevision,
            RepairAction::Substitute { .. } => RepairStrategy::LiveSubstitute,
            RepairAction::DowngradeRevision { .. } => RepairStrategy::RevisionDowngrade,
            RepairAction::StripRevisions { .. } => RepairStrategy::StripRevisions,
        }
    }
}

impl fmt::Display for RepairAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepairAction::ForceRevision { step_id, revision } => {
                write!(f, "pinned '{}' to known version {}", step_id, revision)
            }
            RepairAction::Substitute { from, to } => write!(f, "replaced '{}' with '{}'", from, to),
            RepairAction::DowngradeRevision { step_id, from, to } => {
                write!(f, "lowered '{}' from version {} to {}", step_id, from, to)
            }
            RepairAction::StripRevisions { removed } => write!(f, "removed {} version pin(s)", removed),
        }
    }
}

/// One repair in the deployment history
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairRecord {
    /// Attempt whose rejection triggered the repair
    pub attempt: u32,
    /// Rejection text
    pub error: String,
    /// What was changed
    pub action: RepairAction,
}

impl fmt::Display for RepairRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attempt {}: {} ({})", self.attempt, self.action, self.error)
    }
}

/// A step id replaced during deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleRemap {
    pub from: String,
    pub to: String,
}

/// Why the controller stopped without a scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "camelCase")]
pub enum FailureReason {
    /// The offending step is known to fail
    #[serde(rename_all = "camelCase")]
    Denylisted {
        step_id: String,
        detail: String,
        alternative: Option<String>,
    },
    /// Nothing left to try for this rejection
    NoApplicableRepair { rejection: PlatformRejection },
    /// Every attempt was used
    AttemptsExhausted { rejection: PlatformRejection },
    /// The platform refused the credentials
    Unauthorized { rejection: PlatformRejection },
    /// The platform could not be reached
    Transport { message: String },
    /// The caller cancelled between attempts
    Cancelled,
}

impl FailureReason {
    /// Stable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            FailureReason::Denylisted { .. } => "ERR_DEPLOY_DENYLISTED_MODULE",
            FailureReason::NoApplicableRepair { .. } => "ERR_DEPLOY_NO_REPAIR",
            FailureReason::AttemptsExhausted { .. } => "ERR_DEPLOY_ATTEMPTS_EXHAUSTED",
            FailureReason::Unauthorized { .. } => "ERR_DEPLOY_UNAUTHORIZED",
            FailureReason::Transport { .. } => "ERR_DEPLOY_TRANSPORT",
            FailureReason::Cancelled => "ERR_DEPLOY_CANCELLED",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Denylisted {
                step_id,
                detail,
                alternative,
            } => {
                write!(f, "module '{}' is known to fail deployment: {}", step_id, detail)?;
                if let Some(alternative) = alternative {
                    write!(f, " (consider '{}')", alternative)?;
                }
                Ok(())
            }
            FailureReason::NoApplicableRepair { rejection } => write!(f, "no repair applies to {}", rejection),
            FailureReason::AttemptsExhausted { rejection } => write!(f, "attempts exhausted, last error {}", rejection),
            FailureReason::Unauthorized { rejection } => write!(f, "API token refused {}", rejection),
            FailureReason::Transport { message } => write!(f, "{}", message),
            FailureReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Strategies already applied, per identifier
#[derive(Debug, Default)]
pub(crate) struct TriedRepairs {
    tried: HashSet<(RepairStrategy, String)>,
}

impl TriedRepairs {
    /// Record a strategy for an identifier; false when it was already used
    pub(crate) fn mark(&mut self, strategy: RepairStrategy, identifier: &str) -> bool {
        self.tried.insert((strategy, identifier.to_string()))
    }
}
