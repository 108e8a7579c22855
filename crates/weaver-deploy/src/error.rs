//! Error types for deployment
//!
//! Data problems in a blueprint are reported through validation; these
//! errors cover what stops a deployment from running or finishing.

use thiserror::Error;
use weaver_blueprint::DslError;
use weaver_catalog::CatalogError;

use crate::retry::{FailureReason, RepairRecord};

/// Deployment error types
#[derive(Error, Debug)]
pub enum DeployError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Blueprint could not be parsed or the registries could not be loaded
    #[error("Blueprint error: {0}")]
    Blueprint(#[from] DslError),

    /// Step catalog could not be loaded
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Validation found errors; nothing was submitted
    #[error("Blueprint is invalid: {}", .0.join("; "))]
    InvalidBlueprint(Vec<String>),

    /// Steps unavailable for the account with no substitute
    #[error("Modules not available for this account and without a substitute: {}", .0.join(", "))]
    IncompatibleModules(Vec<String>),

    /// The retry controller gave up
    #[error("Deployment failed after {attempts} attempt(s): {reason}{}", format_history(.history))]
    DeploymentFailed {
        /// Why the controller stopped
        reason: FailureReason,
        /// Submissions made
        attempts: u32,
        /// Repairs applied before giving up
        history: Vec<RepairRecord>,
    },
}

/// Type alias for deployment results
pub type DeployResult<T> = Result<T, DeployError>;

fn format_history(history: &[RepairRecord]) -> String {
    if history.is_empty() {
        return String::new();
    }
    let mut out = String::from("\nAttempted repairs:");
    for record in history {
        out.push_str(&format!("\n  {}", record));
    }
    out
}

impl DeployError {
    /// Stable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            DeployError::ConfigError(_) => "ERR_DEPLOY_CONFIG",
            DeployError::Blueprint(err) => err.error_code(),
            DeployError::Catalog(err) => err.error_code(),
            DeployError::InvalidBlueprint(_) => "ERR_DEPLOY_INVALID_BLUEPRINT",
            DeployError::IncompatibleModules(_) => "ERR_DEPLOY_INCOMPATIBLE_MODULES",
            DeployError::DeploymentFailed { reason, .. } => reason.error_code(),
        }
    }
}
