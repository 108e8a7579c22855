//! Weaver Deploy
//!
//! Deployment of scenario blueprints to the automation platform:
//!
//! * [`WeaverConfig`] - environment driven configuration
//! * [`DeploymentEngine`] - validate, heal, resolve and deploy over shared registries
//! * [`RetryController`] - the bounded repair-and-retry loop
//! * [`HttpScenarioPlatform`] - the platform's scenario creation endpoint

#![forbid(unsafe_code)]

pub mod config;
pub mod engine;
pub mod error;
pub mod platform;
pub mod rejection;
pub mod retry;

pub use config::WeaverConfig;
pub use engine::{DeploymentEngine, DeploymentResult};
pub use error::{DeployError, DeployResult};
pub use platform::{HttpPlatformConfig, HttpScenarioPlatform, ScenarioPlatform, ScenarioSubmission, SubmitError};
pub use rejection::PlatformRejection;
pub use retry::{
    DeploymentOutcome, FailureReason, ModuleRemap, RepairAction, RepairRecord, RepairStrategy, RetryController,
    RetryPolicy, RetryRun, DEFAULT_MAX_ATTEMPTS,
};

/// Re-exported so callers can cancel a deployment without a direct dependency
pub use tokio_util::sync::CancellationToken;
