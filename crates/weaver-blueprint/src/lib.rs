//! # Weaver Blueprint
//!
//! Model, validation, compatibility resolution and repair of scenario
//! blueprints: trees of steps where router steps branch into routes, each
//! route being a nested flow.
//!
//! ## Features
//!
//! * JSON or YAML blueprint documents, with both wire spellings of node keys
//! * Structural validation against a step catalog with path-labelled errors
//! * Staged step-id resolution against the installable catalog of an account
//! * Idempotent healing into the shape the bulk deployment API accepts
//!
//! ## Example
//!
//! ```
//! use weaver_blueprint::{validate_document, CompatibilityResolver, Registries, ValidationContext};
//! use weaver_catalog::StaticCatalog;
//!
//! let catalog = StaticCatalog::bundled().unwrap();
//! let registries = Registries::bundled().unwrap();
//! let resolver = CompatibilityResolver::default();
//! let ctx = ValidationContext {
//!     catalog: &catalog,
//!     registries: &registries,
//!     live_catalog: None,
//!     resolver: &resolver,
//! };
//!
//! let text = r#"
//! name: hook
//! flow:
//!   - id: 1
//!     module: gateway:CustomWebHook
//!     parameters:
//!       name: incoming
//! "#;
//!
//! let report = validate_document(text, &ctx).unwrap();
//! assert!(report.valid);
//! assert_eq!(report.modules_validated, vec!["gateway:CustomWebHook"]);
//! ```

mod error;
mod utils;

pub mod flow;
pub mod parser;
pub mod registry;
pub mod repair;
pub mod resolver;
pub mod validation;

pub use error::DslError;
pub use flow::{Blueprint, Flow, FlowNode, LeafStep, Route, RouterStep, Scheduling, StepHeader};
pub use registry::{ProblematicStep, ProblematicSteps, Registries, VersionRegistry};
pub use repair::{heal, HealReport, Healer, IntervalMapping, VersionReport};
pub use resolver::{CompatibilityResolver, MatchStage, Resolution, DEFAULT_MATCH_THRESHOLD};
pub use validation::{
    AccountCompatibility, IncompatibleModule, ValidationContext, ValidationError, ValidationReport, ValidationWarning,
};

/// Parse a JSON or YAML blueprint document strictly.
///
/// # Errors
///
/// * Invalid JSON or YAML syntax
/// * Malformed nodes or routes (every structural error is collected)
///
/// ```
/// use weaver_blueprint::{load_blueprint, DslError};
///
/// let blueprint = load_blueprint(r#"{"flow": [{"module": "json:ParseJSON"}]}"#).unwrap();
/// assert_eq!(blueprint.step_ids(), vec!["json:ParseJSON"]);
///
/// let err = load_blueprint(r#"{"flow": [{"parameters": {}}]}"#).unwrap_err();
/// assert!(matches!(err, DslError::ValidationError(_)));
/// ```
pub fn load_blueprint(text: &str) -> Result<Blueprint, DslError> {
    let value = parser::parse_document(text)?;
    parser::parse_blueprint(&value)
}

/// Parse a document and validate it.
///
/// Only syntax errors fail; every data problem ends up in the report.
pub fn validate_document(text: &str, ctx: &ValidationContext<'_>) -> Result<ValidationReport, DslError> {
    let value = parser::parse_document(text)?;
    Ok(validation::validate_value(&value, ctx))
}

/// Version of this crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
