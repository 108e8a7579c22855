use std::error::Error;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use weaver_catalog::{LiveCatalogSnapshot, StepCatalog};

use crate::flow::Blueprint;
use crate::parser::{self, SourcePaths};
use crate::registry::Registries;
use crate::resolver::CompatibilityResolver;

mod compat;
mod structure;

pub use compat::{check_account_compatibility, registry_warnings};
pub use structure::StructuralValidator;

/// Represents a validation error found in a blueprint
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error code (should be a constant identifier)
    pub code: &'static str,

    /// Human-readable error message
    pub message: String,

    /// Optional path to the location of the error (e.g., "Flow[1].routes[0][2]")
    pub path: Option<String>,
}

impl ValidationError {
    /// Message prefixed with its path, as shown in reports
    pub fn describe(&self) -> String {
        describe(&self.path, &self.message)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(path) = &self.path {
            write!(f, "{}: {} (at {})", self.code, self.message, path)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

impl Error for ValidationError {}

/// A problem that does not make the blueprint invalid
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationWarning {
    /// Warning code
    pub code: &'static str,

    /// Human-readable message
    pub message: String,

    /// Optional location
    pub path: Option<String>,
}

impl ValidationWarning {
    /// Message prefixed with its path, as shown in reports
    pub fn describe(&self) -> String {
        describe(&self.path, &self.message)
    }
}

fn describe(path: &Option<String>, message: &str) -> String {
    match path {
        Some(path) => format!("{}: {}", path, message),
        None => message.to_string(),
    }
}

/// Validation error codes
pub mod error_codes {
    /// Malformed tree (wrong JSON types, non-object nodes)
    pub const STRUCTURAL: &str = "ERR_BLUEPRINT_STRUCTURAL";

    /// Node without a step id
    pub const MISSING_STEP_ID: &str = "ERR_BLUEPRINT_MISSING_STEP_ID";

    /// Missing required field
    pub const MISSING_REQUIRED_FIELD: &str = "ERR_BLUEPRINT_MISSING_REQUIRED_FIELD";

    /// Root flow has no nodes
    pub const EMPTY_FLOW: &str = "ERR_BLUEPRINT_EMPTY_FLOW";

    /// Step id not present in the step catalog
    pub const UNKNOWN_STEP: &str = "ERR_BLUEPRINT_UNKNOWN_STEP";

    /// Router without routes
    pub const INVALID_ROUTES: &str = "ERR_BLUEPRINT_INVALID_ROUTES";
}

/// Validation warning codes
pub mod warning_codes {
    /// First node of the root flow is not a trigger
    pub const FIRST_NOT_TRIGGER: &str = "WARN_BLUEPRINT_FIRST_NOT_TRIGGER";

    /// Node without an ordinal
    pub const MISSING_ORDINAL: &str = "WARN_BLUEPRINT_MISSING_ORDINAL";

    /// Two nodes share an ordinal
    pub const DUPLICATE_ORDINAL: &str = "WARN_BLUEPRINT_DUPLICATE_ORDINAL";

    /// A route with no nodes
    pub const EMPTY_ROUTE: &str = "WARN_BLUEPRINT_EMPTY_ROUTE";

    /// Pinned revision differs from the known-good one
    pub const REVISION_MISMATCH: &str = "WARN_COMPAT_REVISION_MISMATCH";

    /// Step known to fail deployment
    pub const PROBLEMATIC_STEP: &str = "WARN_COMPAT_PROBLEMATIC_STEP";

    /// Step installable but without a verified revision
    pub const UNVERIFIED_STEP: &str = "WARN_COMPAT_UNVERIFIED_STEP";

    /// Step not installable for the account
    pub const INCOMPATIBLE_STEP: &str = "WARN_COMPAT_INCOMPATIBLE_STEP";
}

/// Errors, warnings and validated steps of one validation pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationOutcome {
    /// Errors (any error makes the blueprint invalid)
    pub errors: Vec<ValidationError>,
    /// Warnings
    pub warnings: Vec<ValidationWarning>,
    /// Distinct step ids found in the catalog, in first-seen order
    pub validated_steps: Vec<String>,
}

impl ValidationOutcome {
    /// Whether no errors were found
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub(crate) fn error(&mut self, code: &'static str, path: Option<&str>, message: String) {
        self.errors.push(ValidationError {
            code,
            message,
            path: path.map(str::to_string),
        });
    }

    pub(crate) fn warn(&mut self, code: &'static str, path: Option<&str>, message: String) {
        self.warnings.push(ValidationWarning {
            code,
            message,
            path: path.map(str::to_string),
        });
    }

    pub(crate) fn mark_validated(&mut self, step_id: &str) {
        if !self.validated_steps.iter().any(|id| id == step_id) {
            self.validated_steps.push(step_id.to_string());
        }
    }
}

/// A step id the live catalog cannot install
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncompatibleModule {
    /// The unavailable step id
    pub module: String,
    /// Closest installable substitute, if one is confident
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Every path where the step is used
    pub paths: Vec<String>,
}

/// Result of checking a blueprint against the live catalog
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountCompatibility {
    /// Whether a live catalog snapshot was available
    pub live_catalog_checked: bool,
    /// Steps the account cannot install
    pub incompatible_modules: Vec<IncompatibleModule>,
}

/// Report returned to callers of validation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    /// Whether the blueprint is valid
    pub valid: bool,
    /// Error messages
    pub errors: Vec<String>,
    /// Warning messages
    pub warnings: Vec<String>,
    /// Step ids that passed the catalog lookup
    pub modules_validated: Vec<String>,
    /// Live catalog compatibility
    pub account_compatibility: AccountCompatibility,
}

/// Everything validation needs besides the blueprint itself
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    /// Static step catalog
    pub catalog: &'a dyn StepCatalog,
    /// Version and problematic-step registries
    pub registries: &'a Registries,
    /// Live catalog snapshot, when one could be fetched
    pub live_catalog: Option<&'a LiveCatalogSnapshot>,
    /// Resolver used for suggestions
    pub resolver: &'a CompatibilityResolver,
}

/// Validate raw blueprint JSON.
///
/// Malformed nodes are reported as structural errors and skipped; the rest of
/// the tree is still validated so the caller sees every problem at once.
pub fn validate_value(value: &Value, ctx: &ValidationContext<'_>) -> ValidationReport {
    let parsed = parser::parse_blueprint_lenient(value);

    let mut outcome = ValidationOutcome {
        errors: parsed.errors,
        ..Default::default()
    };

    let account_compatibility = match &parsed.blueprint {
        Some(blueprint) => validate_into(blueprint, &parsed.paths, ctx, &mut outcome),
        None => AccountCompatibility::default(),
    };

    build_report(outcome, account_compatibility)
}

/// Validate an already parsed blueprint
pub fn validate_blueprint(blueprint: &Blueprint, ctx: &ValidationContext<'_>) -> ValidationReport {
    let mut outcome = ValidationOutcome::default();
    let account_compatibility = validate_into(blueprint, &SourcePaths::default(), ctx, &mut outcome);
    build_report(outcome, account_compatibility)
}

fn validate_into(
    blueprint: &Blueprint,
    paths: &SourcePaths,
    ctx: &ValidationContext<'_>,
    outcome: &mut ValidationOutcome,
) -> AccountCompatibility {
    let structural = StructuralValidator::new(ctx.catalog)
        .with_resolver(ctx.resolver)
        .with_source_paths(paths)
        .validate(blueprint);
    outcome.errors.extend(structural.errors);
    outcome.warnings.extend(structural.warnings);
    outcome.validated_steps.extend(structural.validated_steps);

    outcome.warnings.extend(registry_warnings(blueprint, paths, ctx.registries));

    match ctx.live_catalog {
        Some(snapshot) => {
            let (compatibility, warnings) =
                check_account_compatibility(blueprint, paths, snapshot, ctx.registries, ctx.resolver);
            outcome.warnings.extend(warnings);
            compatibility
        }
        None => AccountCompatibility::default(),
    }
}

fn build_report(outcome: ValidationOutcome, account_compatibility: AccountCompatibility) -> ValidationReport {
    ValidationReport {
        valid: outcome.is_valid(),
        errors: outcome.errors.iter().map(ValidationError::describe).collect(),
        warnings: outcome.warnings.iter().map(ValidationWarning::describe).collect(),
        modules_validated: outcome.validated_steps,
        account_compatibility,
    }
}
