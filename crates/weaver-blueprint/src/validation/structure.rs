use std::collections::HashMap;

use tracing::debug;
use weaver_catalog::StepCatalog;

use crate::flow::{Blueprint, FlowNode};
use crate::parser::{node_path, route_prefix, SourcePaths};
use crate::resolver::CompatibilityResolver;
use crate::validation::{error_codes, warning_codes, ValidationOutcome};

/// Schema parameter that routers carry structurally rather than as data
const ROUTES_PARAMETER: &str = "routes";

/// Walks the flow tree checking nodes against the step catalog
pub struct StructuralValidator<'a> {
    catalog: &'a dyn StepCatalog,
    resolver: Option<&'a CompatibilityResolver>,
    paths: Option<&'a SourcePaths>,
}

impl<'a> StructuralValidator<'a> {
    /// Create a validator over a catalog
    pub fn new(catalog: &'a dyn StepCatalog) -> Self {
        Self {
            catalog,
            resolver: None,
            paths: None,
        }
    }

    /// Use a resolver to add "did you mean" hints to unknown-step errors
    pub fn with_resolver(mut self, resolver: &'a CompatibilityResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Report findings at document locations of a leniently parsed blueprint
    pub fn with_source_paths(mut self, paths: &'a SourcePaths) -> Self {
        self.paths = Some(paths);
        self
    }

    fn label<'b>(&'b self, parsed: &'b str) -> &'b str {
        match self.paths {
            Some(paths) => paths.label(parsed),
            None => parsed,
        }
    }

    /// Validate a blueprint
    pub fn validate(&self, blueprint: &Blueprint) -> ValidationOutcome {
        let mut outcome = ValidationOutcome::default();

        if blueprint.flow.is_empty() {
            // Entries that failed to parse were already reported
            if self.paths.map_or(0, SourcePaths::root_len) == 0 {
                outcome.error(error_codes::EMPTY_FLOW, None, "Flow array is empty.".to_string());
            }
            return outcome;
        }

        // Only the document's first entry decides how the scenario starts
        let first_path = node_path("Flow", 0);
        let first = &blueprint.flow[0];
        if self.label(&first_path) == first_path {
            if let Some(schema) = self.catalog.get_step(first.step_id()) {
                if !schema.is_trigger() {
                    outcome.warn(
                        warning_codes::FIRST_NOT_TRIGGER,
                        Some(&first_path),
                        format!(
                            "First module '{}' is not a trigger (kind: {}); the scenario can only be run manually",
                            first.step_id(),
                            schema.kind
                        ),
                    );
                }
            }
        }

        self.validate_flow(&blueprint.flow, "Flow", &mut outcome);
        self.check_duplicate_ordinals(blueprint, &mut outcome);

        debug!(
            errors = outcome.errors.len(),
            warnings = outcome.warnings.len(),
            "Structural validation finished"
        );
        outcome
    }

    fn validate_flow(&self, flow: &[FlowNode], prefix: &str, outcome: &mut ValidationOutcome) {
        for (index, node) in flow.iter().enumerate() {
            let path = node_path(prefix, index);
            self.validate_node(node, &path, outcome);
        }
    }

    fn validate_node(&self, node: &FlowNode, parsed_path: &str, outcome: &mut ValidationOutcome) {
        let step_id = node.step_id();
        let path = self.label(parsed_path);

        if node.header().ordinal.is_none() {
            outcome.warn(
                warning_codes::MISSING_ORDINAL,
                Some(path),
                format!("Module '{}' has no id", step_id),
            );
        }

        match self.catalog.get_step(step_id) {
            Some(schema) => {
                for param in schema.required_parameters() {
                    if param.name == ROUTES_PARAMETER {
                        if !node.is_router() {
                            outcome.error(
                                error_codes::INVALID_ROUTES,
                                Some(path),
                                format!("Router '{}' must define a non-empty 'routes' list", step_id),
                            );
                        }
                        continue;
                    }
                    if !node.supplies(&param.name) {
                        outcome.error(
                            error_codes::MISSING_REQUIRED_FIELD,
                            Some(path),
                            format!("Missing required parameter '{}' for module '{}'", param.name, step_id),
                        );
                    }
                }
                outcome.mark_validated(step_id);
            }
            None => {
                let hint = self
                    .resolver
                    .and_then(|resolver| resolver.resolve(step_id, &self.catalog.step_ids()).suggestion)
                    .map(|suggestion| format!(" (did you mean '{}'?)", suggestion))
                    .unwrap_or_default();
                outcome.error(
                    error_codes::UNKNOWN_STEP,
                    Some(path),
                    format!("Module '{}' is not in the step catalog{}", step_id, hint),
                );
            }
        }

        if let FlowNode::Router(router) = node {
            if router.routes.is_empty() {
                outcome.error(
                    error_codes::INVALID_ROUTES,
                    Some(path),
                    format!("Router '{}' must define a non-empty 'routes' list", step_id),
                );
            }
            for (route_index, route) in router.routes.iter().enumerate() {
                let prefix = route_prefix(parsed_path, route_index);
                if route.flow.is_empty() {
                    outcome.warn(
                        warning_codes::EMPTY_ROUTE,
                        Some(self.label(&prefix)),
                        "Route has no modules".to_string(),
                    );
                }
                self.validate_flow(&route.flow, &prefix, outcome);
            }
        }
    }

    fn check_duplicate_ordinals(&self, blueprint: &Blueprint, outcome: &mut ValidationOutcome) {
        let mut counts: HashMap<i64, usize> = HashMap::new();
        blueprint.visit_nodes(&mut |node| {
            if let Some(ordinal) = node.header().ordinal {
                *counts.entry(ordinal).or_default() += 1;
            }
        });

        let mut duplicates: Vec<i64> = counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(ordinal, _)| ordinal)
            .collect();
        duplicates.sort_unstable();

        for ordinal in duplicates {
            outcome.warn(
                warning_codes::DUPLICATE_ORDINAL,
                None,
                format!("Module id {} is used more than once", ordinal),
            );
        }
    }
}
