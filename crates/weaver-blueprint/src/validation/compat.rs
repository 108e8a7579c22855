use std::collections::BTreeMap;

use weaver_catalog::LiveCatalogSnapshot;

use crate::flow::{Blueprint, FlowNode};
use crate::parser::{node_path, route_prefix, SourcePaths};
use crate::registry::Registries;
use crate::resolver::CompatibilityResolver;
use crate::validation::{warning_codes, AccountCompatibility, IncompatibleModule, ValidationWarning};

/// Every node of the blueprint paired with its document path label, in document order
fn labelled_nodes<'a>(blueprint: &'a Blueprint, paths: &SourcePaths) -> Vec<(String, &'a FlowNode)> {
    fn walk<'a>(flow: &'a [FlowNode], prefix: &str, paths: &SourcePaths, out: &mut Vec<(String, &'a FlowNode)>) {
        for (index, node) in flow.iter().enumerate() {
            let path = node_path(prefix, index);
            out.push((paths.label(&path).to_string(), node));
            for (route_index, route) in node.routes().iter().enumerate() {
                walk(&route.flow, &route_prefix(&path, route_index), paths, out);
            }
        }
    }

    let mut out = Vec::new();
    walk(&blueprint.flow, "Flow", paths, &mut out);
    out
}

/// Warnings derived from the version and problematic-step registries
pub fn registry_warnings(
    blueprint: &Blueprint,
    paths: &SourcePaths,
    registries: &Registries,
) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    for (path, node) in labelled_nodes(blueprint, paths) {
        let step_id = node.step_id();

        if let (Some(pinned), Some(known)) = (node.header().revision, registries.versions.get(step_id)) {
            if pinned != known {
                warnings.push(ValidationWarning {
                    code: warning_codes::REVISION_MISMATCH,
                    message: format!(
                        "Module '{}' pins version {} but version {} is known to deploy; it will be reconciled",
                        step_id, pinned, known
                    ),
                    path: Some(path.clone()),
                });
            }
        }

        if let Some(problem) = registries.problematic.lookup(step_id) {
            let alternative = problem
                .alternative
                .as_deref()
                .map(|alt| format!(" Consider '{}' instead.", alt))
                .unwrap_or_default();
            warnings.push(ValidationWarning {
                code: warning_codes::PROBLEMATIC_STEP,
                message: format!("Module '{}' is known to fail deployment: {}.{}", step_id, problem.reason, alternative),
                path: Some(path),
            });
        }
    }

    warnings
}

/// Check every step id against the live catalog.
///
/// Unavailable steps are grouped per id with every path they appear at and a
/// substitute suggestion when the resolver finds a confident one. Available
/// steps without a verified revision produce a warning. Schedulers are never
/// checked since healing removes them before submission.
pub fn check_account_compatibility(
    blueprint: &Blueprint,
    paths: &SourcePaths,
    snapshot: &LiveCatalogSnapshot,
    registries: &Registries,
    resolver: &CompatibilityResolver,
) -> (AccountCompatibility, Vec<ValidationWarning>) {
    let nodes = labelled_nodes(blueprint, paths);

    // Keyed by step id, remembering first-seen order
    let mut paths_by_step: BTreeMap<&str, (usize, Vec<String>)> = BTreeMap::new();
    for (position, (path, node)) in nodes.into_iter().enumerate() {
        if registries.is_scheduler(node.step_id()) {
            continue;
        }
        paths_by_step
            .entry(node.step_id())
            .or_insert_with(|| (position, Vec::new()))
            .1
            .push(path);
    }

    let mut ordered: Vec<_> = paths_by_step.into_iter().collect();
    ordered.sort_by_key(|(_, (position, _))| *position);

    let mut incompatible_modules = Vec::new();
    let mut warnings = Vec::new();

    for (step_id, (_, paths)) in ordered {
        let resolution = resolver.resolve(step_id, snapshot.ids());
        if resolution.available {
            if !registries.versions.contains(step_id) {
                warnings.push(ValidationWarning {
                    code: warning_codes::UNVERIFIED_STEP,
                    message: format!(
                        "Module '{}' is available for this account but has no verified version",
                        step_id
                    ),
                    path: paths.first().cloned(),
                });
            }
            continue;
        }

        let message = match &resolution.suggestion {
            Some(suggestion) => format!(
                "Module '{}' is not available for this account; '{}' will be used instead",
                step_id, suggestion
            ),
            None => format!(
                "Module '{}' is not available for this account and no compatible substitute was found",
                step_id
            ),
        };
        warnings.push(ValidationWarning {
            code: warning_codes::INCOMPATIBLE_STEP,
            message,
            path: paths.first().cloned(),
        });
        incompatible_modules.push(IncompatibleModule {
            module: step_id.to_string(),
            suggestion: resolution.suggestion,
            paths,
        });
    }

    (
        AccountCompatibility {
            live_catalog_checked: true,
            incompatible_modules,
        },
        warnings,
    )
}
